use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::TaskRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
  #[default]
  All,
  Active,
  Completed
}

impl FilterMode {
  pub const ALL_MODES: [FilterMode; 3] = [
    FilterMode::All,
    FilterMode::Active,
    FilterMode::Completed
  ];

  pub fn matches(
    self,
    task: &TaskRecord
  ) -> bool {
    match self {
      | FilterMode::All => true,
      | FilterMode::Active => {
        !task.completed
      }
      | FilterMode::Completed => {
        task.completed
      }
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | FilterMode::All => "All",
      | FilterMode::Active => "Active",
      | FilterMode::Completed => {
        "Completed"
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | FilterMode::All => "all",
      | FilterMode::Active => "active",
      | FilterMode::Completed => {
        "completed"
      }
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(FilterMode::All),
      | "active" | "pending" => {
        Ok(FilterMode::Active)
      }
      | "completed" | "done" => {
        Ok(FilterMode::Completed)
      }
      | other => Err(anyhow!(
        "unknown filter mode: {other} \
         (expected all, active or \
         completed)"
      ))
    }
  }
}
