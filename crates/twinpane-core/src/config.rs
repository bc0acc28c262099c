use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::remote::DEFAULT_POSTS_URL;
use crate::task_store::DEFAULT_STORAGE_KEY;

pub const RC_ENV_VAR: &str =
  "TWINPANE_RC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.twinpane".to_string()
    );
    map.insert(
      "storage.key".to_string(),
      DEFAULT_STORAGE_KEY.to_string()
    );
    map.insert(
      "posts.url".to_string(),
      DEFAULT_POSTS_URL.to_string()
    );
    map.insert(
      "posts.page_size".to_string(),
      DEFAULT_PAGE_SIZE.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading config file");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_usize(
    &self,
    key: &str
  ) -> anyhow::Result<Option<usize>> {
    self.get_parsed(key)
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self.get_parsed(key)
  }

  /// Unset or blank values are `None`;
  /// anything unparsable is an error.
  fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
      return Ok(None);
    }
    raw.parse::<T>().map(Some).map_err(
      |err| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({err})"
        )
      }
    )
  }

  pub fn page_size(
    &self
  ) -> anyhow::Result<usize> {
    let size = self
      .get_usize("posts.page_size")?
      .unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 {
      return Err(anyhow!(
        "posts.page_size must be at \
         least 1"
      ));
    }
    Ok(size)
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .filter(|k| !k.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_STORAGE_KEY.to_string()
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let path = fs::canonicalize(&path)
      .with_context(|| {
        format!(
          "failed to resolve {}",
          path.display()
        )
      })?;
    if self.loaded_files.contains(&path)
    {
      bail!(
        "include cycle at {}",
        path.display()
      );
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping config \
       lookup"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".twinpanerc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".twinpane"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;
  use crate::pagination::DEFAULT_PAGE_SIZE;
  use crate::remote::DEFAULT_POSTS_URL;

  #[test]
  fn defaults_cover_every_key() {
    let cfg = Config::default();
    assert_eq!(
      cfg.get("posts.url").as_deref(),
      Some(DEFAULT_POSTS_URL)
    );
    assert_eq!(
      cfg.page_size().expect("size"),
      DEFAULT_PAGE_SIZE
    );
    assert_eq!(cfg.storage_key(), "tasks");
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
    assert_eq!(
      cfg
        .get_u64("posts.timeout_secs")
        .expect("timeout"),
      None
    );
  }

  #[test]
  fn file_includes_and_overrides_layer()
  {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "posts.page_size = 4\n"
    )
    .expect("write include");
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "# twinpane settings\n\
       storage.key = chores # inline\n\
       include extra.rc\n\
       include missing.rc\n\
       color = off\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(main.as_path()))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(cfg.storage_key(), "chores");
    assert_eq!(
      cfg.page_size().expect("size"),
      4
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );

    cfg.apply_overrides(vec![(
      "rc.posts.page_size".to_string(),
      "10".to_string()
    )]);
    assert_eq!(
      cfg.page_size().expect("size"),
      10
    );
  }

  #[test]
  fn include_cycles_are_errors() {
    let temp = tempdir().expect("tempdir");
    let own = temp.path().join("own.rc");
    fs::write(&own, "include own.rc\n")
      .expect("write rc");
    let err = Config::load(Some(own.as_path()))
      .expect_err("self include");
    assert!(
      format!("{err:#}")
        .contains("include cycle"),
      "{err:#}"
    );

    let a = temp.path().join("a.rc");
    let b = temp.path().join("b.rc");
    fs::write(&a, "color = off\ninclude b.rc\n")
      .expect("write a");
    fs::write(&b, "include a.rc\n")
      .expect("write b");
    let err = Config::load(Some(a.as_path()))
      .expect_err("mutual include");
    assert!(
      format!("{err:#}")
        .contains("include cycle"),
      "{err:#}"
    );
  }

  #[test]
  fn rejects_bad_lines_and_values() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(Config::load(Some(rc.as_path())).is_err());

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "posts.page_size".to_string(),
      "lots".to_string()
    )]);
    assert!(cfg.page_size().is_err());

    cfg.apply_overrides(vec![(
      "posts.page_size".to_string(),
      "0".to_string()
    )]);
    assert!(cfg.page_size().is_err());
  }
}
