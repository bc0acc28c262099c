//! Durable key-value slots.
//!
//! Each slot holds one UTF-8 value. [`FileStorage`] keeps every slot as
//! `<key>.json` inside a data directory and replaces it atomically on write.
//! [`MemoryStorage`] is an in-process map used by tests and by callers that
//! do not want anything on disk.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub trait KeyValueStorage: fmt::Debug {
    /// Returns `Ok(None)` when the slot has never been written.
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Makes every completed `set_item` durable.
    fn flush(&self) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct FileStorage {
    pub data_dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file storage");
        Ok(Self { data_dir })
    }

    pub fn slot_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    #[tracing::instrument(skip(self))]
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "slot not present");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "read slot");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key)?;
        debug!(file = %path.display(), bytes = value.len(), "writing slot atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)
            .with_context(|| format!("failed creating temp file in {}", self.data_dir.display()))?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    // Slot renames are only durable once the directory entry is synced.
    #[tracing::instrument(skip(self))]
    fn flush(&self) -> anyhow::Result<()> {
        let dir = fs::File::open(&self.data_dir)
            .with_context(|| format!("failed opening {}", self.data_dir.display()))?;
        dir.sync_all()
            .with_context(|| format!("failed syncing {}", self.data_dir.display()))?;
        debug!(data_dir = %self.data_dir.display(), "flushed file storage");
        Ok(())
    }
}

/// Slots held in memory. `fail_writes` makes every `set_item` fail, which is
/// how a full or disabled storage backend looks to callers.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes.get() {
            bail!("storage quota exceeded writing {key}");
        }
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        && !key.starts_with('.');
    if !valid {
        bail!("invalid storage key: {key:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{FileStorage, KeyValueStorage, MemoryStorage};

    #[test]
    fn file_slots_roundtrip_and_flush() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        assert_eq!(storage.get_item("tasks").expect("get"), None);
        storage.set_item("tasks", "[]").expect("set");
        storage.set_item("tasks", "[1]").expect("overwrite");
        storage.flush().expect("flush");

        assert_eq!(
            storage.get_item("tasks").expect("get").as_deref(),
            Some("[1]")
        );
        assert!(temp.path().join("tasks.json").exists());
    }

    #[test]
    fn flush_reports_a_vanished_data_dir() {
        let temp = tempdir().expect("tempdir");
        let data_dir = temp.path().join("data");
        let storage = FileStorage::open(&data_dir).expect("open storage");
        std::fs::remove_dir(&data_dir).expect("remove data dir");

        assert!(storage.flush().is_err());
    }

    #[test]
    fn rejects_keys_that_escape_the_data_dir() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        assert!(storage.set_item("../tasks", "[]").is_err());
        assert!(storage.set_item("", "[]").is_err());
        assert!(storage.get_item(".hidden").is_err());
    }

    #[test]
    fn memory_storage_can_refuse_writes() {
        let storage = MemoryStorage::with_item("tasks", "[]");
        storage.set_fail_writes(true);
        assert!(storage.set_item("tasks", "[1]").is_err());
        assert_eq!(
            storage.get_item("tasks").expect("get").as_deref(),
            Some("[]")
        );
    }
}
