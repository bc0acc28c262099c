use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use tracing::{debug, info};

use crate::browser::CollectionBrowser;
use crate::config::{self, Config};
use crate::storage::{FileStorage, KeyValueStorage};
use crate::task_store::TaskStore;

/// Everything the page shell shares between its panels. Built once at
/// startup and torn down explicitly before exit.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub data_dir: PathBuf,
    storage: Rc<dyn KeyValueStorage>,
}

impl AppContext {
    #[tracing::instrument(skip(config, data_override))]
    pub fn init(config: Config, data_override: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = config::resolve_data_dir(&config, data_override)
            .context("failed to resolve data directory")?;
        let storage = FileStorage::open(&data_dir)
            .with_context(|| format!("failed to open storage at {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "application context ready");
        Ok(Self {
            config,
            data_dir,
            storage: Rc::new(storage),
        })
    }

    pub fn storage(&self) -> Rc<dyn KeyValueStorage> {
        Rc::clone(&self.storage)
    }

    pub fn task_store(&self) -> TaskStore {
        TaskStore::hydrate(self.storage(), &self.config.storage_key())
    }

    pub fn collection_browser(&self) -> anyhow::Result<CollectionBrowser> {
        Ok(CollectionBrowser::new(self.config.page_size()?))
    }

    #[tracing::instrument(skip(self))]
    pub fn teardown(self) -> anyhow::Result<()> {
        self.storage.flush().context("failed to flush storage")?;
        debug!(
            handles = Rc::strong_count(&self.storage),
            "storage handles at teardown"
        );
        info!("application context shut down");
        Ok(())
    }
}
