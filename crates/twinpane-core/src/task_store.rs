use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::filter::FilterMode;
use crate::observer::{SubscriptionId, Subscribers};
use crate::storage::KeyValueStorage;
use crate::task::{TaskRecord, timestamp_id};

pub const DEFAULT_STORAGE_KEY: &str = "tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Added(TaskRecord),
    Toggled { id: String, completed: bool },
    Removed(TaskRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn for_mode(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::All => self.total,
            FilterMode::Active => self.active,
            FilterMode::Completed => self.completed,
        }
    }

    /// Completed share in `[0, 1]`; zero for an empty list.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Ordered task collection mirrored into one storage slot.
///
/// Every mutation rewrites the whole slot before returning. Writes are
/// best-effort: a failed write keeps the in-memory change, logs it, and is
/// reported by [`TaskStore::last_persist_error`] until the next successful
/// write.
#[derive(Debug)]
pub struct TaskStore {
    storage: Rc<dyn KeyValueStorage>,
    key: String,
    tasks: Vec<TaskRecord>,
    draft: String,
    last_persist_error: Option<String>,
    subscribers: Subscribers<TaskEvent>,
}

impl TaskStore {
    /// Loads the slot named `key`. Missing, unreadable, or corrupt contents
    /// start an empty collection.
    #[tracing::instrument(skip(storage))]
    pub fn hydrate(storage: Rc<dyn KeyValueStorage>, key: &str) -> Self {
        let tasks = match storage.get_item(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<TaskRecord>>(&raw) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(key, error = %err, "stored tasks are corrupt; starting empty");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!(key, "no stored tasks; starting empty");
                Vec::new()
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(key, error = %message, "failed reading stored tasks; starting empty");
                Vec::new()
            }
        };

        info!(key, count = tasks.len(), "hydrated task store");
        Self {
            storage,
            key: key.to_string(),
            tasks,
            draft: String::new(),
            last_persist_error: None,
            subscribers: Subscribers::default(),
        }
    }

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn can_submit(&self) -> bool {
        !self.draft.trim().is_empty()
    }

    /// Adds the pending draft; see [`TaskStore::add`].
    pub fn submit_draft(&mut self) -> Option<TaskRecord> {
        let draft = self.draft.clone();
        self.add(&draft)
    }

    pub fn add(&mut self, text: &str) -> Option<TaskRecord> {
        self.add_at(text, Utc::now())
    }

    /// Appends a new active record and clears the draft. Blank text changes
    /// nothing and returns `None`.
    #[tracing::instrument(skip(self, text, now))]
    pub fn add_at(&mut self, text: &str, now: DateTime<Utc>) -> Option<TaskRecord> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!("ignoring blank task text");
            return None;
        }

        let id = timestamp_id(now, &self.tasks);
        let task = TaskRecord::new_active(id, trimmed.to_string(), now);
        self.tasks.push(task.clone());
        self.draft.clear();

        info!(id = %task.id, count = self.tasks.len(), "task added");
        self.persist();
        self.subscribers.notify(&TaskEvent::Added(task.clone()));
        Some(task)
    }

    /// Flips completion and returns the new state, or `None` if `id` is unknown.
    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("toggle target not found");
            return None;
        };
        task.completed = !task.completed;
        let completed = task.completed;

        info!(completed, "task toggled");
        self.persist();
        self.subscribers.notify(&TaskEvent::Toggled {
            id: id.to_string(),
            completed,
        });
        Some(completed)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Option<TaskRecord> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            debug!("remove target not found");
            return None;
        };
        let removed = self.tasks.remove(idx);

        info!(count = self.tasks.len(), "task removed");
        self.persist();
        self.subscribers.notify(&TaskEvent::Removed(removed.clone()));
        Some(removed)
    }

    pub fn filtered_view(&self, mode: FilterMode) -> Vec<&TaskRecord> {
        self.tasks.iter().filter(|t| mode.matches(t)).collect()
    }

    pub fn counts(&self) -> TaskCounts {
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        TaskCounts {
            total: self.tasks.len(),
            active: self.tasks.len() - completed,
            completed,
        }
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TaskEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    #[tracing::instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    fn persist(&mut self) {
        let result = serde_json::to_string(&self.tasks)
            .map_err(anyhow::Error::from)
            .and_then(|payload| self.storage.set_item(&self.key, &payload));

        match result {
            Ok(()) => {
                debug!("persisted tasks");
                self.last_persist_error = None;
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "failed to persist tasks; keeping in-memory state");
                self.last_persist_error = Some(message);
            }
        }
    }
}
