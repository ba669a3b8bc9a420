//! Debounced settings persistence.
//!
//! Every mutation reschedules a single save after a quiet period; the
//! previous pending save is aborted. A failed save is logged and leaves the
//! settings dirty, so the next mutation (or an explicit flush) retries it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{EngineError, EngineResult};

use super::{ProjectSettings, ProjectStore};

/// Shared save bookkeeping, readable while a save is in flight.
#[derive(Debug, Default)]
pub struct PersistStatus {
    dirty: AtomicBool,
    saves: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl PersistStatus {
    /// True while there are changes the store has not acknowledged.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.dirty.store(false, Ordering::SeqCst);
        *self.last_error.lock() = None;
    }

    fn record(&self, result: &EngineResult<()>) {
        match result {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                self.saves.fetch_add(1, Ordering::SeqCst);
                *self.last_error.lock() = None;
            }
            Err(e) => {
                *self.last_error.lock() = Some(e.to_string());
            }
        }
    }
}

pub struct PersistScheduler<S: ProjectStore> {
    store: Arc<S>,
    debounce: Duration,
    status: Arc<PersistStatus>,
    pending: Option<JoinHandle<()>>,
}

impl<S: ProjectStore> PersistScheduler<S> {
    pub fn new(store: Arc<S>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            status: Arc::new(PersistStatus::default()),
            pending: None,
        }
    }

    pub fn status(&self) -> &Arc<PersistStatus> {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Schedule a save of `settings` after the debounce period, replacing
    /// any save still waiting. Must be called from within a tokio runtime.
    pub fn schedule(&mut self, project_id: &str, settings: ProjectSettings) {
        self.cancel();
        self.status.mark_dirty();

        let store = self.store.clone();
        let status = self.status.clone();
        let debounce = self.debounce;
        let id = project_id.to_string();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let result = save(store.as_ref(), &id, settings).await;
            status.record(&result);
        }));
    }

    /// Save immediately, dropping any pending debounced save.
    pub async fn flush(&mut self, project_id: &str, settings: ProjectSettings) -> EngineResult<()> {
        self.cancel();
        self.status.mark_dirty();
        let result = save(self.store.as_ref(), project_id, settings).await;
        self.status.record(&result);
        result
    }

    /// Abort a pending save. The settings stay dirty.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Abort a pending save and forget unsaved state. Used when the settings
    /// being tracked now belong to a different project.
    pub fn reset(&mut self) {
        self.cancel();
        self.status.clear();
    }
}

impl<S: ProjectStore> Drop for PersistScheduler<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<S: ProjectStore> std::fmt::Debug for PersistScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistScheduler")
            .field("debounce", &self.debounce)
            .field("status", &self.status)
            .field("pending", &self.is_pending())
            .finish()
    }
}

async fn save<S: ProjectStore>(store: &S, id: &str, settings: ProjectSettings) -> EngineResult<()> {
    match store.save_project_settings(id, settings).await {
        Ok(()) => {
            log::debug!("saved settings for {id}");
            Ok(())
        }
        Err(e) => {
            let err = match e {
                EngineError::PersistFailed(msg) => EngineError::PersistFailed(msg),
                other => EngineError::PersistFailed(other.to_string()),
            };
            log::warn!("saving settings for {id} failed: {err}");
            Err(err)
        }
    }
}
