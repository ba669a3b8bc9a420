//! In-memory project store and audio fetcher.
//!
//! Backs local sessions and tests. Failures can be injected per operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::params::EqBands;
use crate::playback::SourceLocator;

use super::{AudioFetcher, NewProject, ProjectSettings, ProjectSnapshot, ProjectStatus, ProjectStore};

#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<String, ProjectSnapshot>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    saves: AtomicU64,
    fail_saves: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a project.
    pub fn insert(&self, snapshot: ProjectSnapshot) {
        self.projects.lock().insert(snapshot.id.clone(), snapshot);
    }

    /// Make encoded audio reachable under `locator`.
    pub fn insert_audio(&self, locator: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.lock().insert(locator.into(), bytes);
    }

    pub fn project(&self, id: &str) -> Option<ProjectSnapshot> {
        self.projects.lock().get(id).cloned()
    }

    /// Number of successful settings saves.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

impl ProjectStore for MemoryProjectStore {
    async fn load_project(&self, id: &str) -> EngineResult<ProjectSnapshot> {
        self.project(id)
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))
    }

    async fn save_project_settings(&self, id: &str, settings: ProjectSettings) -> EngineResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(EngineError::PersistFailed("store unavailable".into()));
        }
        let mut projects = self.projects.lock();
        let project = projects
            .get_mut(id)
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))?;
        project.eq_preset = settings.eq_preset;
        project.bands = Some(settings.bands);
        project.compressor = settings.compressor;
        project.status = settings.status;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_project(&self, project: NewProject) -> EngineResult<String> {
        let id = format!("project-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.insert(ProjectSnapshot {
            id: id.clone(),
            name: project.name,
            eq_preset: project.eq_preset,
            bands: None,
            compressor: Default::default(),
            source_locator: None,
            status: ProjectStatus::Draft,
        });
        log::debug!("created {id}");
        Ok(id)
    }

    async fn upload_target(&self) -> EngineResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(EngineError::UploadFailed("no upload target".into()));
        }
        Ok(format!("memory://uploads/{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn upload_audio(&self, id: &str, target: &str, bytes: Vec<u8>) -> EngineResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(EngineError::UploadFailed(format!("upload to {target} rejected")));
        }
        let mut projects = self.projects.lock();
        let project = projects
            .get_mut(id)
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))?;
        project.source_locator = Some(target.to_string());
        self.blobs.lock().insert(target.to_string(), bytes);
        Ok(target.to_string())
    }
}

impl AudioFetcher for MemoryProjectStore {
    async fn fetch_audio(&self, locator: &SourceLocator) -> EngineResult<Vec<u8>> {
        self.blobs
            .lock()
            .get(locator.as_str())
            .cloned()
            .ok_or(EngineError::NoSource)
    }
}

/// A snapshot with flat bands, for seeding a store.
pub fn blank_snapshot(id: &str, name: &str) -> ProjectSnapshot {
    ProjectSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        eq_preset: crate::preset::FLAT.to_string(),
        bands: Some(EqBands::flat()),
        compressor: Default::default(),
        source_locator: None,
        status: ProjectStatus::Draft,
    }
}
