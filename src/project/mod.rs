//! Project persistence contract.
//!
//! The engine never stores anything itself. It reads a [`ProjectSnapshot`]
//! through a [`ProjectStore`] to initialise the parameter store and source,
//! and writes [`ProjectSettings`] back. Source bytes come through an
//! [`AudioFetcher`].

pub mod memory;
#[cfg(feature = "live")]
pub mod persist;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::params::{CompressorSettings, EqBands};
use crate::playback::SourceLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Uploaded,
    Processing,
    Completed,
}

/// A project as stored by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub id: String,
    pub name: String,
    pub eq_preset: String,
    /// Missing bands fall back to the named preset.
    #[serde(default)]
    pub bands: Option<EqBands>,
    #[serde(default)]
    pub compressor: CompressorSettings,
    #[serde(default)]
    pub source_locator: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
}

/// What the engine writes back after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub eq_preset: String,
    pub bands: EqBands,
    pub compressor: CompressorSettings,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub eq_preset: String,
}

/// Project CRUD consumed by the engine.
pub trait ProjectStore: Send + Sync + 'static {
    fn load_project(&self, id: &str) -> impl Future<Output = EngineResult<ProjectSnapshot>> + Send;

    fn save_project_settings(
        &self,
        id: &str,
        settings: ProjectSettings,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Returns the new project's id.
    fn create_project(&self, project: NewProject) -> impl Future<Output = EngineResult<String>> + Send;

    /// Where the next upload should go.
    fn upload_target(&self) -> impl Future<Output = EngineResult<String>> + Send;

    /// Upload source bytes to `target` and attach them to the project.
    /// Returns the stored locator.
    fn upload_audio(
        &self,
        id: &str,
        target: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = EngineResult<String>> + Send;
}

/// Resolves a locator to encoded audio bytes.
pub trait AudioFetcher: Send + Sync + 'static {
    fn fetch_audio(
        &self,
        locator: &SourceLocator,
    ) -> impl Future<Output = EngineResult<Vec<u8>>> + Send;
}
