//! Editing session: one open project, its parameters, the dual-path player
//! and the meter.
//!
//! Every parameter mutation goes to the [`ParameterStore`] first, then to the
//! live graph if one exists, then to the debounced persister. The meter loop
//! only runs while the EQ path is live.

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::dsp::buffer;
use crate::dsp::renderer;
use crate::error::{EngineError, EngineResult};
use crate::meter::frame_loop::{CancelFlag, CancelToken, FrameLoop};
use crate::meter::{Meter, MeterState};
use crate::params::{CompressorParam, EqBands, ParamChange, ParameterStore};
use crate::playback::{
    AudioContext, AudioSourceHandle, DualPathController, PathMode, SourceLocator, TransportState,
};
use crate::preset::{FLAT, PresetApplier};
use crate::project::persist::{PersistScheduler, PersistStatus};
use crate::project::{AudioFetcher, NewProject, ProjectSettings, ProjectStatus, ProjectStore};

/// Preset name recorded once a band is edited by hand.
pub const CUSTOM_PRESET: &str = "Custom";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
}

/// A rendered export, ready to hand to a download or upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

pub struct EqSession<S: ProjectStore + AudioFetcher> {
    config: EngineConfig,
    store: Arc<S>,
    params: ParameterStore,
    presets: PresetApplier,
    preset_name: String,
    controller: DualPathController,
    persist: PersistScheduler<S>,
    project: Option<ProjectInfo>,
    meter_loop: Option<CancelToken>,
    meter_tx: Arc<watch::Sender<MeterState>>,
}

impl<S: ProjectStore + AudioFetcher> EqSession<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let controller = DualPathController::new(AudioContext::new(), config.graph_options());
        let persist = PersistScheduler::new(store.clone(), config.persist_debounce());
        let (meter_tx, _) = watch::channel(MeterState::default());
        Self {
            config,
            store,
            params: ParameterStore::default(),
            presets: PresetApplier::default(),
            preset_name: FLAT.to_string(),
            controller,
            persist,
            project: None,
            meter_loop: None,
            meter_tx: Arc::new(meter_tx),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn project(&self) -> Option<&ProjectInfo> {
        self.project.as_ref()
    }

    pub fn controller(&self) -> &DualPathController {
        &self.controller
    }

    pub fn mode(&self) -> PathMode {
        self.controller.mode()
    }

    pub fn persist_status(&self) -> &Arc<PersistStatus> {
        self.persist.status()
    }

    /// Subscribe to meter updates. Reads zero while the EQ path is off.
    pub fn meter(&self) -> watch::Receiver<MeterState> {
        self.meter_tx.subscribe()
    }

    pub fn meter_state(&self) -> MeterState {
        *self.meter_tx.borrow()
    }

    /// Settings as they would be saved right now.
    pub fn settings(&self) -> ProjectSettings {
        ProjectSettings {
            eq_preset: self.preset_name.clone(),
            bands: *self.params.bands(),
            compressor: *self.params.compressor(),
            status: self.project.as_ref().map(|p| p.status).unwrap_or_default(),
        }
    }

    // ── Projects ────────────────────────────────────────────

    pub async fn create_project(&mut self, name: &str, eq_preset: &str) -> EngineResult<String> {
        let id = self
            .store
            .create_project(NewProject {
                name: name.to_string(),
                eq_preset: eq_preset.to_string(),
            })
            .await?;
        self.open_project(&id).await?;
        Ok(id)
    }

    /// Load a project: parameters first, then its source if it has one.
    ///
    /// The snapshot is loaded and its audio fetched and decoded before
    /// anything changes, so a failed open leaves the current project, its
    /// parameters and its playback path as they were. Unsaved edits to the
    /// current project are saved before switching. A project without stored
    /// bands gets its named preset applied.
    pub async fn open_project(&mut self, id: &str) -> EngineResult<()> {
        let snapshot = self.store.load_project(id).await?;
        let source = match snapshot.source_locator.as_deref() {
            Some(raw) => {
                let locator = SourceLocator::parse(raw);
                let bytes = self.store.fetch_audio(&locator).await?;
                let decoded = buffer::decode(&bytes)?;
                Some(AudioSourceHandle::new(locator, decoded))
            }
            None => None,
        };

        self.save_before_switch().await;
        self.stop_meter();

        match snapshot.bands {
            Some(bands) => {
                self.params.replace(bands, snapshot.compressor);
                self.preset_name = snapshot.eq_preset.clone();
            }
            None => {
                self.params.replace(EqBands::flat(), snapshot.compressor);
                self.preset_name = match self.presets.apply(&mut self.params, &snapshot.eq_preset) {
                    Some((preset, _)) => preset.name.to_string(),
                    None => FLAT.to_string(),
                };
            }
        }
        self.project = Some(ProjectInfo {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            status: snapshot.status,
        });

        match source {
            Some(handle) => self.controller.load_source(handle),
            None => self.controller.unload_source(),
        }
        log::info!("opened project {} ({})", snapshot.name, snapshot.id);
        Ok(())
    }

    /// Save the outgoing project's unsaved settings, then forget them. A
    /// failed save is logged and does not block the switch.
    async fn save_before_switch(&mut self) {
        if self.persist.status().is_dirty() {
            if let Err(e) = self.flush().await {
                let id = self.project.as_ref().map_or("", |p| p.id.as_str());
                log::warn!("switching away from {id} with unsaved settings: {e}");
            }
        }
        self.persist.reset();
    }

    /// Decode and load a source. Lands on the normal path.
    pub fn load_source(&mut self, locator: SourceLocator, bytes: &[u8]) -> EngineResult<()> {
        let decoded = buffer::decode(bytes)?;
        self.stop_meter();
        log::debug!(
            "loaded {}: {:.2}s, {} ch",
            locator.as_str(),
            decoded.duration_sec(),
            decoded.number_of_channels()
        );
        self.controller.load_source(AudioSourceHandle::new(locator, decoded));
        Ok(())
    }

    /// Upload new source audio for the open project and switch to it.
    ///
    /// The bytes are decoded before anything is sent. On upload failure the
    /// project status and current source are left as they were. A failed
    /// status save comes back as `PersistFailed` with the new source loaded.
    pub async fn upload_audio(&mut self, bytes: Vec<u8>) -> EngineResult<SourceLocator> {
        let Some(id) = self.project.as_ref().map(|p| p.id.clone()) else {
            return Err(EngineError::NoProject);
        };
        let decoded = buffer::decode(&bytes)?;

        let uploaded = match self.store.upload_target().await {
            Ok(target) => self.store.upload_audio(&id, &target, bytes).await,
            Err(e) => Err(e),
        };
        let raw = match uploaded {
            Ok(raw) => raw,
            Err(e) => {
                let err = match e {
                    EngineError::UploadFailed(msg) => EngineError::UploadFailed(msg),
                    other => EngineError::UploadFailed(other.to_string()),
                };
                log::warn!("upload for {id} failed: {err}");
                return Err(err);
            }
        };

        let locator = SourceLocator::RemoteUrl(raw);
        self.stop_meter();
        self.controller
            .load_source(AudioSourceHandle::new(locator.clone(), decoded));
        self.set_status(ProjectStatus::Uploaded).await?;
        Ok(locator)
    }

    /// Update the project status and save immediately.
    ///
    /// The status changes even when the save fails. The error is returned
    /// and the settings stay dirty until the next successful save.
    pub async fn set_status(&mut self, status: ProjectStatus) -> EngineResult<()> {
        if let Some(project) = self.project.as_mut() {
            project.status = status;
        }
        self.flush().await
    }

    /// Save pending settings now.
    pub async fn flush(&mut self) -> EngineResult<()> {
        let Some(id) = self.project.as_ref().map(|p| p.id.clone()) else {
            return Ok(());
        };
        let settings = self.settings();
        self.persist.flush(&id, settings).await
    }

    // ── Parameters ──────────────────────────────────────────

    /// Set one band's gain. Returns the applied (clamped) gain, or `None`
    /// for an index outside the band range.
    pub fn set_band_gain(&mut self, index: usize, gain_db: f64) -> Option<f64> {
        let change = self.params.set_band_gain(index, gain_db)?;
        self.controller.apply_change(&change);
        self.preset_name = CUSTOM_PRESET.to_string();
        self.persist_later();
        match change {
            ParamChange::BandGain { gain_db, .. } => Some(gain_db),
            ParamChange::Compressor(_) => None,
        }
    }

    /// Set a compressor parameter by control name. Returns the applied value.
    pub fn set_compressor_param(&mut self, name: &str, value: f64) -> EngineResult<f64> {
        let param: CompressorParam = name.parse()?;
        let change = self.params.set_compressor_param(param, value);
        self.controller.apply_change(&change);
        self.persist_later();
        Ok(param.read(self.params.compressor()))
    }

    /// Apply a named preset. Unknown names change nothing and return false.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        let Some((preset, changes)) = self.presets.apply(&mut self.params, name) else {
            return false;
        };
        for change in &changes {
            self.controller.apply_change(change);
        }
        self.preset_name = preset.name.to_string();
        self.persist_later();
        true
    }

    fn persist_later(&mut self) {
        let Some(id) = self.project.as_ref().map(|p| p.id.clone()) else {
            return;
        };
        let settings = self.settings();
        self.persist.schedule(&id, settings);
    }

    // ── Live processing ─────────────────────────────────────

    /// Switch to the EQ path and start metering.
    pub async fn enable_live_processing(&mut self) -> EngineResult<()> {
        self.controller.enable(&self.params).await?;
        self.start_meter();
        Ok(())
    }

    /// Stop metering and switch back to the normal path.
    pub fn disable_live_processing(&mut self) {
        self.stop_meter();
        self.controller.disable();
    }

    pub async fn set_live_processing(&mut self, enabled: bool) -> EngineResult<()> {
        if enabled {
            self.enable_live_processing().await
        } else {
            self.disable_live_processing();
            Ok(())
        }
    }

    /// Flip between paths. Returns the resulting mode.
    pub async fn toggle_live_processing(&mut self) -> EngineResult<PathMode> {
        let enable = self.mode() == PathMode::Normal;
        self.set_live_processing(enable).await?;
        Ok(self.mode())
    }

    fn start_meter(&mut self) {
        if self.meter_loop.is_some() {
            return;
        }
        let Some(tap) = self.controller.graph().map(|g| g.tap()) else {
            return;
        };
        let mut meter = Meter::new(self.config.meter);
        let tx = self.meter_tx.clone();
        let interval = self.config.frame_interval();
        self.meter_loop = Some(FrameLoop::start(interval, move |now, flag| {
            let frame = tap.lock().byte_frequency_data();
            publish_meter(&tx, flag, meter.process(&frame, now));
            ControlFlow::Continue(())
        }));
        log::debug!("meter started");
    }

    /// Cancels before resetting, so a tick still running on another worker
    /// cannot publish over the reset.
    fn stop_meter(&mut self) {
        if let Some(token) = self.meter_loop.take() {
            token.cancel();
            log::debug!("meter stopped");
        }
        self.meter_tx.send_replace(MeterState::default());
    }

    // ── Transport ───────────────────────────────────────────

    pub fn transport(&self) -> TransportState {
        self.controller.transport()
    }

    pub fn play(&mut self) {
        self.controller.play();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn seek(&mut self, position_sec: f64) {
        self.controller.seek(position_sec);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.controller.set_volume(volume);
    }

    /// Pull one planar block of output from the active path.
    pub fn render(&mut self, frames: usize) -> Vec<Vec<f32>> {
        self.controller.render(frames)
    }

    // ── Export ──────────────────────────────────────────────

    /// Render the loaded source offline with the current parameters.
    /// Live playback state is not touched.
    pub fn render_export(&self) -> EngineResult<ExportArtifact> {
        let source = self.controller.source().ok_or(EngineError::NoSource)?;
        let bytes = renderer::render_wav(
            source.buffer(),
            self.params.bands(),
            self.params.compressor(),
            self.config.compressor_knee_db,
        );
        Ok(self.artifact(bytes))
    }

    /// Decode `source_bytes` and render them with the current parameters.
    pub fn render_export_from(&self, source_bytes: &[u8]) -> EngineResult<ExportArtifact> {
        let bytes = renderer::render_source_wav(
            source_bytes,
            self.params.bands(),
            self.params.compressor(),
            self.config.compressor_knee_db,
        )?;
        Ok(self.artifact(bytes))
    }

    /// Render the export and mark the project completed.
    ///
    /// Fails with `PersistFailed` if the completed status cannot be saved;
    /// [`render_export`](Self::render_export) still yields the bytes.
    pub async fn export(&mut self) -> EngineResult<ExportArtifact> {
        let artifact = self.render_export()?;
        if self.project.is_some() {
            self.set_status(ProjectStatus::Completed).await?;
        }
        log::info!("exported {} ({} bytes)", artifact.file_name, artifact.bytes.len());
        Ok(artifact)
    }

    fn artifact(&self, bytes: Vec<u8>) -> ExportArtifact {
        let stem = self
            .project
            .as_ref()
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.config.export_fallback_name.as_str());
        ExportArtifact {
            file_name: format!("{stem}.wav"),
            mime_type: "audio/wav",
            bytes,
        }
    }

    /// Stop metering, save anything unsaved, release the graph. The graph
    /// is released even when the save fails.
    pub async fn close(&mut self) -> EngineResult<()> {
        self.stop_meter();
        let saved = if self.persist.status().is_dirty() {
            self.flush().await
        } else {
            Ok(())
        };
        self.controller.shutdown();
        saved
    }
}

/// Publish a meter reading unless its loop has been cancelled. The flag is
/// read under the channel lock, so no reading lands after the reset that
/// follows cancellation.
fn publish_meter(tx: &watch::Sender<MeterState>, flag: &CancelFlag, state: MeterState) -> bool {
    tx.send_if_modified(|current| {
        if flag.is_cancelled() {
            return false;
        }
        *current = state;
        true
    })
}

impl<S: ProjectStore + AudioFetcher> std::fmt::Debug for EqSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqSession")
            .field("project", &self.project)
            .field("preset_name", &self.preset_name)
            .field("params", &self.params)
            .field("controller", &self.controller)
            .field("persist", &self.persist)
            .field("metering", &self.meter_loop.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::dsp::buffer::tests::wav_bytes;
    use crate::project::memory::{MemoryProjectStore, blank_snapshot};

    const RATE: u32 = 8000;

    fn tone(seconds: usize) -> Vec<u8> {
        let samples: Vec<i16> = (0..RATE as usize * seconds)
            .map(|i| ((i as f64 * 0.05).sin() * 8000.0) as i16)
            .collect();
        wav_bytes(RATE, 1, &samples)
    }

    fn store_with_project() -> Arc<MemoryProjectStore> {
        let store = Arc::new(MemoryProjectStore::new());
        let mut snap = blank_snapshot("p1", "My Track");
        snap.source_locator = Some("memory://audio/p1".into());
        store.insert(snap);
        store.insert_audio("memory://audio/p1", tone(10));
        store
    }

    async fn open_session() -> (Arc<MemoryProjectStore>, EqSession<MemoryProjectStore>) {
        let store = store_with_project();
        let mut session = EqSession::new(store.clone(), EngineConfig::default());
        session.open_project("p1").await.unwrap();
        (store, session)
    }

    fn live_gains(session: &EqSession<MemoryProjectStore>) -> Vec<Option<f64>> {
        let graph = session.controller().graph();
        (0..7).map(|i| graph.and_then(|g| g.band_gain(i))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn flat_preset_reads_back_zero_on_live_graph() {
        let (_store, mut session) = open_session().await;
        assert!(session.apply_preset("Flat"));
        session.enable_live_processing().await.unwrap();
        assert_eq!(live_gains(&session), vec![Some(0.0); 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn band_gain_survives_graph_rebuild() {
        let (_store, mut session) = open_session().await;
        session.enable_live_processing().await.unwrap();
        assert_eq!(session.set_band_gain(3, 6.0), Some(6.0));
        assert_eq!(live_gains(&session)[3], Some(6.0));

        session.disable_live_processing();
        assert!(session.controller().graph().is_none());
        session.enable_live_processing().await.unwrap();
        assert_eq!(live_gains(&session)[3], Some(6.0));
        assert_eq!(session.preset_name(), CUSTOM_PRESET);
    }

    #[tokio::test(start_paused = true)]
    async fn compressor_change_while_disabled_lands_on_build() {
        let (_store, mut session) = open_session().await;
        assert_eq!(session.set_compressor_param("ratio", 8.0).unwrap(), 8.0);
        session.enable_live_processing().await.unwrap();
        let ratio = session
            .controller()
            .graph()
            .map(|g| g.compressor_settings().ratio);
        assert_eq!(ratio, Some(8.0));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_compressor_param_is_rejected() {
        let (_store, mut session) = open_session().await;
        assert!(matches!(
            session.set_compressor_param("knee", 3.0),
            Err(EngineError::UnknownParameter(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn preset_persists_once_after_quiet_period() {
        let (store, mut session) = open_session().await;
        assert!(session.apply_preset("Rock"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.save_count(), 1);
        let saved = store.project("p1").unwrap();
        assert_eq!(saved.eq_preset, "Rock");
        assert_eq!(saved.bands.map(|b| b.gains()), Some([4.0, 3.0, -1.0, -2.0, 1.0, 3.0, 4.0]));
    }

    #[tokio::test(start_paused = true)]
    async fn persist_failure_keeps_session_running() {
        let (store, mut session) = open_session().await;
        store.fail_saves(true);
        session.set_band_gain(0, 3.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.persist_status().is_dirty());
        assert_eq!(session.params().bands().gains()[0], 3.0);

        store.fail_saves(false);
        session.set_band_gain(1, 2.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!session.persist_status().is_dirty());
        assert_eq!(
            store.project("p1").and_then(|p| p.bands).map(|b| b.gains()[0]),
            Some(3.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_project_gets_its_named_preset() {
        let store = Arc::new(MemoryProjectStore::new());
        let mut session = EqSession::new(store.clone(), EngineConfig::default());
        session.create_project("Podcast Ep 1", "podcast").await.unwrap();
        assert_eq!(session.preset_name(), "Podcast");
        assert_eq!(session.params().compressor().ratio, 3.0);
        assert!(session.controller().source().is_none());
        assert!(matches!(
            session.enable_live_processing().await,
            Err(EngineError::NoSource)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_sets_status_and_loads_source() {
        let store = Arc::new(MemoryProjectStore::new());
        let mut session = EqSession::new(store.clone(), EngineConfig::default());
        let id = session.create_project("Demo", "Flat").await.unwrap();

        let locator = session.upload_audio(tone(10)).await.unwrap();
        assert!(matches!(locator, SourceLocator::RemoteUrl(_)));
        assert_eq!(session.project().map(|p| p.status), Some(ProjectStatus::Uploaded));
        assert_eq!(store.project(&id).map(|p| p.status), Some(ProjectStatus::Uploaded));
        let duration = session.controller().source().map(|s| s.duration_sec());
        assert!((duration.unwrap_or(0.0) - 10.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_keeps_status() {
        let (store, mut session) = open_session().await;
        store.fail_uploads(true);
        let err = session.upload_audio(tone(1)).await;
        assert!(matches!(err, Err(EngineError::UploadFailed(_))));
        assert_eq!(session.project().map(|p| p.status), Some(ProjectStatus::Draft));
        let duration = session.controller().source().map(|s| s.duration_sec());
        assert!((duration.unwrap_or(0.0) - 10.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_upload_is_rejected_before_sending() {
        let (store, mut session) = open_session().await;
        let err = session.upload_audio(b"definitely not audio".to_vec()).await;
        assert!(matches!(err, Err(EngineError::SourceDecodeFailed(_))));
        assert_eq!(store.project("p1").and_then(|p| p.source_locator), Some("memory://audio/p1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn meter_runs_only_while_live() {
        let (_store, mut session) = open_session().await;
        session.play();
        session.enable_live_processing().await.unwrap();
        for _ in 0..200 {
            session.render(128);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.meter_state().level > 0.0);

        session.disable_live_processing();
        assert_eq!(session.meter_state(), MeterState::default());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.meter_state(), MeterState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_flips_paths() {
        let (_store, mut session) = open_session().await;
        assert_eq!(session.toggle_live_processing().await.unwrap(), PathMode::Eq);
        assert_eq!(session.toggle_live_processing().await.unwrap(), PathMode::Normal);
        assert!(session.controller().graph().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn export_leaves_live_state_alone() {
        let (store, mut session) = open_session().await;
        session.apply_preset("Bass Boost");
        session.play();
        session.enable_live_processing().await.unwrap();
        let before = session.transport();
        let graph_id = session.controller().graph().map(|g| g.id());

        let artifact = session.export().await.unwrap();
        assert_eq!(artifact.file_name, "My Track.wav");
        assert_eq!(artifact.mime_type, "audio/wav");
        assert_eq!(&artifact.bytes[0..4], b"RIFF");
        assert_eq!(buffer::decode(&artifact.bytes).unwrap().length(), RATE as usize * 10);

        assert_eq!(session.mode(), PathMode::Eq);
        assert_eq!(session.controller().graph().map(|g| g.id()), graph_id);
        assert_eq!(session.transport(), before);
        assert_eq!(store.project("p1").map(|p| p.status), Some(ProjectStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn export_without_project_uses_fallback_name() {
        let store = Arc::new(MemoryProjectStore::new());
        let mut session = EqSession::new(store, EngineConfig::default());
        session
            .load_source(SourceLocator::ObjectUrl("blob:local".into()), &tone(1))
            .unwrap();
        let artifact = session.export().await.unwrap();
        assert_eq!(artifact.file_name, "processed-track.wav");
    }

    #[tokio::test(start_paused = true)]
    async fn export_of_corrupt_bytes_fails() {
        let (_store, session) = open_session().await;
        assert!(matches!(
            session.render_export_from(b"garbage"),
            Err(EngineError::SourceDecodeFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_dirty_settings() {
        let (store, mut session) = open_session().await;
        session.set_band_gain(5, -4.0);
        session.close().await.unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(session.controller().context().live_graph_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_reports_failed_save_and_still_releases_graph() {
        let (store, mut session) = open_session().await;
        session.enable_live_processing().await.unwrap();
        session.set_band_gain(5, -4.0);
        store.fail_saves(true);
        assert!(matches!(session.close().await, Err(EngineError::PersistFailed(_))));
        assert_eq!(session.controller().context().live_graph_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_projects_saves_pending_edits() {
        let (store, mut session) = open_session().await;
        store.insert(blank_snapshot("p2", "Two"));
        session.set_band_gain(0, 5.0);
        session.open_project("p2").await.unwrap();

        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.project("p1").and_then(|p| p.bands).map(|b| b.gains()[0]),
            Some(5.0)
        );
        assert_eq!(store.project("p1").map(|p| p.eq_preset), Some(CUSTOM_PRESET.to_string()));
        assert!(!session.persist_status().is_dirty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.project("p2").and_then(|p| p.bands).map(|b| b.gains()[0]),
            Some(0.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn switch_goes_ahead_when_outgoing_save_fails() {
        let (store, mut session) = open_session().await;
        store.insert(blank_snapshot("p2", "Two"));
        session.set_band_gain(0, 5.0);
        store.fail_saves(true);
        session.open_project("p2").await.unwrap();

        assert_eq!(session.project().map(|p| p.id.as_str()), Some("p2"));
        assert!(!session.persist_status().is_dirty());
        store.fail_saves(false);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_keeps_current_project() {
        let (store, mut session) = open_session().await;
        let mut missing = blank_snapshot("p2", "Two");
        missing.source_locator = Some("memory://audio/missing".into());
        store.insert(missing);
        let mut corrupt = blank_snapshot("p3", "Three");
        corrupt.source_locator = Some("memory://audio/p3".into());
        store.insert(corrupt);
        store.insert_audio("memory://audio/p3", b"not audio".to_vec());

        session.play();
        session.enable_live_processing().await.unwrap();
        session.set_band_gain(2, -3.0);
        let graph_id = session.controller().graph().map(|g| g.id());

        assert!(matches!(session.open_project("p2").await, Err(EngineError::NoSource)));
        assert!(matches!(
            session.open_project("p3").await,
            Err(EngineError::SourceDecodeFailed(_))
        ));
        assert!(matches!(
            session.open_project("nope").await,
            Err(EngineError::ProjectNotFound(_))
        ));

        assert_eq!(session.project().map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(session.params().bands().gains()[2], -3.0);
        assert_eq!(session.preset_name(), CUSTOM_PRESET);
        assert!(session.persist_status().is_dirty());
        assert_eq!(session.mode(), PathMode::Eq);
        assert_eq!(session.controller().graph().map(|g| g.id()), graph_id);
        assert_eq!(session.render_export().unwrap().file_name, "My Track.wav");

        for _ in 0..200 {
            session.render(128);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.meter_state().level > 0.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            store.project("p1").and_then(|p| p.bands).map(|b| b.gains()[2]),
            Some(-3.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn opening_project_without_audio_drops_live_path() {
        let (store, mut session) = open_session().await;
        store.insert(blank_snapshot("p2", "Two"));
        session.enable_live_processing().await.unwrap();
        session.open_project("p2").await.unwrap();

        assert_eq!(session.mode(), PathMode::Normal);
        assert!(session.controller().graph().is_none());
        assert!(session.controller().source().is_none());
        assert_eq!(session.controller().context().live_graph_count(), 0);
        assert_eq!(session.meter_state(), MeterState::default());
    }

    #[test]
    fn meter_reading_after_cancel_is_dropped() {
        let (tx, rx) = watch::channel(MeterState::default());
        let flag = CancelFlag::default();
        let reading = MeterState {
            level: 0.5,
            ..MeterState::default()
        };
        assert!(publish_meter(&tx, &flag, reading));
        assert_eq!(*rx.borrow(), reading);

        flag.cancel();
        tx.send_replace(MeterState::default());
        assert!(!publish_meter(&tx, &flag, reading));
        assert_eq!(*rx.borrow(), MeterState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn status_save_failure_is_returned() {
        let (store, mut session) = open_session().await;
        store.fail_saves(true);
        assert!(matches!(
            session.set_status(ProjectStatus::Processing).await,
            Err(EngineError::PersistFailed(_))
        ));
        assert_eq!(session.project().map(|p| p.status), Some(ProjectStatus::Processing));
        assert!(session.persist_status().is_dirty());

        store.fail_saves(false);
        session.set_status(ProjectStatus::Processing).await.unwrap();
        assert_eq!(store.project("p1").map(|p| p.status), Some(ProjectStatus::Processing));
    }

    #[tokio::test(start_paused = true)]
    async fn export_reports_failed_status_save() {
        let (store, mut session) = open_session().await;
        store.fail_saves(true);
        assert!(matches!(session.export().await, Err(EngineError::PersistFailed(_))));
        assert_eq!(session.project().map(|p| p.status), Some(ProjectStatus::Completed));
        assert_eq!(store.project("p1").map(|p| p.status), Some(ProjectStatus::Draft));
        assert!(session.render_export().is_ok());
    }
}
