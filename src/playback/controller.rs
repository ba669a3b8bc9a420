//! Dual-path playback controller.
//!
//! Owns the normal (unprocessed) and EQ timelines plus the single live
//! signal chain graph. Switching paths copies transport state across, and
//! the EQ path always gets a freshly opened media handle, so a graph never
//! inherits a handle consumed by its predecessor.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::params::{ParamChange, ParameterStore};

use super::context::AudioContext;
use super::graph::{GraphOptions, SignalChainGraph};
use super::media::{AudioSourceHandle, MediaHandle};
use super::timeline::{PlaybackTimeline, TransportState, copy_transport_state};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    #[default]
    Normal,
    Eq,
}

#[derive(Debug)]
pub struct DualPathController {
    context: AudioContext,
    options: GraphOptions,
    mode: PathMode,
    normal: PlaybackTimeline,
    eq: PlaybackTimeline,
    graph: Option<SignalChainGraph>,
}

impl DualPathController {
    pub fn new(context: AudioContext, options: GraphOptions) -> Self {
        Self {
            context,
            options,
            mode: PathMode::Normal,
            normal: PlaybackTimeline::new(),
            eq: PlaybackTimeline::new(),
            graph: None,
        }
    }

    pub fn mode(&self) -> PathMode {
        self.mode
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.context
    }

    pub fn graph(&self) -> Option<&SignalChainGraph> {
        self.graph.as_ref()
    }

    pub fn source(&self) -> Option<&AudioSourceHandle> {
        self.normal.source()
    }

    pub fn normal_timeline(&self) -> &PlaybackTimeline {
        &self.normal
    }

    pub fn eq_timeline(&self) -> &PlaybackTimeline {
        &self.eq
    }

    fn active(&self) -> &PlaybackTimeline {
        match self.mode {
            PathMode::Normal => &self.normal,
            PathMode::Eq => &self.eq,
        }
    }

    fn active_mut(&mut self) -> &mut PlaybackTimeline {
        match self.mode {
            PathMode::Normal => &mut self.normal,
            PathMode::Eq => &mut self.eq,
        }
    }

    /// Point both timelines at a new source. Always lands in `Normal`.
    pub fn load_source(&mut self, source: AudioSourceHandle) {
        SignalChainGraph::teardown(&mut self.graph);
        self.eq.pause();
        self.normal.pause();
        self.normal.load(source.clone());
        self.eq.load(source);
        self.mode = PathMode::Normal;
        log::debug!("source loaded, controller reset to normal path");
    }

    /// Drop the current source and any graph.
    pub fn unload_source(&mut self) {
        SignalChainGraph::teardown(&mut self.graph);
        self.normal.clear();
        self.eq.clear();
        self.mode = PathMode::Normal;
    }

    /// Switch to the processed path. A no-op when already there.
    ///
    /// On failure the normal path is restored (including play state) and
    /// the error is returned; the controller never ends up with no audible
    /// path.
    pub async fn enable(&mut self, params: &ParameterStore) -> EngineResult<()> {
        if self.mode == PathMode::Eq {
            return Ok(());
        }
        let Some(source) = self.normal.source().cloned() else {
            return Err(EngineError::NoSource);
        };

        let state = self.normal.transport();
        self.normal.pause();

        // Earlier graphs must be fully gone before the next one is wired.
        SignalChainGraph::teardown(&mut self.graph);

        let mut media = MediaHandle::open(source);
        media.seek(state.position_sec);
        media.set_volume(state.volume);

        let built = SignalChainGraph::build(
            &mut self.context,
            &mut media,
            params.bands(),
            params.compressor(),
            &self.options,
        )
        .await;

        match built {
            Ok(graph) => {
                self.graph = Some(graph);
                self.eq.set_media(media);
                if state.is_playing {
                    self.eq.play();
                }
                self.mode = PathMode::Eq;
                log::debug!("switched to eq path at {:.3}s", state.position_sec);
                Ok(())
            }
            Err(e) => {
                log::error!("enabling eq path failed, staying on normal path: {e}");
                if state.is_playing {
                    self.normal.play();
                }
                Err(e.into())
            }
        }
    }

    /// Switch back to the unprocessed path. A no-op when already there.
    pub fn disable(&mut self) {
        if self.mode == PathMode::Normal {
            return;
        }
        copy_transport_state(&self.eq, &mut self.normal);
        self.eq.pause();
        SignalChainGraph::teardown(&mut self.graph);

        self.mode = PathMode::Normal;
        log::debug!(
            "switched to normal path at {:.3}s",
            self.normal.transport().position_sec
        );
    }

    /// Push a parameter-store mutation into the live graph, if any.
    pub fn apply_change(&mut self, change: &ParamChange) {
        if let Some(graph) = self.graph.as_mut() {
            graph.apply(change);
        }
    }

    pub fn transport(&self) -> TransportState {
        self.active().transport()
    }

    pub fn play(&mut self) {
        self.active_mut().play();
    }

    pub fn pause(&mut self) {
        self.active_mut().pause();
    }

    pub fn seek(&mut self, position_sec: f64) {
        self.active_mut().seek(position_sec);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.active_mut().set_volume(volume);
    }

    /// Pull one planar block from the active path (host output callback).
    pub fn render(&mut self, frames: usize) -> Vec<Vec<f32>> {
        match self.mode {
            PathMode::Normal => match self.normal.media_mut() {
                Some(media) => media.read(frames),
                None => Vec::new(),
            },
            PathMode::Eq => match (self.graph.as_mut(), self.eq.media_mut()) {
                (Some(graph), Some(media)) => graph.render(media, frames),
                _ => Vec::new(),
            },
        }
    }

    /// Tear down any live graph and close the context.
    pub fn shutdown(&mut self) {
        self.disable();
        SignalChainGraph::teardown(&mut self.graph);
        self.context.close();
    }
}
