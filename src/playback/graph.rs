//! Signal chain graph: the live wiring of media → compressor → bands → tap → output.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::dsp::analyser::{AnalyserConfig, AnalysisTap};
use crate::dsp::chain::SignalChain;
use crate::dsp::compressor::DEFAULT_KNEE_DB;
use crate::error::GraphError;
use crate::params::{CompressorSettings, EqBands, ParamChange};

use super::context::{AudioContext, GraphSlot};
use super::media::MediaHandle;

const MAX_CHANNELS: usize = 8;

/// Node settings that are not user parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphOptions {
    pub knee_db: f64,
    pub analyser: AnalyserConfig,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            knee_db: DEFAULT_KNEE_DB,
            analyser: AnalyserConfig::default(),
        }
    }
}

/// A live, connected signal chain bound to one media handle.
#[derive(Debug)]
pub struct SignalChainGraph {
    slot: GraphSlot,
    media_id: u64,
    chain: SignalChain,
    tap: Arc<Mutex<AnalysisTap>>,
}

impl SignalChainGraph {
    /// Resume the context, bind `media` as the source and connect the chain.
    ///
    /// If `media` was already consumed by an earlier graph it is replaced in
    /// place by a fresh clone (same source, position, volume and play state)
    /// and binding is retried once.
    pub async fn build(
        context: &mut AudioContext,
        media: &mut MediaHandle,
        bands: &EqBands,
        compressor: &CompressorSettings,
        options: &GraphOptions,
    ) -> Result<Self, GraphError> {
        context.resume().await?;

        let buffer = media.source().buffer().clone();
        let channels = buffer.number_of_channels();
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(GraphError::UnsupportedChannels(channels));
        }

        let slot = context.admit_graph()?;

        if let Err(GraphError::MediaAlreadyBound(stale)) = media.bind() {
            let fresh = media.fresh_clone();
            log::warn!(
                "media {stale} already bound to a closed graph, rebinding as {}",
                fresh.id()
            );
            *media = fresh;
            media.bind()?;
        }

        let chain = SignalChain::new(
            buffer.sample_rate() as f64,
            channels,
            bands,
            compressor,
            options.knee_db,
        );
        let tap = Arc::new(Mutex::new(AnalysisTap::new(options.analyser)));

        log::debug!(
            "graph {} built: media {} ({} ch @ {} Hz)",
            slot.id(),
            media.id(),
            channels,
            buffer.sample_rate()
        );
        Ok(Self {
            slot,
            media_id: media.id(),
            chain,
            tap,
        })
    }

    /// Disconnect and release a graph. Safe on `None`.
    pub fn teardown(graph: &mut Option<SignalChainGraph>) {
        if let Some(g) = graph.take() {
            log::debug!("graph {} torn down", g.id());
        }
    }

    pub fn id(&self) -> u64 {
        self.slot.id()
    }

    pub fn media_id(&self) -> u64 {
        self.media_id
    }

    /// Gain set on a live band node.
    pub fn band_gain(&self, index: usize) -> Option<f64> {
        self.chain.band_gain(index)
    }

    pub fn compressor_settings(&self) -> &CompressorSettings {
        self.chain.compressor_settings()
    }

    /// Push a parameter change into the live node.
    pub fn apply(&mut self, change: &ParamChange) {
        log::trace!("graph {}: {:?}", self.id(), change);
        self.chain.apply(change);
    }

    /// Shared handle on the analysis tap for the meter.
    pub fn tap(&self) -> Arc<Mutex<AnalysisTap>> {
        self.tap.clone()
    }

    /// Pull one block from the bound media through the chain. The tap sees
    /// a copy of the output; the returned block is what reaches the output.
    pub fn render(&mut self, media: &mut MediaHandle, frames: usize) -> Vec<Vec<f32>> {
        if media.id() != self.media_id {
            log::warn!(
                "graph {} asked to render unbound media {}",
                self.id(),
                media.id()
            );
            return vec![vec![0.0; frames]; media.source().buffer().number_of_channels()];
        }

        let mut block = media.read(frames);
        {
            let mut refs: Vec<&mut [f32]> = block.iter_mut().map(|c| c.as_mut_slice()).collect();
            self.chain.process(&mut refs);
        }
        let views: Vec<&[f32]> = block.iter().map(|c| c.as_slice()).collect();
        self.tap.lock().push(&views);
        block
    }
}
