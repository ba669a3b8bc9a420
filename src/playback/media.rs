//! Media handles: playable cursors over a decoded source.
//!
//! A handle can be bound into at most one signal chain graph over its whole
//! life. Once bound it is consumed; the graph builder recovers by cloning a
//! fresh handle from the same source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::AudioBuffer;
use crate::error::GraphError;

static NEXT_MEDIA_ID: AtomicU64 = AtomicU64::new(1);

/// Where a source's encoded bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SourceLocator {
    /// A local object URL for a file the user just picked.
    ObjectUrl(String),
    /// A stored upload.
    RemoteUrl(String),
    /// Bytes already in memory; the label is for logs only.
    InMemory(String),
}

impl SourceLocator {
    /// Classify a locator string as stored by the project collaborator.
    pub fn parse(locator: &str) -> Self {
        if locator.starts_with("blob:") {
            SourceLocator::ObjectUrl(locator.to_string())
        } else {
            SourceLocator::RemoteUrl(locator.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceLocator::ObjectUrl(s) | SourceLocator::RemoteUrl(s) | SourceLocator::InMemory(s) => s,
        }
    }
}

/// A decoded, ready-to-play source. Replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct AudioSourceHandle {
    locator: SourceLocator,
    buffer: Arc<AudioBuffer>,
}

impl AudioSourceHandle {
    pub fn new(locator: SourceLocator, buffer: AudioBuffer) -> Self {
        Self {
            locator,
            buffer: Arc::new(buffer),
        }
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn duration_sec(&self) -> f64 {
        self.buffer.duration_sec()
    }
}

/// A playable media element over a source.
#[derive(Debug)]
pub struct MediaHandle {
    id: u64,
    source: AudioSourceHandle,
    position: usize,
    volume: f32,
    playing: bool,
    bound: bool,
}

impl MediaHandle {
    pub fn open(source: AudioSourceHandle) -> Self {
        Self {
            id: NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed),
            source,
            position: 0,
            volume: 1.0,
            playing: false,
            bound: false,
        }
    }

    /// New unbound handle with the same source, position, volume and play state.
    pub fn fresh_clone(&self) -> Self {
        Self {
            id: NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed),
            source: self.source.clone(),
            position: self.position,
            volume: self.volume,
            playing: self.playing,
            bound: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &AudioSourceHandle {
        &self.source
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Consume the handle for a graph.
    pub(crate) fn bind(&mut self) -> Result<(), GraphError> {
        if self.bound {
            return Err(GraphError::MediaAlreadyBound(self.id));
        }
        self.bound = true;
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.source.buffer.sample_rate() as f64
    }

    pub fn position_sec(&self) -> f64 {
        self.position as f64 / self.sample_rate()
    }

    /// Seek, clamped to the source duration.
    pub fn seek(&mut self, position_sec: f64) {
        let frames = (position_sec.max(0.0) * self.sample_rate()).round() as usize;
        self.position = frames.min(self.source.buffer.length());
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_ended(&self) -> bool {
        self.position >= self.source.buffer.length()
    }

    /// Start playback; an ended handle restarts from the top.
    pub fn play(&mut self) {
        if self.is_ended() {
            self.position = 0;
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Pull `frames` planar frames at the current volume and advance.
    /// A paused handle yields silence; reaching the end pads with silence
    /// and stops playback.
    pub fn read(&mut self, frames: usize) -> Vec<Vec<f32>> {
        let buffer = self.source.buffer.clone();
        let mut block = vec![vec![0.0; frames]; buffer.number_of_channels()];
        if !self.playing {
            return block;
        }

        let available = buffer.length().saturating_sub(self.position).min(frames);
        for (out, input) in block.iter_mut().zip(buffer.channels()) {
            let src = &input[self.position..self.position + available];
            for (o, &s) in out.iter_mut().zip(src) {
                *o = s * self.volume;
            }
        }
        self.position += available;
        if self.is_ended() {
            self.playing = false;
        }
        block
    }
}
