//! Playback timelines and transport-state transfer between them.

use serde::{Deserialize, Serialize};

use super::media::{AudioSourceHandle, MediaHandle};

/// The transport fields carried across a mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub position_sec: f64,
    pub volume: f32,
    pub is_playing: bool,
}

/// One playback path. Holds at most one media handle over the current source.
#[derive(Debug, Default)]
pub struct PlaybackTimeline {
    media: Option<MediaHandle>,
}

impl PlaybackTimeline {
    pub fn new() -> Self {
        Self { media: None }
    }

    /// Point the timeline at a new source, rewound and paused.
    pub fn load(&mut self, source: AudioSourceHandle) {
        let volume = self.media.as_ref().map_or(1.0, |m| m.volume());
        let mut media = MediaHandle::open(source);
        media.set_volume(volume);
        self.media = Some(media);
    }

    pub fn set_media(&mut self, media: MediaHandle) {
        self.media = Some(media);
    }

    pub fn media(&self) -> Option<&MediaHandle> {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> Option<&mut MediaHandle> {
        self.media.as_mut()
    }

    pub fn source(&self) -> Option<&AudioSourceHandle> {
        self.media.as_ref().map(|m| m.source())
    }

    pub fn transport(&self) -> TransportState {
        self.media.as_ref().map_or(TransportState::default(), |m| TransportState {
            position_sec: m.position_sec(),
            volume: m.volume(),
            is_playing: m.is_playing(),
        })
    }

    /// Apply position and volume. Play state is left to the caller so a
    /// path can be prepared before it starts.
    pub fn apply_position_and_volume(&mut self, state: &TransportState) {
        if let Some(m) = self.media.as_mut() {
            m.seek(state.position_sec);
            m.set_volume(state.volume);
        }
    }

    pub fn play(&mut self) {
        if let Some(m) = self.media.as_mut() {
            m.play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(m) = self.media.as_mut() {
            m.pause();
        }
    }

    pub fn seek(&mut self, position_sec: f64) {
        if let Some(m) = self.media.as_mut() {
            m.seek(position_sec);
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if let Some(m) = self.media.as_mut() {
            m.set_volume(volume);
        }
    }

    pub fn clear(&mut self) {
        self.media = None;
    }
}

/// Copy position, volume and play state from one timeline to another.
pub fn copy_transport_state(from: &PlaybackTimeline, to: &mut PlaybackTimeline) {
    let state = from.transport();
    to.apply_position_and_volume(&state);
    if state.is_playing {
        to.play();
    } else {
        to.pause();
    }
}
