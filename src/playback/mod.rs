//! Live playback: media handles, timelines, the live graph and the
//! controller that switches between the normal and EQ paths.

pub mod context;
pub mod controller;
pub mod graph;
pub mod media;
pub mod timeline;

pub use context::{AudioContext, ContextState};
pub use controller::{DualPathController, PathMode};
pub use graph::{GraphOptions, SignalChainGraph};
pub use media::{AudioSourceHandle, MediaHandle, SourceLocator};
pub use timeline::{PlaybackTimeline, TransportState, copy_transport_state};
