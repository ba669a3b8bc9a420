//! DSP: the EQ/compressor signal chain and its building blocks.
//!
//! The same chain powers live audition (pulled block by block by the host
//! output) and offline WAV export, so both paths produce identical samples
//! for identical parameters.

pub mod analyser;
pub mod buffer;
pub mod chain;
pub mod compressor;
pub mod filter;
pub mod renderer;

/// Frames processed per block, matching the WebAudio render quantum.
pub const RENDER_QUANTUM: usize = 128;
