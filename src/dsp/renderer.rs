//! Offline renderer: runs a whole decoded buffer through the signal chain
//! and encodes the result as a 16-bit PCM WAV.

use crate::error::DecodeError;
use crate::params::{CompressorSettings, EqBands};

use super::RENDER_QUANTUM;
use super::buffer::{self, AudioBuffer};
use super::chain::SignalChain;

/// Render a buffer through compressor → bands at the buffer's sample rate.
pub fn render(
    source: &AudioBuffer,
    bands: &EqBands,
    compressor: &CompressorSettings,
    knee_db: f64,
) -> AudioBuffer {
    let mut chain = SignalChain::new(
        source.sample_rate() as f64,
        source.number_of_channels(),
        bands,
        compressor,
        knee_db,
    );
    let mut output = source.clone();
    let frames = output.length();

    let mut start = 0;
    while start < frames {
        let end = (start + RENDER_QUANTUM).min(frames);
        let mut block: Vec<&mut [f32]> = output
            .channels_mut()
            .iter_mut()
            .map(|c| &mut c[start..end])
            .collect();
        chain.process(&mut block);
        start = end;
    }

    log::debug!(
        "offline render: {} frames, {} ch @ {} Hz",
        frames,
        output.number_of_channels(),
        output.sample_rate()
    );
    output
}

/// Render a buffer and encode it as WAV bytes.
pub fn render_wav(
    source: &AudioBuffer,
    bands: &EqBands,
    compressor: &CompressorSettings,
    knee_db: f64,
) -> Vec<u8> {
    encode_wav(&render(source, bands, compressor, knee_db))
}

/// Decode encoded source bytes, render, and encode. Decode failure is fatal.
pub fn render_source_wav(
    source_bytes: &[u8],
    bands: &EqBands,
    compressor: &CompressorSettings,
    knee_db: f64,
) -> Result<Vec<u8>, DecodeError> {
    let source = buffer::decode(source_bytes)?;
    Ok(render_wav(&source, bands, compressor, knee_db))
}

/// Convert a float sample to i16. Inverse of the decoder's `/ 32768` scaling.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample as f64 * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Encode a buffer as a 16-bit interleaved PCM WAV.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.number_of_channels() as u16;
    let sample_rate = buffer.sample_rate();
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (buffer.length() * block_align as usize) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for i in 0..buffer.length() {
        for channel in buffer.channels() {
            buf.extend_from_slice(&to_i16(channel[i]).to_le_bytes());
        }
    }

    buf
}
