//! Decoded audio buffers and source decoding.

use std::io::Cursor;

use crate::error::DecodeError;

/// A fully decoded, planar f32 audio buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build from planar channel data. Channels are truncated to the shortest.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for c in channels.iter_mut() {
            c.truncate(len);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    /// Build from interleaved samples.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn length(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.length() as f64 / self.sample_rate as f64
        }
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Interleave into a single vector (frame-major).
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.length();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for c in &self.channels {
                out.push(c[i]);
            }
        }
        out
    }
}

/// Decode an encoded source (WAV, or MP3 with the `mp3` feature) into a buffer.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let buffer = if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)?
    } else if looks_like_mp3(bytes) {
        decode_mp3(bytes)?
    } else {
        return Err(DecodeError::UnknownFormat);
    };

    if buffer.length() == 0 || buffer.number_of_channels() == 0 {
        return Err(DecodeError::NoFrames);
    }
    log::debug!(
        "decoded source: {} ch, {} Hz, {:.2}s",
        buffer.number_of_channels(),
        buffer.sample_rate(),
        buffer.duration_sec()
    );
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(AudioBuffer::from_interleaved(spec.sample_rate, channel_count, &samples))
}

fn looks_like_mp3(bytes: &[u8]) -> bool {
    bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
}

#[cfg(feature = "mp3")]
fn decode_mp3(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples: Vec<f32> = Vec::new();
    let mut format: Option<(u32, usize)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_format = (frame.sample_rate as u32, frame.channels);
                // Mid-stream format changes are not supported; keep the first.
                if *format.get_or_insert(frame_format) != frame_format {
                    continue;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(DecodeError::Mp3(format!("{e:?}"))),
        }
    }

    let (sample_rate, channel_count) = format.ok_or(DecodeError::NoFrames)?;
    Ok(AudioBuffer::from_interleaved(sample_rate, channel_count, &samples))
}

#[cfg(not(feature = "mp3"))]
fn decode_mp3(_bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    Err(DecodeError::UnknownFormat)
}
