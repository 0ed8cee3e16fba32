//! PCM buffers and silence-padded stitching.
//!
//! All audio is signed 16-bit little-endian PCM, interleaved when
//! `channels > 1`.  Buffers are concatenated as-is: no resampling and no
//! cross-fade.  A buffer whose format differs from the first one is a fatal
//! error rather than something to paper over.

use std::fmt;

use crate::config::MAX_PAUSE_SECS;
use crate::error::{Result, TtsError};

// ─────────────────────────────────────────────────────────────────────────────
// SampleFormat
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1 }
    }

    /// Number of interleaved samples spanning `secs` seconds.  `None` for a
    /// negative or non-finite duration, or one that overflows `usize`.
    pub fn samples_for(&self, secs: f64) -> Option<usize> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let frames = (secs * self.sample_rate as f64).round();
        if frames >= usize::MAX as f64 {
            return None;
        }
        (frames as usize).checked_mul(self.channels as usize)
    }

    /// Duration in seconds of `samples` interleaved samples.
    pub fn secs_for(&self, samples: usize) -> f64 {
        let frames = samples / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// A zero-filled buffer of `secs` seconds in this format.
    ///
    /// Pauses above [`MAX_PAUSE_SECS`] are refused before anything is allocated.
    pub fn silence(&self, secs: f64) -> Result<Vec<i16>> {
        let len = Some(secs)
            .filter(|&s| s <= MAX_PAUSE_SECS)
            .and_then(|s| self.samples_for(s))
            .ok_or_else(|| {
                TtsError::config(format!(
                    "pause must be between 0 and {MAX_PAUSE_SECS} seconds, got {secs}"
                ))
            })?;
        Ok(vec![0; len])
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz/{} ch", self.sample_rate, self.channels)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AudioBuffer
// ─────────────────────────────────────────────────────────────────────────────

/// Decoded audio for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub chunk_index: usize,
    pub format: SampleFormat,
    pub samples: Vec<i16>,
}

impl AudioBuffer {
    pub fn new(chunk_index: usize, format: SampleFormat, samples: Vec<i16>) -> Self {
        Self { chunk_index, format, samples }
    }

    /// Decode raw little-endian 16-bit PCM.  Returns `None` on an odd byte count.
    pub fn from_pcm_le(chunk_index: usize, format: SampleFormat, bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 2 != 0 {
            return None;
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Some(Self::new(chunk_index, format, samples))
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.secs_for(self.samples.len())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StitchedTrack
// ─────────────────────────────────────────────────────────────────────────────

/// What occupies a stretch of the stitched stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    Speech { chunk_index: usize },
    Silence,
}

/// A contiguous run of samples inside a [`StitchedTrack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub piece: Piece,
    /// Offset in samples.
    pub start: usize,
    /// Length in samples.
    pub len: usize,
}

/// Ordered concatenation of chunk audio with silence between neighbours.
#[derive(Debug, Clone)]
pub struct StitchedTrack {
    gap_secs: f64,
    format: Option<SampleFormat>,
    samples: Vec<i16>,
    spans: Vec<Span>,
}

impl StitchedTrack {
    pub fn new(gap_secs: f64) -> Self {
        Self { gap_secs, format: None, samples: Vec::new(), spans: Vec::new() }
    }

    /// Append one chunk's audio, preceded by a gap unless it is the first.
    ///
    /// The first buffer fixes the format of the track.
    pub fn append(&mut self, buffer: AudioBuffer) -> Result<()> {
        let AudioBuffer { chunk_index, format, samples } = buffer;
        match self.format {
            Some(expected) if expected != format => {
                return Err(TtsError::SampleFormatMismatch {
                    index: chunk_index,
                    expected,
                    found: format,
                });
            }
            Some(_) => {
                let gap = format.silence(self.gap_secs)?;
                self.push(Piece::Silence, gap);
            }
            None => self.format = Some(format),
        }
        self.push(Piece::Speech { chunk_index }, samples);
        Ok(())
    }

    fn push(&mut self, piece: Piece, samples: Vec<i16>) {
        self.spans.push(Span { piece, start: self.samples.len(), len: samples.len() });
        self.samples.extend(samples);
    }

    pub fn format(&self) -> Option<SampleFormat> {
        self.format
    }

    pub fn gap_secs(&self) -> f64 {
        self.gap_secs
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Chunk indices in the order their audio appears.
    pub fn chunk_order(&self) -> Vec<usize> {
        self.spans
            .iter()
            .filter_map(|s| match s.piece {
                Piece::Speech { chunk_index } => Some(chunk_index),
                Piece::Silence => None,
            })
            .collect()
    }

    pub fn gap_count(&self) -> usize {
        self.spans.iter().filter(|s| s.piece == Piece::Silence).count()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.map_or(0.0, |f| f.secs_for(self.samples.len()))
    }

    /// Raw little-endian byte stream, as consumed by `ffmpeg -f s16le`.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
