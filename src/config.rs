//! Run settings and the provider credential.
//!
//! [`Settings`] is an explicit value handed to the synthesizer; nothing here
//! is global.  It deserialises from a JSON file where every field is optional:
//!
//! ```json
//! { "voice": "luna", "pause_secs": 0.4, "language": "eng" }
//! ```

use std::{fmt, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsError};
use crate::segment::DEFAULT_MAX_CHARS;

/// Environment variable holding the Rime API key.
pub const API_KEY_ENV: &str = "RIME_API_KEY";

pub const DEFAULT_ENDPOINT: &str = "https://users.rime.ai/v1/rime-tts";
pub const DEFAULT_VOICE: &str = "atrium";
pub const DEFAULT_MODEL: &str = "arcana";
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_PAUSE_SECS: f64 = 0.3;
/// Longest accepted gap between chunks.
pub const MAX_PAUSE_SECS: f64 = 60.0;

// ─────────────────────────────────────────────────────────────────────────────
// Output format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// OGG container, Opus codec (voice-note ready).
    #[default]
    Ogg,
    /// 16-bit PCM WAV.
    Wav,
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Voice used by chunks that do not name one.
    pub voice: String,
    pub model: String,
    /// Speed multiplier sent as `speedAlpha`.
    pub speed: f32,
    /// Language code, e.g. `eng`, `fra`, `spa`.
    pub language: Option<String>,
    /// Silence inserted between adjacent chunks.
    pub pause_secs: f64,
    pub max_chunk_chars: usize,
    pub sample_rate: u32,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Opus target bitrate passed to ffmpeg.
    pub bitrate: String,
    /// ffmpeg executable.
    pub ffmpeg: PathBuf,
    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            speed: 1.0,
            language: None,
            pause_secs: DEFAULT_PAUSE_SECS,
            max_chunk_chars: DEFAULT_MAX_CHARS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
            bitrate: "64k".to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
            format: OutputFormat::Ogg,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            TtsError::config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            TtsError::config(format!("cannot parse settings {}: {e}", path.display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.voice.trim().is_empty() {
            return Err(TtsError::config("default voice must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(TtsError::config("model must not be empty"));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(TtsError::config(format!("speed must be positive, got {}", self.speed)));
        }
        if !(self.pause_secs.is_finite() && (0.0..=MAX_PAUSE_SECS).contains(&self.pause_secs)) {
            return Err(TtsError::config(format!(
                "pause must be between 0 and {MAX_PAUSE_SECS} seconds, got {}",
                self.pause_secs
            )));
        }
        if self.max_chunk_chars == 0 {
            return Err(TtsError::config("maximum chunk length must be positive"));
        }
        if self.sample_rate == 0 {
            return Err(TtsError::config("sample rate must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(TtsError::config("request timeout must be positive"));
        }
        if self.bitrate.trim().is_empty() {
            return Err(TtsError::config("bitrate must not be empty"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// Bearer token for the provider.  `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Read [`API_KEY_ENV`] once; absent or blank is fatal.
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(API_KEY_ENV).ok())
    }

    pub fn from_value(value: Option<String>) -> Result<Self> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(Self(v.trim().to_string())),
            _ => Err(TtsError::MissingCredential(API_KEY_ENV)),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
