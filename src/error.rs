//! Error taxonomy for a single synthesis run.
//!
//! Every variant is terminal: the pipeline never recovers locally and never
//! writes a truncated artifact.

use thiserror::Error;

use crate::audio::SampleFormat;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TtsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TtsError {
    /// No text, an empty segment list, or a segment with blank text.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A setting or CLI value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The provider failed for one chunk; the whole run is aborted.
    #[error("synthesis failed on chunk {index}: {detail}")]
    Synthesis { index: usize, detail: String },

    /// A chunk's audio cannot be concatenated with the audio before it.
    #[error("chunk {index} returned {found} audio, expected {expected}")]
    SampleFormatMismatch {
        index: usize,
        expected: SampleFormat,
        found: SampleFormat,
    },

    /// The encoder could not be started, exited non-zero, or the artifact
    /// could not be moved into place.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The provider API key is not present in the environment.
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),
}

impl TtsError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_message_names_chunk() {
        let e = TtsError::Synthesis { index: 2, detail: "HTTP 429: slow down".into() };
        assert_eq!(e.to_string(), "synthesis failed on chunk 2: HTTP 429: slow down");
    }

    #[test]
    fn test_mismatch_message() {
        let e = TtsError::SampleFormatMismatch {
            index: 1,
            expected: SampleFormat::mono(48_000),
            found: SampleFormat::mono(24_000),
        };
        assert_eq!(
            e.to_string(),
            "chunk 1 returned 24000 Hz/1 ch audio, expected 48000 Hz/1 ch"
        );
    }
}
