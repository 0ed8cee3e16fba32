//! # rime-tts
//!
//! Turns arbitrarily long, already-normalised text into a single voice note
//! using the [Rime](https://rime.ai) text-to-speech API.
//!
//! ## Quick start
//!
//! ```no_run
//! use rime_tts::{encode, Credential, RimeClient, Segmenter, Settings, Synthesizer};
//!
//! let settings = Settings::default();
//! let credential = Credential::from_env().unwrap();
//!
//! let chunks = Segmenter::new(settings.max_chunk_chars)
//!     .unwrap()
//!     .chunk_text("Hello there. This is a test.")
//!     .unwrap();
//!
//! let provider = RimeClient::new(&settings, credential);
//! let encoder = encode::for_settings(&settings);
//! let artifact = Synthesizer::new(provider, encoder, settings)
//!     .synthesize_to_temp(&chunks)
//!     .unwrap();
//! println!("{}", artifact.path.display());
//! ```
//!
//! ## Podcast mode
//!
//! ```no_run
//! use rime_tts::{parse_segments, Segmenter};
//!
//! let segments = parse_segments(r#"[{"voice":"atrium","text":"Hi"},{"voice":"luna","text":"Hey"}]"#).unwrap();
//! let chunks = Segmenter::default().from_segments(segments).unwrap();
//! assert_eq!(chunks.len(), 2);
//! ```
//!
//! ## Pipeline
//! 1. **Chunking**: whitespace normalised, sentences packed into ≤ 400-char
//!    chunks (or explicit `{voice, text}` segments taken verbatim).
//! 2. **Synthesis**: one blocking Rime request per chunk, strictly in order,
//!    returning 48 kHz mono 16-bit PCM.
//! 3. **Stitching**: buffers concatenated with a silence gap between
//!    neighbours; mismatched sample formats abort the run.
//! 4. **Encoding**: one `ffmpeg` call producing OGG/Opus (or a WAV via
//!    `hound`), staged and renamed into place.
//!
//! ## Requirements
//! | What          | Why                                   |
//! |---------------|---------------------------------------|
//! | `RIME_API_KEY`| Bearer token for the Rime API         |
//! | `ffmpeg`      | OGG/Opus output (`libopus` enabled)   |

pub mod audio;
pub mod config;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod segment;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::{AudioBuffer, SampleFormat, StitchedTrack};
pub use config::{Credential, OutputFormat, Settings};
pub use error::{Result, TtsError};
pub use pipeline::{OutputArtifact, Synthesizer};
pub use provider::{RimeClient, SpeechProvider, SynthesisRequest};
pub use segment::{parse_segments, Segment, Segmenter, TextChunk};
