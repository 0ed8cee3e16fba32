//! Sentence-aligned chunking and explicit multi-voice segments.
//!
//! Automatic mode normalises whitespace, splits the text into sentences and
//! packs consecutive sentences into chunks of at most `max_chars` characters.
//! A sentence is never split; one that is longer than the bound on its own
//! becomes a chunk by itself.
//!
//! Sentence grammar: a sentence ends after a run of terminators `[.!?…]+`,
//! optionally followed by closing quotes or brackets, when that run is
//! followed by whitespace or the end of the text.  `...` is therefore a single
//! boundary and `3.14` is not a boundary at all.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsError};

/// Maximum characters per provider request in document mode.
pub const DEFAULT_MAX_CHARS: usize = 400;

static RE_SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+["'”’»)\]]*(?:\s+|$)"#).unwrap());

// ─────────────────────────────────────────────────────────────────────────────
// Data model
// ─────────────────────────────────────────────────────────────────────────────

/// One provider request worth of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    /// `None` falls back to the default voice.
    pub voice: Option<String>,
    /// `None` falls back to the configured model.
    pub model: Option<String>,
    pub language: Option<String>,
    pub speed: Option<f32>,
}

impl TextChunk {
    fn plain(index: usize, text: String) -> Self {
        Self { index, text, voice: None, model: None, language: None, speed: None }
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Caller-supplied `{voice, text}` pair for podcast delivery.
///
/// Matches the `--segments` JSON shape:
/// `[{"voice":"atrium","text":"Hi"},{"voice":"luna","text":"Hey","lang":"eng"}]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, rename = "lang", alias = "language", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

impl Segment {
    pub fn new(voice: impl Into<String>, text: impl Into<String>) -> Self {
        Self { voice: Some(voice.into()), text: text.into(), model: None, language: None, speed: None }
    }
}

/// Parse a JSON array of segments.
pub fn parse_segments(json: &str) -> Result<Vec<Segment>> {
    serde_json::from_str(json)
        .map_err(|e| TtsError::config(format!("cannot parse segments JSON: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Text helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split already-normalised text into sentences.
///
/// Each returned slice is trimmed; joining them with single spaces gives the
/// input back.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in RE_SENTENCE_END.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

// ─────────────────────────────────────────────────────────────────────────────
// Segmenter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    max_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self { max_chars: DEFAULT_MAX_CHARS }
    }
}

impl Segmenter {
    pub fn new(max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(TtsError::config("maximum chunk length must be positive"));
        }
        Ok(Self { max_chars })
    }

    /// Pack the sentences of `text` into chunks of at most `max_chars`.
    pub fn chunk_text(&self, text: &str) -> Result<Vec<TextChunk>> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Err(TtsError::EmptyInput("text is empty".into()));
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(&normalized) {
            let len = sentence.chars().count();
            if !current.is_empty() && current_len + 1 + len > self.max_chars {
                let index = chunks.len();
                chunks.push(TextChunk::plain(index, std::mem::take(&mut current)));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(sentence);
            current_len += len;
        }
        if !current.is_empty() {
            let index = chunks.len();
            chunks.push(TextChunk::plain(index, current));
        }

        tracing::debug!(
            chars = normalized.chars().count(),
            chunks = chunks.len(),
            max_chars = self.max_chars,
            "chunked document"
        );
        Ok(chunks)
    }

    /// Turn explicit segments into chunks, preserving their order verbatim.
    pub fn from_segments(&self, segments: Vec<Segment>) -> Result<Vec<TextChunk>> {
        if segments.is_empty() {
            return Err(TtsError::EmptyInput("segment list is empty".into()));
        }
        segments
            .into_iter()
            .enumerate()
            .map(|(index, seg)| {
                if seg.text.trim().is_empty() {
                    return Err(TtsError::EmptyInput(format!("segment {index} has no text")));
                }
                if let Some(speed) = seg.speed {
                    if !(speed.is_finite() && speed > 0.0) {
                        return Err(TtsError::config(format!(
                            "segment {index} speed must be positive, got {speed}"
                        )));
                    }
                }
                Ok(TextChunk {
                    index,
                    text: seg.text,
                    voice: seg.voice.filter(|v| !v.trim().is_empty()),
                    model: seg.model.filter(|m| !m.trim().is_empty()),
                    language: seg.language,
                    speed: seg.speed,
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
