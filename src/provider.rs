//! Text-to-speech providers.
//!
//! [`SpeechProvider`] is the seam between the pipeline and the network:
//! one call per chunk, returning decoded PCM.  Providers never retry; a
//! failure is reported and the run is aborted by the caller.
//!
//! [`RimeClient`] talks to the Rime HTTP API:
//!
//! | Header          | Value              |
//! |-----------------|--------------------|
//! | `Authorization` | `Bearer <api key>` |
//! | `Accept`        | `audio/pcm`        |
//!
//! The body is `{text, speaker, modelId, samplingRate, speedAlpha, lang?}` and
//! the response is raw mono 16-bit little-endian PCM at `samplingRate`.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::audio::{AudioBuffer, SampleFormat};
use crate::config::{Credential, Settings};

/// Upper bound on one response body.  400 characters of speech at 48 kHz is
/// a few MB; this leaves room for very slow speeds.
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

/// One chunk's synthesis parameters, with defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest<'a> {
    pub index: usize,
    pub text: &'a str,
    pub voice: &'a str,
    pub model: &'a str,
    pub language: Option<&'a str>,
    pub speed: f32,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("bad audio payload: {0}")]
    Payload(String),
}

pub trait SpeechProvider {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, ProviderError>;
}

impl<P: SpeechProvider + ?Sized> SpeechProvider for &P {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, ProviderError> {
        (**self).synthesize(request)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rime
// ─────────────────────────────────────────────────────────────────────────────

/// JSON body of a Rime TTS request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RimeRequest<'a> {
    text: &'a str,
    speaker: &'a str,
    model_id: &'a str,
    sampling_rate: u32,
    speed_alpha: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<&'a str>,
}

pub struct RimeClient {
    agent: ureq::Agent,
    endpoint: String,
    sample_rate: u32,
    credential: Credential,
}

impl RimeClient {
    pub fn new(settings: &Settings, credential: Credential) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            // Non-2xx responses carry the provider's explanation in the body.
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            endpoint: settings.endpoint.clone(),
            sample_rate: settings.sample_rate,
            credential,
        }
    }

    pub fn format(&self) -> SampleFormat {
        SampleFormat::mono(self.sample_rate)
    }

    fn body<'a>(&self, request: &SynthesisRequest<'a>) -> RimeRequest<'a> {
        RimeRequest {
            text: request.text,
            speaker: request.voice,
            model_id: request.model,
            sampling_rate: self.sample_rate,
            speed_alpha: request.speed,
            lang: request.language,
        }
    }
}

impl SpeechProvider for RimeClient {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<AudioBuffer, ProviderError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            index = request.index,
            voice = request.voice,
            model = request.model,
            "POST rime-tts"
        );
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", &format!("Bearer {}", self.credential.expose()))
            .header("Accept", "audio/pcm")
            .send_json(&self.body(request))
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let mut body = response.into_body();
        if !status.is_success() {
            let text = body
                .read_to_string()
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(ProviderError::Status { code: status.as_u16(), body: text.trim().to_string() });
        }

        let bytes = body
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_vec()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        decode_pcm(request.index, self.format(), &bytes)
    }
}

fn decode_pcm(index: usize, format: SampleFormat, bytes: &[u8]) -> Result<AudioBuffer, ProviderError> {
    AudioBuffer::from_pcm_le(index, format, bytes).ok_or_else(|| {
        ProviderError::Payload(format!("odd PCM length {} for 16-bit samples", bytes.len()))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
