//! Encoders that turn a [`StitchedTrack`] into a file.
//!
//! The pipeline calls [`AudioEncoder::encode`] exactly once per run, on a
//! staging path next to the final destination.

use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

use crate::audio::StitchedTrack;
use crate::config::{OutputFormat, Settings};
use crate::error::{Result, TtsError};

pub trait AudioEncoder {
    /// File extension of the produced container, without the dot.
    fn extension(&self) -> &'static str;

    /// Write `track` to `output`, replacing whatever is there.
    fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()>;
}

impl<E: AudioEncoder + ?Sized> AudioEncoder for &E {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
        (**self).encode(track, output)
    }
}

impl<E: AudioEncoder + ?Sized> AudioEncoder for Box<E> {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
        (**self).encode(track, output)
    }
}

/// Pick the encoder for `settings.format`.
pub fn for_settings(settings: &Settings) -> Box<dyn AudioEncoder> {
    match settings.format {
        OutputFormat::Ogg => Box::new(FfmpegEncoder::new(&settings.ffmpeg, &settings.bitrate)),
        OutputFormat::Wav => Box::new(WavEncoder),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ffmpeg → OGG/Opus
// ─────────────────────────────────────────────────────────────────────────────

/// Runs an external `ffmpeg` to produce OGG/Opus tuned for voice notes.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    bitrate: String,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>, bitrate: impl Into<String>) -> Self {
        Self { program: program.into(), bitrate: bitrate.into() }
    }

    fn args(&self, sample_rate: u32, channels: u16, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-f", "s16le"]
            .iter()
            .map(OsString::from)
            .collect();
        args.extend([
            "-ar".into(),
            sample_rate.to_string().into(),
            "-ac".into(),
            channels.to_string().into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-c:a".into(),
            "libopus".into(),
            "-b:a".into(),
            OsString::from(&self.bitrate),
            "-vbr".into(),
            "on".into(),
            "-application".into(),
            "voip".into(),
            output.as_os_str().to_owned(),
        ]);
        args
    }
}

impl AudioEncoder for FfmpegEncoder {
    fn extension(&self) -> &'static str {
        "ogg"
    }

    fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
        let format = track
            .format()
            .ok_or_else(|| TtsError::encoding("nothing to encode: track is empty"))?;

        // Raw PCM input; removed when `pcm` drops, whatever happens below.
        let mut pcm = tempfile::Builder::new()
            .prefix("rime-pcm-")
            .suffix(".raw")
            .tempfile()
            .map_err(|e| TtsError::encoding(format!("cannot create PCM temp file: {e}")))?;
        pcm.write_all(&track.to_le_bytes())
            .and_then(|_| pcm.flush())
            .map_err(|e| TtsError::encoding(format!("cannot write PCM temp file: {e}")))?;

        let args = self.args(format.sample_rate, format.channels, pcm.path(), output);
        tracing::debug!(program = %self.program.display(), ?args, "running encoder");

        let out = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                TtsError::encoding(format!("cannot run {}: {e}", self.program.display()))
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(TtsError::encoding(format!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV
// ─────────────────────────────────────────────────────────────────────────────

/// 16-bit PCM WAV writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
        let format = track
            .format()
            .ok_or_else(|| TtsError::encoding("nothing to encode: track is empty"))?;
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| TtsError::encoding(format!("WAV {}: {e}", output.display()));

        let mut writer = hound::WavWriter::create(output, spec).map_err(wav_err)?;
        for &s in track.samples() {
            writer.write_sample(s).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
