//! Sequential synthesis, stitching and single-shot encoding.
//!
//! Chunk N is requested only after chunk N-1's audio has arrived.  Nothing is
//! written to disk until every chunk has been synthesised and stitched, and
//! the encoder output is staged beside the destination and renamed into place
//! only on success, so a failed run never leaves a truncated artifact behind.

use std::path::{Path, PathBuf};

use crate::audio::StitchedTrack;
use crate::config::Settings;
use crate::encode::AudioEncoder;
use crate::error::{Result, TtsError};
use crate::provider::{SpeechProvider, SynthesisRequest};
use crate::segment::TextChunk;

/// Name of the encoded file inside a temporary output directory.
const TEMP_OUTPUT_STEM: &str = "output";

/// The encoded file produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub chunk_count: usize,
    pub duration_secs: f64,
}

pub struct Synthesizer<P, E> {
    provider: P,
    encoder: E,
    settings: Settings,
}

impl<P: SpeechProvider, E: AudioEncoder> Synthesizer<P, E> {
    pub fn new(provider: P, encoder: E, settings: Settings) -> Self {
        Self { provider, encoder, settings }
    }

    /// Synthesise every chunk in order and stitch the results.
    pub fn render(&self, chunks: &[TextChunk]) -> Result<StitchedTrack> {
        if chunks.is_empty() {
            return Err(TtsError::EmptyInput("no chunks to synthesise".into()));
        }
        self.settings.validate()?;

        let mut track = StitchedTrack::new(self.settings.pause_secs);
        for chunk in chunks {
            let request = SynthesisRequest {
                index: chunk.index,
                text: &chunk.text,
                voice: chunk.voice.as_deref().unwrap_or(&self.settings.voice),
                model: chunk.model.as_deref().unwrap_or(&self.settings.model),
                language: chunk.language.as_deref().or(self.settings.language.as_deref()),
                speed: chunk.speed.unwrap_or(self.settings.speed),
            };
            tracing::info!(
                index = chunk.index,
                of = chunks.len(),
                voice = request.voice,
                chars = chunk.char_len(),
                "synthesising chunk"
            );

            let buffer = self.provider.synthesize(&request).map_err(|e| {
                tracing::error!(index = chunk.index, error = %e, "synthesis failed");
                TtsError::Synthesis { index: chunk.index, detail: e.to_string() }
            })?;
            if buffer.samples.is_empty() {
                tracing::warn!(index = chunk.index, "provider returned no audio");
            } else {
                tracing::debug!(index = chunk.index, secs = buffer.duration_secs(), "chunk audio");
            }
            track.append(buffer)?;
        }

        tracing::debug!(
            samples = track.samples().len(),
            gaps = track.gap_count(),
            secs = track.duration_secs(),
            "stitched track"
        );
        Ok(track)
    }

    /// Render `chunks` and encode them to `output`.
    pub fn synthesize_to_file(&self, chunks: &[TextChunk], output: &Path) -> Result<OutputArtifact> {
        let track = self.render(chunks)?;
        self.encode_to(&track, output)?;
        Ok(OutputArtifact {
            path: output.to_path_buf(),
            chunk_count: chunks.len(),
            duration_secs: track.duration_secs(),
        })
    }

    /// Render `chunks` and encode them into a fresh `rime_*` temp directory.
    ///
    /// The directory is kept only when encoding succeeds; the caller owns the
    /// artifact afterwards.
    pub fn synthesize_to_temp(&self, chunks: &[TextChunk]) -> Result<OutputArtifact> {
        let track = self.render(chunks)?;

        let dir = tempfile::Builder::new()
            .prefix("rime_")
            .tempdir()
            .map_err(|e| TtsError::encoding(format!("cannot create output directory: {e}")))?;
        let file_name = Path::new(TEMP_OUTPUT_STEM).with_extension(self.encoder.extension());
        self.encode_to(&track, &dir.path().join(&file_name))?;
        let path = dir.keep().join(file_name);

        Ok(OutputArtifact {
            path,
            chunk_count: chunks.len(),
            duration_secs: track.duration_secs(),
        })
    }

    /// Encode once into a staging file next to `output`, then rename it over.
    fn encode_to(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".rime-")
            .suffix(&format!(".{}", self.encoder.extension()))
            .tempfile_in(parent)
            .map_err(|e| {
                TtsError::encoding(format!("cannot stage output in {}: {e}", parent.display()))
            })?;

        self.encoder.encode(track, staged.path())?;

        staged.persist(output).map_err(|e| {
            TtsError::encoding(format!("cannot move output to {}: {}", output.display(), e.error))
        })?;
        tracing::info!(path = %output.display(), "wrote artifact");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::audio::{AudioBuffer, Piece, SampleFormat};
    use crate::encode::WavEncoder;
    use crate::provider::ProviderError;
    use crate::segment::{parse_segments, Segmenter};

    const RATE: u32 = 1_000;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        index: usize,
        text: String,
        voice: String,
        model: String,
        language: Option<String>,
        speed: f32,
    }

    /// Deterministic provider: audio is derived from the text and voice, so
    /// each chunk is recognisable inside the stitched stream.
    #[derive(Default)]
    struct StubProvider {
        calls: RefCell<Vec<Call>>,
        fail_on: Option<usize>,
        rate_for: Option<(usize, u32)>,
    }

    impl StubProvider {
        fn audio_for(text: &str, voice: &str) -> Vec<i16> {
            text.bytes()
                .chain(voice.bytes())
                .map(|b| b as i16 + 1)
                .collect()
        }
    }

    impl SpeechProvider for StubProvider {
        fn synthesize(&self, r: &SynthesisRequest<'_>) -> Result<AudioBuffer, ProviderError> {
            self.calls.borrow_mut().push(Call {
                index: r.index,
                text: r.text.to_string(),
                voice: r.voice.to_string(),
                model: r.model.to_string(),
                language: r.language.map(str::to_string),
                speed: r.speed,
            });
            if self.fail_on == Some(r.index) {
                return Err(ProviderError::Status { code: 503, body: "overloaded".into() });
            }
            let rate = match self.rate_for {
                Some((i, rate)) if i == r.index => rate,
                _ => RATE,
            };
            Ok(AudioBuffer::new(r.index, SampleFormat::mono(rate), Self::audio_for(r.text, r.voice)))
        }
    }

    /// Records the tracks it is asked to encode and writes them as WAV.
    #[derive(Default)]
    struct RecordingEncoder {
        calls: Cell<usize>,
        last: RefCell<Option<Vec<i16>>>,
        fail: bool,
    }

    impl AudioEncoder for RecordingEncoder {
        fn extension(&self) -> &'static str {
            "wav"
        }

        fn encode(&self, track: &StitchedTrack, output: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            *self.last.borrow_mut() = Some(track.samples().to_vec());
            if self.fail {
                std::fs::write(output, b"partial").unwrap();
                return Err(TtsError::encoding("encoder exited with 1"));
            }
            WavEncoder.encode(track, output)
        }
    }

    fn settings(pause_secs: f64) -> Settings {
        Settings { pause_secs, ..Settings::default() }
    }

    fn chunks(n: usize) -> Vec<TextChunk> {
        let text: Vec<String> = (0..n).map(|i| format!("Sentence number {i}.")).collect();
        Segmenter::new(10).unwrap().chunk_text(&text.join(" ")).unwrap()
    }

    #[test]
    fn test_podcast_layout() {
        let segs = parse_segments(r#"[{"voice":"a","text":"Hi"},{"voice":"b","text":"Hey"}]"#).unwrap();
        let chunks = Segmenter::default().from_segments(segs).unwrap();
        let provider = StubProvider::default();
        let synth = Synthesizer::new(&provider, RecordingEncoder::default(), settings(0.4));

        let track = synth.render(&chunks).unwrap();

        let mut expected = StubProvider::audio_for("Hi", "a");
        expected.extend(vec![0i16; 400]);
        expected.extend(StubProvider::audio_for("Hey", "b"));
        assert_eq!(track.samples(), expected.as_slice());

        let pieces: Vec<Piece> = track.spans().iter().map(|s| s.piece).collect();
        assert_eq!(
            pieces,
            vec![
                Piece::Speech { chunk_index: 0 },
                Piece::Silence,
                Piece::Speech { chunk_index: 1 },
            ]
        );
        let calls = provider.calls.borrow();
        assert_eq!(calls[0].voice, "a");
        assert_eq!(calls[1].voice, "b");
    }

    #[test]
    fn test_defaults_fill_missing_chunk_settings() {
        let segs = parse_segments(
            r#"[{"text":"One"},{"voice":"b","text":"Two","lang":"fra","speed":1.25,"model":"mist"}]"#,
        )
        .unwrap();
        let chunks = Segmenter::default().from_segments(segs).unwrap();
        let provider = StubProvider::default();
        let s = Settings { voice: "luna".into(), language: Some("eng".into()), speed: 0.9, ..settings(0.1) };
        Synthesizer::new(&provider, RecordingEncoder::default(), s).render(&chunks).unwrap();

        let calls = provider.calls.borrow();
        assert_eq!(
            calls[0],
            Call {
                index: 0,
                text: "One".into(),
                voice: "luna".into(),
                model: "arcana".into(),
                language: Some("eng".into()),
                speed: 0.9,
            }
        );
        assert_eq!(
            calls[1],
            Call {
                index: 1,
                text: "Two".into(),
                voice: "b".into(),
                model: "mist".into(),
                language: Some("fra".into()),
                speed: 1.25,
            }
        );
    }

    #[test]
    fn test_n_chunks_have_n_minus_one_gaps() {
        let chunks = chunks(6);
        assert_eq!(chunks.len(), 6);
        let provider = StubProvider::default();
        let track = Synthesizer::new(&provider, RecordingEncoder::default(), settings(0.25))
            .render(&chunks)
            .unwrap();

        assert_eq!(track.gap_count(), 5);
        assert_eq!(track.chunk_order(), vec![0, 1, 2, 3, 4, 5]);
        for s in track.spans().iter().filter(|s| s.piece == Piece::Silence) {
            assert_eq!(s.len, 250);
        }
        assert_ne!(track.spans()[0].piece, Piece::Silence);
        assert_ne!(track.spans().last().unwrap().piece, Piece::Silence);

        let order: Vec<usize> = provider.calls.borrow().iter().map(|c| c.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_render_is_idempotent() {
        let chunks = chunks(4);
        let synth = Synthesizer::new(StubProvider::default(), RecordingEncoder::default(), settings(0.3));
        let first = synth.render(&chunks).unwrap().to_le_bytes();
        let second = synth.render(&chunks).unwrap().to_le_bytes();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failure_on_chunk_two_of_five_writes_nothing() {
        let chunks = chunks(5);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("voice.wav");
        let provider = StubProvider { fail_on: Some(2), ..Default::default() };
        let encoder = RecordingEncoder::default();
        let synth = Synthesizer::new(&provider, &encoder, settings(0.3));

        let err = synth.synthesize_to_file(&chunks, &output).unwrap_err();
        match err {
            TtsError::Synthesis { index, detail } => {
                assert_eq!(index, 2);
                assert!(detail.contains("503"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
        assert_eq!(encoder.calls.get(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        // Chunks after the failure are never requested.
        assert_eq!(provider.calls.borrow().len(), 3);
    }

    #[test]
    fn test_sample_rate_mismatch_aborts() {
        let chunks = chunks(3);
        let provider = StubProvider { rate_for: Some((1, 2_000)), ..Default::default() };
        let err = Synthesizer::new(&provider, RecordingEncoder::default(), settings(0.1))
            .render(&chunks)
            .unwrap_err();
        assert!(matches!(err, TtsError::SampleFormatMismatch { index: 1, .. }), "{err:?}");
    }

    #[test]
    fn test_out_of_range_pause_is_rejected_before_synthesis() {
        let provider = StubProvider::default();
        let encoder = RecordingEncoder::default();
        let err = Synthesizer::new(&provider, &encoder, settings(1e15))
            .synthesize_to_temp(&chunks(2))
            .unwrap_err();
        assert!(matches!(err, TtsError::InvalidConfiguration(_)), "{err:?}");
        assert!(provider.calls.borrow().is_empty());
        assert_eq!(encoder.calls.get(), 0);
    }

    #[test]
    fn test_empty_chunk_list() {
        let synth = Synthesizer::new(StubProvider::default(), RecordingEncoder::default(), settings(0.1));
        assert!(matches!(synth.render(&[]), Err(TtsError::EmptyInput(_))));
    }

    #[test]
    fn test_encodes_once_to_file() {
        let chunks = chunks(3);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("voice.wav");
        let encoder = RecordingEncoder::default();
        let synth = Synthesizer::new(StubProvider::default(), &encoder, settings(0.2));

        let artifact = synth.synthesize_to_file(&chunks, &output).unwrap();
        assert_eq!(artifact.path, output);
        assert_eq!(artifact.chunk_count, 3);
        assert_eq!(encoder.calls.get(), 1);

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, RATE);
        assert_eq!(reader.len() as usize, encoder.last.borrow().as_ref().unwrap().len());
        // Only the artifact remains; the staging file was renamed over it.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_encoder_failure_leaves_no_artifact() {
        let chunks = chunks(2);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("voice.wav");
        let encoder = RecordingEncoder { fail: true, ..Default::default() };
        let synth = Synthesizer::new(StubProvider::default(), &encoder, settings(0.2));

        let err = synth.synthesize_to_file(&chunks, &output).unwrap_err();
        assert!(matches!(err, TtsError::Encoding(_)));
        assert_eq!(encoder.calls.get(), 1);
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_temp_output_is_kept_on_success() {
        let chunks = chunks(2);
        let synth = Synthesizer::new(StubProvider::default(), RecordingEncoder::default(), settings(0.2));
        let artifact = synth.synthesize_to_temp(&chunks).unwrap();

        assert!(artifact.path.exists());
        assert_eq!(artifact.path.file_name().unwrap(), "output.wav");
        let dir = artifact.path.parent().unwrap().to_path_buf();
        assert!(dir.file_name().unwrap().to_string_lossy().starts_with("rime_"));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
