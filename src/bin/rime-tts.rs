//! `rime-tts`: synthesise text into a single OGG/Opus voice note.
//!
//! Usage:
//!   rime-tts notes.txt [--voice V] [--pause P]          # document mode
//!   cat notes.txt | rime-tts -                          # document from stdin
//!   rime-tts --text "Hello there." [--voice V]          # inline text
//!   rime-tts --segments '[{"voice":"atrium","text":"Hi"},{"voice":"luna","text":"Hey"}]'
//!
//! Prints the artifact path on stdout.  Logs go to stderr (`RUST_LOG=info`
//! for per-chunk progress).

use std::{
    io::Read,
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use rime_tts::{
    encode, parse_segments, Credential, OutputFormat, RimeClient, Segmenter, Settings,
    Synthesizer, TextChunk,
};

#[derive(Debug, Parser)]
#[command(name = "rime-tts", version)]
#[command(about = "Rime text-to-speech: long documents and multi-voice segments to one voice note")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "text", "segments"])))]
struct Cli {
    /// Text file to read aloud, or `-` for stdin.
    input: Option<PathBuf>,

    /// Inline text to speak.
    #[arg(long)]
    text: Option<String>,

    /// Multi-voice JSON: [{"voice":"atrium","text":"..."},...]
    /// Each segment may also set `model`, `lang` and `speed`.
    #[arg(long)]
    segments: Option<String>,

    /// Default voice [default: atrium].
    #[arg(long)]
    voice: Option<String>,

    /// Speed multiplier [default: 1.0].
    #[arg(long)]
    speed: Option<f32>,

    /// Language code, e.g. eng, fra, spa.
    #[arg(long)]
    lang: Option<String>,

    /// Silence between chunks/segments in seconds [default: 0.3].
    #[arg(long)]
    pause: Option<f64>,

    /// Rime model [default: arcana].
    #[arg(long)]
    model: Option<String>,

    /// Maximum characters per request in document mode [default: 400].
    #[arg(long)]
    max_chars: Option<usize>,

    /// Output container [default: ogg].
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Where to write the artifact.  Defaults to a fresh temp directory.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// JSON settings file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut s = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(v) = &self.voice {
            s.voice = v.clone();
        }
        if let Some(v) = self.speed {
            s.speed = v;
        }
        if let Some(v) = &self.lang {
            s.language = Some(v.clone());
        }
        if let Some(v) = self.pause {
            s.pause_secs = v;
        }
        if let Some(v) = &self.model {
            s.model = v.clone();
        }
        if let Some(v) = self.max_chars {
            s.max_chunk_chars = v;
        }
        if let Some(v) = self.format {
            s.format = v;
        }
        s.validate()?;
        Ok(s)
    }

    fn chunks(&self, settings: &Settings) -> Result<Vec<TextChunk>> {
        let segmenter = Segmenter::new(settings.max_chunk_chars)?;

        if let Some(json) = &self.segments {
            return Ok(segmenter.from_segments(parse_segments(json)?)?);
        }
        if let Some(text) = &self.text {
            return Ok(segmenter.chunk_text(text)?);
        }

        let text = match self.input.as_deref() {
            Some(p) if p.as_os_str() == "-" => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("cannot read stdin")?;
                buf
            }
            Some(p) => std::fs::read_to_string(p)
                .with_context(|| format!("cannot read {}", p.display()))?,
            None => anyhow::bail!("provide a text file, --text, or --segments"),
        };
        Ok(segmenter.chunk_text(&text)?)
    }
}

fn run(cli: &Cli) -> Result<PathBuf> {
    let settings = cli.settings()?;
    let credential = Credential::from_env()?;

    let chunks = cli.chunks(&settings)?;
    tracing::info!(chunks = chunks.len(), voice = %settings.voice, "starting synthesis");

    let provider = RimeClient::new(&settings, credential);
    let encoder = encode::for_settings(&settings);
    let synth = Synthesizer::new(provider, encoder, settings);

    let artifact = match &cli.output {
        Some(path) => synth.synthesize_to_file(&chunks, path)?,
        None => synth.synthesize_to_temp(&chunks)?,
    };
    tracing::info!(
        chunks = artifact.chunk_count,
        secs = artifact.duration_secs,
        "done"
    );
    Ok(artifact.path)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
