//! External collaborators behind narrow traits.
//!
//! The orchestration core only ever talks to a [`Synthesizer`] and an
//! [`AudioTools`]; the production implementations drive the Coqui `tts`
//! command line and ffmpeg, tests plug in fakes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::ffmpeg::Ffmpeg;
use crate::wav::{self, AudioBuffer};

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Voice-cloning text-to-speech model.
///
/// One instance is created per invocation and reused for every language, so
/// implementations that load weights in-process pay the cost once.
pub trait Synthesizer {
    fn name(&self) -> &str;

    /// Called once before the first [`synthesize`](Synthesizer::synthesize).
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Speak `text` in `language` with the voice of `reference`, writing a WAV
    /// file to `output`.
    fn synthesize(&self, text: &str, reference: &Path, language: &str, output: &Path) -> Result<()>;
}

/// Audio codec operations.
pub trait AudioTools {
    /// Decode `input` and write 16-bit PCM WAV at `rate` Hz with `channels`.
    fn resample(&self, input: &Path, output: &Path, rate: u32, channels: u16) -> Result<()>;

    /// Decode any supported container to PCM WAV without resampling.
    fn decode_to_wav(&self, input: &Path, output: &Path) -> Result<()>;

    /// Re-encode a WAV file into another container/codec.
    fn convert_format(&self, input: &Path, output: &Path, format: &str, bitrate: &str) -> Result<()>;

    fn normalize_level(&self, audio: &mut AudioBuffer, target_dbfs: f32) {
        wav::normalize_level(audio, target_dbfs)
    }

    fn apply_fade(&self, audio: &mut AudioBuffer, duration_ms: u32) {
        wav::fade_in_out(audio, duration_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coqui TTS command line
// ─────────────────────────────────────────────────────────────────────────────

/// XTTS v2 through the `tts` command of Coqui TTS.
///
/// The command line front end loads the model on every call; the first call
/// also downloads it into the Coqui cache, which can take minutes.
#[derive(Debug, Clone)]
pub struct CoquiTts {
    program: PathBuf,
    model_name: String,
}

impl CoquiTts {
    pub fn new(program: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self { program: program.into(), model_name: model_name.into() }
    }

    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(&engine.tts_command, &engine.model_name)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        // The license prompt must fail rather than block on a closed stdin.
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

impl Synthesizer for CoquiTts {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn prepare(&self) -> Result<()> {
        let output = self.command().arg("--version").output().map_err(|e| {
            Error::model(
                "tts",
                format!(
                    "cannot run {} ({}); install Coqui TTS with `pip install coqui-tts`",
                    self.program.display(),
                    e
                ),
            )
        })?;
        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            info!("Coqui TTS {} ready, model {}", version.trim(), self.model_name);
        } else {
            warn!("`{} --version` exited with {}", self.program.display(), output.status);
        }
        Ok(())
    }

    fn synthesize(&self, text: &str, reference: &Path, language: &str, output: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("--text")
            .arg(text)
            .arg("--out_path")
            .arg(output)
            .arg("--model_name")
            .arg(&self.model_name)
            .arg("--speaker_wav")
            .arg(reference)
            .arg("--language_idx")
            .arg(language);
        debug!("Running {:?}", cmd);

        let result = cmd
            .output()
            .map_err(|e| Error::model("tts", format!("cannot run {}: {}", self.program.display(), e)))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(Error::model("tts", format!("exited with {}: {}", result.status, last.trim())));
        }
        if !output.exists() {
            return Err(Error::model("tts", format!("no audio written to {}", output.display())));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ffmpeg + hound
// ─────────────────────────────────────────────────────────────────────────────

/// Production [`AudioTools`]: WAV files already in the target format are
/// rewritten in-process, everything else goes through ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct StandardAudio {
    ffmpeg: Ffmpeg,
}

impl StandardAudio {
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }

    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new(Ffmpeg::new(&engine.ffmpeg_command))
    }

    pub fn ffmpeg(&self) -> &Ffmpeg {
        &self.ffmpeg
    }
}

fn matches_target(input: &Path, rate: u32, channels: u16) -> bool {
    hound::WavReader::open(input)
        .map(|r| {
            let spec = r.spec();
            spec.sample_rate == rate
                && spec.channels == channels
                && spec.bits_per_sample == 16
                && spec.sample_format == hound::SampleFormat::Int
        })
        .unwrap_or(false)
}

impl AudioTools for StandardAudio {
    fn resample(&self, input: &Path, output: &Path, rate: u32, channels: u16) -> Result<()> {
        if matches_target(input, rate, channels) {
            debug!("{} already at {} Hz / {} ch, rewriting in-process", input.display(), rate, channels);
            let audio = wav::read_wav(input)?;
            return wav::write_wav(&audio, output);
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        self.ffmpeg.resample(input, output, rate, channels)
    }

    fn decode_to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        if hound::WavReader::open(input).is_ok() {
            let audio = wav::read_wav(input)?;
            return wav::write_wav(&audio, output);
        }
        self.ffmpeg.decode(input, output)
    }

    fn convert_format(&self, input: &Path, output: &Path, format: &str, bitrate: &str) -> Result<()> {
        self.ffmpeg.convert(input, output, format, bitrate)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
