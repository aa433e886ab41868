//! Post-Processor — level normalization, fades, silence removal and format
//! conversion over synthesized audio.
//!
//! Operations run in a fixed order: normalize → fade → remove silence →
//! convert.  With nothing enabled the input is copied unchanged.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::batch::{collect_files, run_batch, BatchReport, Done, FileItem, RunMode};
use crate::config::ProcessingOptions;
use crate::engine::AudioTools;
use crate::error::{require_exists, Error, Result};
use crate::wav;

/// Files picked up by batch mode.
pub const POST_EXTENSIONS: &[&str] = &["wav", "mp3"];

#[derive(Debug, Clone, PartialEq)]
pub struct SilenceOptions {
    pub threshold_db: f32,
    pub min_silence_ms: u32,
}

impl Default for SilenceOptions {
    fn default() -> Self {
        Self { threshold_db: -40.0, min_silence_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub format: String,
    pub bitrate: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { format: "mp3".into(), bitrate: "192k".into() }
    }
}

/// Each operation is enabled by being `Some`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostOptions {
    pub normalize: Option<f32>,
    pub fade_ms: Option<u32>,
    pub silence: Option<SilenceOptions>,
    pub convert: Option<ConvertOptions>,
}

impl PostOptions {
    pub fn is_noop(&self) -> bool {
        self.normalize.is_none() && self.fade_ms.is_none() && self.silence.is_none() && self.convert.is_none()
    }

    fn edits_samples(&self) -> bool {
        self.normalize.is_some() || self.fade_ms.is_some() || self.silence.is_some()
    }

    /// Human-readable list of the enabled operations.
    pub fn describe(&self) -> String {
        let mut ops = Vec::new();
        if let Some(target) = self.normalize {
            ops.push(format!("normalize to {} dBFS", target));
        }
        if let Some(ms) = self.fade_ms {
            ops.push(format!("fade {} ms", ms));
        }
        if let Some(s) = &self.silence {
            ops.push(format!("remove silence below {} dB longer than {} ms", s.threshold_db, s.min_silence_ms));
        }
        if let Some(c) = &self.convert {
            ops.push(format!("convert to {} at {}", c.format, c.bitrate));
        }
        if ops.is_empty() {
            "copy".to_string()
        } else {
            ops.join(", ")
        }
    }

    /// Where the result of processing into `output` actually lands.
    pub fn final_path(&self, output: &Path) -> PathBuf {
        match &self.convert {
            Some(c) => output.with_extension(&c.format),
            None if self.edits_samples() => output.with_extension("wav"),
            None => output.to_path_buf(),
        }
    }
}

impl From<&ProcessingOptions> for PostOptions {
    fn from(p: &ProcessingOptions) -> Self {
        Self {
            normalize: p.normalize.then_some(p.target_dbfs),
            fade_ms: p.fade.then_some(p.fade_duration_ms),
            ..Self::default()
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

/// Sibling scratch file, so `input == output` is safe.
fn scratch_path(output: &Path, tag: &str) -> PathBuf {
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    output.with_file_name(format!(".{}.{}.wav", stem, tag))
}

fn is_wav(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("wav")).unwrap_or(false)
}

/// Process one file.
pub fn process_file(
    tools: &dyn AudioTools,
    input: &Path,
    output: &Path,
    opts: &PostOptions,
    mode: RunMode,
) -> Result<Done> {
    require_exists(input)?;
    let target = opts.final_path(output);
    if mode.is_dry_run() {
        return Ok(Done::Planned(format!("{} {} -> {}", opts.describe(), input.display(), target.display())));
    }
    ensure_parent(&target)?;

    if opts.is_noop() {
        if input != target {
            std::fs::copy(input, &target).map_err(|e| Error::io(&target, e))?;
        }
        return Ok(Done::Written(target));
    }

    let decoded = scratch_path(output, "decoded");
    let edited = scratch_path(output, "edited");
    let result = render(tools, input, &decoded, &edited, &target, opts);
    for scratch in [&decoded, &edited] {
        if scratch.exists() {
            if let Err(e) = std::fs::remove_file(scratch) {
                warn!("Cannot remove {}: {}", scratch.display(), e);
            }
        }
    }
    result?;
    info!("Post-processed {} -> {} ({})", input.display(), target.display(), opts.describe());
    Ok(Done::Written(target))
}

fn render(
    tools: &dyn AudioTools,
    input: &Path,
    decoded: &Path,
    edited: &Path,
    target: &Path,
    opts: &PostOptions,
) -> Result<()> {
    let source = if is_wav(input) {
        input.to_path_buf()
    } else {
        tools.decode_to_wav(input, decoded)?;
        decoded.to_path_buf()
    };

    let wav_out = if opts.edits_samples() {
        let mut audio = wav::read_wav(&source)?;
        if let Some(target_dbfs) = opts.normalize {
            tools.normalize_level(&mut audio, target_dbfs);
        }
        if let Some(ms) = opts.fade_ms {
            tools.apply_fade(&mut audio, ms);
        }
        if let Some(s) = &opts.silence {
            if !wav::remove_silence(&mut audio, s.threshold_db, s.min_silence_ms) {
                warn!("{} is entirely below {} dB; kept as is", input.display(), s.threshold_db);
            }
        }
        wav::write_wav(&audio, edited)?;
        edited.to_path_buf()
    } else {
        source
    };

    match &opts.convert {
        Some(c) => tools.convert_format(&wav_out, target, &c.format, &c.bitrate),
        None => std::fs::rename(&wav_out, target).map_err(|e| Error::io(target, e)),
    }
}

/// Process every `*.wav` / `*.mp3` directly inside `input_dir`; outputs keep
/// their file names.
pub fn process_dir(
    tools: &dyn AudioTools,
    input_dir: &Path,
    output_dir: &Path,
    opts: &PostOptions,
    mode: RunMode,
) -> Result<BatchReport> {
    let files = collect_files(input_dir, POST_EXTENSIONS, false)?;
    if files.is_empty() {
        warn!("No audio files found in {}", input_dir.display());
    }
    Ok(run_batch(files.into_iter().map(FileItem), |item: &FileItem| {
        let name = item.0.file_name().map(PathBuf::from).unwrap_or_default();
        process_file(tools, &item.0, &output_dir.join(name), opts, mode)
    }))
}
