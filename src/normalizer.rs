//! Audio Normalizer — reference audio to 16 kHz mono 16-bit PCM WAV.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::batch::{collect_files, run_batch, BatchReport, Done, FileItem, RunMode};
use crate::engine::AudioTools;
use crate::error::{require_exists, Result};
use crate::wav::{self, CANONICAL_CHANNELS, CANONICAL_RATE};

/// Extensions picked up by batch mode.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "m4a", "aac", "ogg"];

/// Recommended reference length in seconds.
pub const RECOMMENDED_SECS: std::ops::RangeInclusive<f32> = 30.0..=90.0;

/// Convert one file.
pub fn normalize_file(
    tools: &dyn AudioTools,
    input: &Path,
    output: &Path,
    mode: RunMode,
) -> Result<Done> {
    require_exists(input)?;
    if mode.is_dry_run() {
        return Ok(Done::Planned(format!(
            "convert {} to {} Hz mono at {}",
            input.display(),
            CANONICAL_RATE,
            output.display()
        )));
    }
    tools.resample(input, output, CANONICAL_RATE, CANONICAL_CHANNELS)?;
    warn_on_duration(output);
    Ok(Done::Written(output.to_path_buf()))
}

/// `{output_dir}/{stem}_16k_mono.wav`
pub fn batch_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    output_dir.join(format!("{}_16k_mono.wav", stem))
}

/// Convert every audio file under `input_dir` (recursively).
pub fn normalize_dir(
    tools: &dyn AudioTools,
    input_dir: &Path,
    output_dir: &Path,
    mode: RunMode,
) -> Result<BatchReport> {
    let files = collect_files(input_dir, AUDIO_EXTENSIONS, true)?;
    if files.is_empty() {
        warn!("No audio files found in {}", input_dir.display());
    } else {
        info!("Found {} audio files to convert", files.len());
    }
    Ok(run_batch(files.into_iter().map(FileItem), |item: &FileItem| {
        normalize_file(tools, &item.0, &batch_output_path(&item.0, output_dir), mode)
    }))
}

/// Log a warning when a canonical reference falls outside [`RECOMMENDED_SECS`].
pub fn warn_on_duration(path: &Path) {
    if let Ok(audio) = wav::read_wav(path) {
        let secs = audio.duration_secs();
        if !RECOMMENDED_SECS.contains(&secs) {
            warn!(
                "Reference {} is {:.1} s long; {}–{} s gives the best voice match",
                path.display(),
                secs,
                RECOMMENDED_SECS.start(),
                RECOMMENDED_SECS.end()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Status;
    use crate::engine::StandardAudio;
    use crate::error::{Error, ErrorKind};
    use crate::ffmpeg::Ffmpeg;
    use crate::wav::tests::tone;

    fn offline_tools() -> StandardAudio {
        StandardAudio::new(Ffmpeg::new("/nonexistent/ffmpeg"))
    }

    #[test]
    fn missing_input_is_input_not_found() {
        let err = normalize_file(&offline_tools(), Path::new("/no/ref.wav"), Path::new("/tmp/o.wav"), RunMode::Execute)
            .unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.wav");
        let once = dir.path().join("once.wav");
        let twice = dir.path().join("twice.wav");
        wav::write_wav(&tone(16_000, 200, 0.3), &raw).unwrap();

        normalize_file(&offline_tools(), &raw, &once, RunMode::Execute).unwrap();
        normalize_file(&offline_tools(), &once, &twice, RunMode::Execute).unwrap();
        assert_eq!(std::fs::read(&once).unwrap(), std::fs::read(&twice).unwrap());
        assert!(wav::is_canonical(&twice).unwrap());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.wav");
        wav::write_wav(&tone(16_000, 20, 0.3), &raw).unwrap();
        let out = dir.path().join("out.wav");
        let done = normalize_file(&offline_tools(), &raw, &out, RunMode::DryRun).unwrap();
        assert!(matches!(done, Done::Planned(_)));
        assert!(!out.exists());
    }

    #[test]
    fn batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(input.join("deeper")).unwrap();
        wav::write_wav(&tone(16_000, 20, 0.3), &input.join("good.wav")).unwrap();
        wav::write_wav(&tone(16_000, 20, 0.3), &input.join("deeper").join("also.wav")).unwrap();
        // Not canonical and ffmpeg is unavailable → this one fails.
        wav::write_wav(&tone(44_100, 20, 0.3), &input.join("hifi.wav")).unwrap();

        let output = dir.path().join("out");
        let report = normalize_dir(&offline_tools(), &input, &output, RunMode::Execute).unwrap();
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(output.join("good_16k_mono.wav").exists());
        assert!(output.join("also_16k_mono.wav").exists());
        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].item.ends_with("hifi.wav"));
        assert!(matches!(failed[0].status, Status::Failed { kind: ErrorKind::ModelError, .. }));
    }
}
