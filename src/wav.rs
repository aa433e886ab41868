//! In-process WAV operations on top of `hound`: level normalisation, fades,
//! silence removal and concatenation.
//!
//! Samples are held as interleaved `f32` in `[-1.0, 1.0]`.  Integer PCM is
//! scaled by a power of two in both directions, so reading and re-writing a
//! 16-bit file reproduces every sample exactly.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// Canonical reference format: 16 kHz, mono, 16-bit PCM.
pub const CANONICAL_RATE: u32 = 16_000;
pub const CANONICAL_CHANNELS: u16 = 1;

/// Level reported for digital silence.
pub const SILENCE_DBFS: f32 = f32::NEG_INFINITY;

/// Decoded audio, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    fn frames_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// I/O
// ─────────────────────────────────────────────────────────────────────────────

pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path).map_err(|e| Error::wav(path, e))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::wav(path, e))?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::wav(path, e))?
        }
    };
    Ok(AudioBuffer { samples, channels: spec.channels, sample_rate: spec.sample_rate })
}

/// Write `audio` as 16-bit PCM, creating parent directories.
pub fn write_wav(audio: &AudioBuffer, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(output_path, spec).map_err(|e| Error::wav(output_path, e))?;
    for &s in &audio.samples {
        // f32 [-1.0, 1.0] → i16 [-32768, 32767].
        let s16 = (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16).map_err(|e| Error::wav(output_path, e))?;
    }
    writer.finalize().map_err(|e| Error::wav(output_path, e))?;
    debug!(
        "Saved {} frames ({:.2} s) to {}",
        audio.frames(),
        audio.duration_secs(),
        output_path.display()
    );
    Ok(())
}

/// Whether `path` is already a 16 kHz mono 16-bit PCM WAV.
pub fn is_canonical(path: &Path) -> Result<bool> {
    let reader = hound::WavReader::open(path).map_err(|e| Error::wav(path, e))?;
    let spec = reader.spec();
    Ok(spec.sample_rate == CANONICAL_RATE
        && spec.channels == CANONICAL_CHANNELS
        && spec.bits_per_sample == 16
        && spec.sample_format == hound::SampleFormat::Int)
}

// ─────────────────────────────────────────────────────────────────────────────
// Level
// ─────────────────────────────────────────────────────────────────────────────

fn rms_dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DBFS;
    }
    let mean_sq = samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
        / samples.len() as f64;
    if mean_sq == 0.0 {
        SILENCE_DBFS
    } else {
        (10.0 * mean_sq.log10()) as f32
    }
}

/// RMS loudness relative to full scale.
pub fn dbfs(audio: &AudioBuffer) -> f32 {
    rms_dbfs(&audio.samples)
}

pub fn apply_gain(audio: &mut AudioBuffer, gain_db: f32) {
    let factor = 10f32.powf(gain_db / 20.0);
    for s in &mut audio.samples {
        *s = (*s * factor).clamp(-1.0, 1.0);
    }
}

/// Shift the RMS level to `target_dbfs`.  Silence is left untouched.
pub fn normalize_level(audio: &mut AudioBuffer, target_dbfs: f32) {
    let current = dbfs(audio);
    if current.is_finite() {
        apply_gain(audio, target_dbfs - current);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fades
// ─────────────────────────────────────────────────────────────────────────────

/// Linear fade-in and fade-out of `duration_ms` each, clamped to half the clip.
pub fn fade_in_out(audio: &mut AudioBuffer, duration_ms: u32) {
    let frames = audio.frames();
    let fade = audio.frames_for_ms(duration_ms).min(frames / 2);
    if fade == 0 {
        return;
    }
    let ch = audio.channels.max(1) as usize;
    for i in 0..fade {
        let gain = i as f32 / fade as f32;
        for c in 0..ch {
            audio.samples[i * ch + c] *= gain;
            audio.samples[(frames - 1 - i) * ch + c] *= gain;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Silence removal
// ─────────────────────────────────────────────────────────────────────────────

/// Drop every silent stretch of at least `min_silence_ms`, where a 1 ms
/// window is silent when its RMS is below `threshold_db`.
///
/// Returns `false` (buffer untouched) when the whole clip is silent.
pub fn remove_silence(audio: &mut AudioBuffer, threshold_db: f32, min_silence_ms: u32) -> bool {
    let ch = audio.channels.max(1) as usize;
    let window = audio.frames_for_ms(1).max(1) * ch;
    let silent: Vec<bool> = audio
        .samples
        .chunks(window)
        .map(|w| rms_dbfs(w) < threshold_db)
        .collect();
    if silent.iter().all(|&s| s) {
        return false;
    }

    let min_windows = min_silence_ms.max(1) as usize;
    let mut keep = vec![true; silent.len()];
    let mut i = 0;
    while i < silent.len() {
        if !silent[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < silent.len() && silent[i] {
            i += 1;
        }
        if i - start >= min_windows {
            keep[start..i].iter_mut().for_each(|k| *k = false);
        }
    }

    let samples = audio
        .samples
        .chunks(window)
        .zip(keep)
        .filter(|(_, k)| *k)
        .flat_map(|(w, _)| w.iter().copied())
        .collect();
    audio.samples = samples;
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Concatenation
// ─────────────────────────────────────────────────────────────────────────────

/// Concatenate WAV files sharing one sample rate and channel count.
pub fn concat_wav(inputs: &[&Path], output: &Path) -> Result<()> {
    let mut merged: Option<AudioBuffer> = None;
    for &path in inputs {
        let part = read_wav(path)?;
        match merged.as_mut() {
            None => merged = Some(part),
            Some(acc) => {
                if acc.sample_rate != part.sample_rate || acc.channels != part.channels {
                    return Err(Error::wav(
                        path,
                        hound::Error::FormatError("sample rate or channel count differs between parts"),
                    ));
                }
                acc.samples.extend(part.samples);
            }
        }
    }
    let merged = merged.ok_or_else(|| {
        Error::wav(output, hound::Error::FormatError("nothing to concatenate"))
    })?;
    write_wav(&merged, output)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
