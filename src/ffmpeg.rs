//! ffmpeg subprocess wrapper — decoding, resampling and format conversion.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::error::{Error, Result};

/// Handle on an ffmpeg executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// First line of `ffmpeg -version`, or an error when ffmpeg is unusable.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .output()
            .map_err(|e| Error::model("ffmpeg", format!("cannot run {}: {}", self.program.display(), e)))?;
        if !output.status.success() {
            return Err(Error::model("ffmpeg", format!("-version exited with {}", output.status)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or("").to_string())
    }

    pub fn is_available(&self) -> bool {
        self.version().is_ok()
    }

    /// Run ffmpeg with `args`, overwriting outputs, failing on non-zero exit.
    pub fn run<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]).args(args);
        debug!("Running {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|e| Error::model("ffmpeg", format!("cannot run {}: {}", self.program.display(), e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::model(
                "ffmpeg",
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }

    /// Decode any input and write 16-bit PCM WAV at `rate` Hz with `channels`.
    pub fn resample(&self, input: &Path, output: &Path, rate: u32, channels: u16) -> Result<()> {
        info!("Converting {} to {} Hz, {} channel(s)", input.display(), rate, channels);
        let rate = rate.to_string();
        let channels = channels.to_string();
        self.run([
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-ac"),
            OsStr::new(&channels),
            OsStr::new("-ar"),
            OsStr::new(&rate),
            OsStr::new("-c:a"),
            OsStr::new("pcm_s16le"),
            output.as_os_str(),
        ])
    }

    /// Decode any input to 16-bit PCM WAV, keeping its rate and channels.
    pub fn decode(&self, input: &Path, output: &Path) -> Result<()> {
        debug!("Decoding {} to {}", input.display(), output.display());
        self.run([
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c:a"),
            OsStr::new("pcm_s16le"),
            output.as_os_str(),
        ])
    }

    /// Re-encode `input` into `format` (e.g. `mp3`) at `bitrate` (e.g. `192k`).
    pub fn convert(&self, input: &Path, output: &Path, format: &str, bitrate: &str) -> Result<()> {
        info!("Converting {} to {} ({})", input.display(), format, bitrate);
        self.run([
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-b:a"),
            OsStr::new(bitrate),
            OsStr::new("-f"),
            OsStr::new(format),
            output.as_os_str(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_model_error() {
        let ff = Ffmpeg::new("/nonexistent/ffmpeg-binary");
        assert!(!ff.is_available());
        let err = ff.run(["-version"]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ModelError);
        assert!(err.to_string().contains("ffmpeg"), "got: {}", err);
    }
}
