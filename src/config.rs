//! Pipeline configuration — the JSON file read once per invocation.
//!
//! ```json
//! {
//!   "reference_audio": "data/ref/direncan_ref.wav",
//!   "texts_dir": "data/texts",
//!   "output_dir": "outputs",
//!   "languages": ["fr", "de", "es", "it", "sv", "tr"],
//!   "preprocessing": { "normalize": true, "target_dBFS": -20.0, "fade": true, "fade_duration": 1000 }
//! }
//! ```
//!
//! `label`, `engine` and `max_chunk_chars` are optional and default as in
//! [`PipelineConfig::default`].

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language;
use crate::preprocess::DEFAULT_MAX_CHUNK_CHARS;

pub const DEFAULT_LABEL: &str = "direncan";
pub const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// Post-processing toggles (named `preprocessing` in the file for
/// compatibility with existing configs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    #[serde(default)]
    pub normalize: bool,

    /// Target loudness in dBFS.
    #[serde(rename = "target_dBFS", default = "default_target_dbfs")]
    pub target_dbfs: f32,

    #[serde(default)]
    pub fade: bool,

    /// Fade-in / fade-out length in milliseconds.
    #[serde(rename = "fade_duration", default = "default_fade_ms")]
    pub fade_duration_ms: u32,
}

fn default_target_dbfs() -> f32 {
    -20.0
}

fn default_fade_ms() -> u32 {
    1000
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            target_dbfs: default_target_dbfs(),
            fade: true,
            fade_duration_ms: default_fade_ms(),
        }
    }
}

impl ProcessingOptions {
    pub fn any_enabled(&self) -> bool {
        self.normalize || self.fade
    }
}

/// External commands driven as subprocesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tts_command: String,
    pub model_name: String,
    pub ffmpeg_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tts_command: "tts".to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            ffmpeg_command: "ffmpeg".to_string(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub reference_audio: PathBuf,
    pub texts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub languages: Vec<String>,

    #[serde(default)]
    pub preprocessing: ProcessingOptions,

    /// Identity label in output names: `{lang}_{label}.wav`.
    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_audio: PathBuf::from("data/ref/direncan_ref.wav"),
            texts_dir: PathBuf::from("data/texts"),
            output_dir: PathBuf::from("outputs"),
            languages: ["fr", "de", "es", "it", "sv", "tr"].map(String::from).to_vec(),
            preprocessing: ProcessingOptions::default(),
            label: default_label(),
            engine: EngineConfig::default(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / saving
// ─────────────────────────────────────────────────────────────────────────────

impl PipelineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file path.
    pub fn load_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&s).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load `path` if it exists, otherwise fall back to [`PipelineConfig::default`].
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_path(path)
        } else {
            warn!("Config {} not found, using built-in defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io(path, e))
    }

    /// Structural checks only.  Whether each language can be synthesized is
    /// decided per language by the synthesis driver so that one unsupported
    /// code never aborts the others.
    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(Error::Config("`languages` must not be empty".into()));
        }
        if self.label.trim().is_empty() || self.label.contains(['/', '\\']) {
            return Err(Error::Config(format!("invalid label '{}'", self.label)));
        }
        if self.max_chunk_chars == 0 {
            return Err(Error::Config("`max_chunk_chars` must be positive".into()));
        }
        if !self.preprocessing.target_dbfs.is_finite() || self.preprocessing.target_dbfs > 0.0 {
            return Err(Error::Config(format!(
                "`target_dBFS` must be a finite value <= 0, got {}",
                self.preprocessing.target_dbfs
            )));
        }
        Ok(())
    }

    /// Codes from `languages` the model cannot synthesize.
    pub fn unsupported_languages(&self) -> Vec<&str> {
        self.languages
            .iter()
            .map(String::as_str)
            .filter(|c| language::require_synthesizable(c).is_err())
            .collect()
    }

    /// `{texts_dir}/{lang}.txt`
    pub fn text_path(&self, lang: &str) -> PathBuf {
        self.texts_dir.join(format!("{}.txt", lang))
    }

    /// `{output_dir}/{lang}_{label}.wav`
    pub fn output_path(&self, lang: &str) -> PathBuf {
        output_path(&self.output_dir, lang, &self.label)
    }
}

pub fn output_path(output_dir: &Path, lang: &str, label: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.wav", lang, label))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "reference_audio": "ref.wav",
        "texts_dir": "texts",
        "output_dir": "out",
        "languages": ["fr", "sv", "de"],
        "preprocessing": { "normalize": true, "target_dBFS": -18.5, "fade": false, "fade_duration": 250 }
    }"#;

    #[test]
    fn from_json_minimal() {
        let c = PipelineConfig::from_json(MINIMAL).unwrap();
        assert_eq!(c.reference_audio, PathBuf::from("ref.wav"));
        assert_eq!(c.languages, vec!["fr", "sv", "de"]);
        assert_eq!(c.preprocessing.target_dbfs, -18.5);
        assert_eq!(c.preprocessing.fade_duration_ms, 250);
        assert!(!c.preprocessing.fade);
        assert_eq!(c.label, DEFAULT_LABEL);
        assert_eq!(c.engine.model_name, DEFAULT_MODEL);
        assert_eq!(c.max_chunk_chars, DEFAULT_MAX_CHUNK_CHARS);
    }

    #[test]
    fn save_and_reload_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut c = PipelineConfig::from_json(MINIMAL).unwrap();
        c.label = "narrator".into();
        c.engine.ffmpeg_command = "/opt/ffmpeg".into();
        c.save(&path).unwrap();
        let reloaded = PipelineConfig::load_path(&path).unwrap();
        assert_eq!(reloaded, c);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"target_dBFS\""), "got: {}", text);
        assert!(text.contains("\"fade_duration\""), "got: {}", text);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = PipelineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = PipelineConfig::from_json(r#"{"reference_audio": "a"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut c = PipelineConfig::default();
        c.languages.clear();
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.label = "a/b".into();
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.preprocessing.target_dbfs = 3.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn unsupported_codes_pass_validation_but_are_flagged() {
        let mut c = PipelineConfig::from_json(MINIMAL).unwrap();
        c.languages.push("xx".into());
        assert!(c.validate().is_ok());
        assert_eq!(c.unsupported_languages(), vec!["sv", "xx"]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = PipelineConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(c, PipelineConfig::default());
    }

    #[test]
    fn derived_paths() {
        let c = PipelineConfig::from_json(MINIMAL).unwrap();
        assert_eq!(c.text_path("fr"), PathBuf::from("texts/fr.txt"));
        assert_eq!(c.output_path("fr"), PathBuf::from("out/fr_direncan.wav"));
    }
}
