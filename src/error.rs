//! Error taxonomy shared by every pipeline stage.
//!
//! Only [`Error::Config`] and a missing reference audio are fatal to a run;
//! every other variant is caught at the scope of one file or one language and
//! recorded in the report (see [`crate::batch`] and [`crate::report`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the orchestration core.
#[derive(Debug, Error)]
pub enum Error {
    /// A source file or directory does not exist.
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The language code is not in the relevant supported set.
    #[error("unsupported language '{code}': {reason}")]
    UnsupportedLanguage { code: String, reason: String },

    /// The per-language text asset `{texts_dir}/{lang}.txt` is absent.
    #[error("missing text for '{code}': {} does not exist", .path.display())]
    MissingText { code: String, path: PathBuf },

    /// The external synthesis or codec tool failed.
    #[error("{tool} failed: {message}")]
    Model { tool: String, message: String },

    /// Malformed or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV error on {}: {source}", .path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Serializable discriminant of [`Error`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InputNotFound,
    UnsupportedLanguage,
    MissingText,
    ModelError,
    ConfigError,
    Io,
    Audio,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputNotFound(_) => ErrorKind::InputNotFound,
            Error::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            Error::MissingText { .. } => ErrorKind::MissingText,
            Error::Model { .. } => ErrorKind::ModelError,
            Error::Config(_) => ErrorKind::ConfigError,
            Error::Io { .. } => ErrorKind::Io,
            Error::Wav { .. } => ErrorKind::Audio,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub(crate) fn wav(path: impl AsRef<Path>, source: hound::Error) -> Self {
        Error::Wav { path: path.as_ref().to_path_buf(), source }
    }

    pub(crate) fn model(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Model { tool: tool.into(), message: message.into() }
    }

    pub(crate) fn unsupported(code: &str, reason: impl Into<String>) -> Self {
        Error::UnsupportedLanguage { code: code.to_string(), reason: reason.into() }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InputNotFound => "InputNotFound",
            ErrorKind::UnsupportedLanguage => "UnsupportedLanguage",
            ErrorKind::MissingText => "MissingText",
            ErrorKind::ModelError => "ModelError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::Io => "Io",
            ErrorKind::Audio => "Audio",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::InputNotFound`] unless `path` exists.
pub fn require_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::InputNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(Error::InputNotFound("a".into()).kind(), ErrorKind::InputNotFound);
        assert_eq!(Error::unsupported("sv", "x").kind(), ErrorKind::UnsupportedLanguage);
        assert_eq!(Error::model("tts", "boom").kind(), ErrorKind::ModelError);
        assert_eq!(Error::Config("bad".into()).kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn only_config_is_fatal() {
        assert!(Error::Config("bad".into()).is_fatal());
        assert!(!Error::unsupported("sv", "x").is_fatal());
        assert!(!Error::InputNotFound("a".into()).is_fatal());
    }

    #[test]
    fn display_mentions_code() {
        let e = Error::MissingText { code: "fr".into(), path: "t/fr.txt".into() };
        assert!(e.to_string().contains("'fr'"), "got: {}", e);
        assert_eq!(ErrorKind::ModelError.to_string(), "ModelError");
    }

    #[test]
    fn require_exists_reports_path() {
        let err = require_exists(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(p) if p.ends_with("here.wav")));
    }
}
