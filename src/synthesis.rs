//! Synthesis Driver — one output file per language, failures isolated per
//! language.
//!
//! Each language goes through [`SynthesisDriver::plan`] (pure validation:
//! language support, text presence) and, unless dry-running,
//! [`SynthesisDriver::apply`] (cleaning, model calls, chunk concatenation).

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::batch::{collect_files, run_batch, BatchReport, Done, RunMode};
use crate::config::{self, PipelineConfig};
use crate::engine::Synthesizer;
use crate::error::{require_exists, Error, Result};
use crate::language;
use crate::preprocess::{split_into_chunks, TextCleaner, DEFAULT_MAX_CHUNK_CHARS};
use crate::wav;

/// One validated unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisJob {
    pub language: String,
    pub text_path: PathBuf,
    pub reference: PathBuf,
    pub output: PathBuf,
}

pub struct SynthesisDriver<'a> {
    synthesizer: &'a dyn Synthesizer,
    texts_dir: PathBuf,
    reference: PathBuf,
    output_dir: PathBuf,
    label: String,
    max_chunk_chars: usize,
}

impl<'a> SynthesisDriver<'a> {
    pub fn new(
        synthesizer: &'a dyn Synthesizer,
        texts_dir: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            texts_dir: texts_dir.into(),
            reference: reference.into(),
            output_dir: output_dir.into(),
            label: label.into(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars;
        self
    }

    pub fn from_config(synthesizer: &'a dyn Synthesizer, cfg: &PipelineConfig) -> Self {
        Self::new(synthesizer, &cfg.texts_dir, &cfg.reference_audio, &cfg.output_dir, &cfg.label)
            .with_max_chunk_chars(cfg.max_chunk_chars)
    }

    pub fn output_path(&self, lang: &str) -> PathBuf {
        config::output_path(&self.output_dir, lang, &self.label)
    }

    /// Validate one language without touching the filesystem beyond `exists`.
    pub fn plan(&self, lang: &str) -> Result<SynthesisJob> {
        language::require_synthesizable(lang)?;
        let text_path = self.texts_dir.join(format!("{}.txt", lang));
        if !text_path.is_file() {
            return Err(Error::MissingText { code: lang.to_string(), path: text_path });
        }
        Ok(SynthesisJob {
            language: lang.to_string(),
            text_path,
            reference: self.reference.clone(),
            output: self.output_path(lang),
        })
    }

    /// Clean the text with its language's rules, then run the model once per chunk.
    pub fn apply(&self, job: &SynthesisJob) -> Result<Done> {
        let cleaner = TextCleaner::new(language::require_synthesizable(&job.language)?);
        let text = std::fs::read_to_string(&job.text_path).map_err(|e| Error::io(&job.text_path, e))?;
        let chunks = model_chunks(&text, &cleaner, self.max_chunk_chars);
        if chunks.is_empty() {
            return Ok(Done::Skipped(format!("{} is empty", job.text_path.display())));
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let stem = format!("{}_{}", job.language, self.label);
        let mut parts: Vec<PathBuf> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let part = self.output_dir.join(format!("{}_chunk_{}.wav", stem, i + 1));
            info!("[{}] chunk {}/{} ({} chars)", job.language, i + 1, chunks.len(), chunk.chars().count());
            if let Err(err) = self.synthesizer.synthesize(chunk, &job.reference, &job.language, &part) {
                remove_parts(&parts);
                remove_parts(std::slice::from_ref(&part));
                return Err(err);
            }
            parts.push(part);
        }

        if let [single] = parts.as_slice() {
            std::fs::rename(single, &job.output).map_err(|e| Error::io(&job.output, e))?;
        } else {
            let refs: Vec<&Path> = parts.iter().map(PathBuf::as_path).collect();
            let merged = wav::concat_wav(&refs, &job.output);
            remove_parts(&parts);
            merged?;
            info!("[{}] combined {} chunks", job.language, parts.len());
        }
        Ok(Done::Written(job.output.clone()))
    }

    /// Plan and (unless dry-running) apply every language in order.
    ///
    /// Only a missing reference audio aborts; everything else is recorded
    /// per language.
    pub fn run(&self, languages: &[String], mode: RunMode) -> Result<BatchReport> {
        require_exists(&self.reference)?;
        if !self.texts_dir.is_dir() {
            warn!("Texts directory {} does not exist", self.texts_dir.display());
        }

        let ready = match mode {
            RunMode::DryRun => Ok(()),
            RunMode::Execute => self.synthesizer.prepare().map_err(|e| e.to_string()),
        };

        Ok(run_batch(languages.iter(), |lang| {
            let job = self.plan(lang)?;
            match mode {
                RunMode::DryRun => Ok(Done::Planned(format!(
                    "synthesize {} with voice {} -> {}",
                    job.text_path.display(),
                    job.reference.display(),
                    job.output.display()
                ))),
                RunMode::Execute => {
                    if let Err(message) = &ready {
                        return Err(Error::model(self.synthesizer.name(), message.clone()));
                    }
                    self.apply(&job)
                }
            }
        }))
    }
}

/// Paragraphs (blank-line separated, inner line breaks folded), cleaned and
/// split further when longer than `max_len`.
pub fn model_chunks(text: &str, cleaner: &TextCleaner, max_len: usize) -> Vec<String> {
    text.split("\n\n")
        .map(|p| cleaner.clean(p))
        .filter(|p| !p.is_empty())
        .flat_map(|p| split_into_chunks(&p, max_len))
        .collect()
}

fn remove_parts(parts: &[PathBuf]) {
    for part in parts {
        if part.exists() {
            if let Err(e) = std::fs::remove_file(part) {
                warn!("Cannot remove {}: {}", part.display(), e);
            }
        }
    }
}

/// Language codes from the `*.txt` files of a texts directory.
pub fn discover_languages(texts_dir: &Path) -> Result<Vec<String>> {
    Ok(collect_files(texts_dir, &["txt"], false)?
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
        .map(|s| s.split('.').next().unwrap_or(s).to_string())
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Status;
    use crate::error::ErrorKind;
    use crate::wav::tests::tone;
    use std::cell::RefCell;

    /// Writes a 100 ms tone per call and remembers the calls.
    #[derive(Default)]
    struct FakeTts {
        calls: RefCell<Vec<(String, String)>>,
        fail_on: Option<&'static str>,
    }

    impl Synthesizer for FakeTts {
        fn name(&self) -> &str {
            "fake"
        }

        fn synthesize(&self, text: &str, _reference: &Path, language: &str, output: &Path) -> Result<()> {
            self.calls.borrow_mut().push((language.to_string(), text.to_string()));
            if self.fail_on == Some(text) {
                return Err(Error::model("fake", "refused"));
            }
            wav::write_wav(&tone(16_000, 100, 0.2), output)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(texts: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("texts")).unwrap();
            for (lang, body) in texts {
                std::fs::write(dir.path().join("texts").join(format!("{}.txt", lang)), body).unwrap();
            }
            wav::write_wav(&tone(16_000, 100, 0.2), &dir.path().join("ref.wav")).unwrap();
            Self { dir }
        }

        fn driver<'a>(&self, tts: &'a dyn Synthesizer) -> SynthesisDriver<'a> {
            let p = self.dir.path();
            SynthesisDriver::new(tts, p.join("texts"), p.join("ref.wav"), p.join("out"), "voice")
        }

        fn out(&self) -> PathBuf {
            self.dir.path().join("out")
        }
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partial_failure_isolated() {
        let fx = Fixture::new(&[("fr", "Bonjour."), ("sv", "Hej."), ("de", "Hallo.")]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["fr", "sv", "de"]), RunMode::Execute).unwrap();

        assert!(fx.out().join("fr_voice.wav").exists());
        assert!(fx.out().join("de_voice.wav").exists());
        assert!(!fx.out().join("sv_voice.wav").exists());
        let sv = report.get("sv").unwrap();
        assert!(matches!(sv.status, Status::Failed { kind: ErrorKind::UnsupportedLanguage, .. }));
        assert_eq!(tts.calls.borrow().len(), 2);
    }

    #[test]
    fn swedish_fails_even_without_text() {
        let fx = Fixture::new(&[]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["sv"]), RunMode::Execute).unwrap();
        assert!(matches!(
            report.items[0].status,
            Status::Failed { kind: ErrorKind::UnsupportedLanguage, .. }
        ));
    }

    #[test]
    fn missing_text_recorded() {
        let fx = Fixture::new(&[("fr", "Bonjour.")]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["it", "fr"]), RunMode::Execute).unwrap();
        assert!(matches!(report.items[0].status, Status::Failed { kind: ErrorKind::MissingText, .. }));
        assert_eq!(report.items[1].status, Status::Success);
    }

    #[test]
    fn exactly_one_output_per_language() {
        let fx = Fixture::new(&[("es", "Uno.\n\nDos.\n\nTres.")]);
        let tts = FakeTts::default();
        fx.driver(&tts).run(&langs(&["es"]), RunMode::Execute).unwrap();

        let files: Vec<_> = std::fs::read_dir(fx.out()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(files, vec![std::ffi::OsString::from("es_voice.wav")]);
        // three 100 ms chunks concatenated
        assert_eq!(wav::read_wav(&fx.out().join("es_voice.wav")).unwrap().frames(), 4_800);
        assert_eq!(tts.calls.borrow().len(), 3);
    }

    #[test]
    fn failed_chunk_leaves_no_debris() {
        let fx = Fixture::new(&[("it", "Uno.\n\nDue.")]);
        let tts = FakeTts { fail_on: Some("Due."), ..FakeTts::default() };
        let report = fx.driver(&tts).run(&langs(&["it"]), RunMode::Execute).unwrap();
        assert!(report.has_failures());
        assert_eq!(std::fs::read_dir(fx.out()).unwrap().count(), 0);
    }

    #[test]
    fn empty_text_is_skipped_explicitly() {
        let fx = Fixture::new(&[("tr", "  \n\n ")]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["tr"]), RunMode::Execute).unwrap();
        assert!(matches!(report.items[0].status, Status::Skipped { .. }));
    }

    #[test]
    fn dry_run_validates_without_side_effects() {
        let fx = Fixture::new(&[("fr", "Bonjour.")]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["fr", "sv"]), RunMode::DryRun).unwrap();
        match &report.items[0].status {
            Status::Planned { action } => assert!(action.contains("fr_voice.wav"), "got: {}", action),
            other => panic!("unexpected {:?}", other),
        }
        assert!(report.items[1].status.is_failure());
        assert!(tts.calls.borrow().is_empty());
        assert!(!fx.out().exists());

        // same plan for a single language
        let single = fx.driver(&tts).run(&langs(&["fr"]), RunMode::DryRun).unwrap();
        assert_eq!(single.items[0], report.items[0]);
    }

    #[test]
    fn missing_reference_is_fatal() {
        let fx = Fixture::new(&[("fr", "Bonjour.")]);
        std::fs::remove_file(fx.dir.path().join("ref.wav")).unwrap();
        let tts = FakeTts::default();
        let err = fx.driver(&tts).run(&langs(&["fr"]), RunMode::Execute).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputNotFound);
    }

    #[test]
    fn chunks_fold_lines_and_split_long_paragraphs() {
        let cleaner = TextCleaner::new(language::lookup("fr").unwrap());
        let text = "Première ligne\nsuite.\n\n\nUne phrase. Deux phrases. Trois phrases.";
        assert_eq!(
            model_chunks(text, &cleaner, 22),
            vec!["Première ligne suite.", "Une phrase.", "Deux phrases.", "Trois phrases."]
        );
        assert!(model_chunks(" \n\n ", &cleaner, 20).is_empty());
    }

    #[test]
    fn model_receives_cleaned_text() {
        let fx = Fixture::new(&[
            ("fr", "Bonjour ! 😀 « Oui »\u{200B}"),
            ("es", "¿ Qué tal ?\u{0007}\n\n¡ Hola !"),
        ]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["fr", "es"]), RunMode::Execute).unwrap();
        assert!(!report.has_failures());
        assert_eq!(
            *tts.calls.borrow(),
            vec![
                ("fr".to_string(), "Bonjour! «Oui»".to_string()),
                ("es".to_string(), "¿Qué tal?".to_string()),
                ("es".to_string(), "¡Hola!".to_string()),
            ]
        );
    }

    #[test]
    fn text_with_only_symbols_is_skipped() {
        let fx = Fixture::new(&[("de", "😀 \u{200B}")]);
        let tts = FakeTts::default();
        let report = fx.driver(&tts).run(&langs(&["de"]), RunMode::Execute).unwrap();
        assert!(matches!(report.items[0].status, Status::Skipped { .. }));
        assert!(tts.calls.borrow().is_empty());
    }

    #[test]
    fn discover_from_text_files() {
        let fx = Fixture::new(&[("fr", "a"), ("de", "b")]);
        let found = discover_languages(&fx.dir.path().join("texts")).unwrap();
        assert_eq!(found, vec!["de", "fr"]);
    }
}
