//! Text preparation on disk: clean one file, clean a directory, or fan one
//! base text out into per-language `{lang}.txt` scaffolds.
//!
//! Fan-out never translates: every generated file holds the base text
//! cleaned for its language tag and is meant to be edited afterwards.

use std::path::{Path, PathBuf};

use log::info;

use crate::batch::{collect_files, run_batch, BatchReport, Done, FileItem, RunMode};
use crate::error::{require_exists, Error, Result};
use crate::language;
use crate::preprocess::TextCleaner;

fn read_text(path: &Path) -> Result<String> {
    require_exists(path)?;
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// Chunks joined as paragraphs separated by a blank line.
fn render_chunks(chunks: &[String]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(chunk);
        out.push_str("\n\n");
    }
    out
}

/// Clean `input` for `lang` and write the chunked result to `output`.
pub fn prepare_file(
    input: &Path,
    output: &Path,
    lang: &str,
    max_len: usize,
    mode: RunMode,
) -> Result<Done> {
    let language = language::require_known(lang)?;
    let text = read_text(input)?;
    let chunks = TextCleaner::new(language).prepare(&text, max_len);
    if mode.is_dry_run() {
        return Ok(Done::Planned(format!(
            "write {} chunk(s) for {} to {}",
            chunks.len(),
            language.code,
            output.display()
        )));
    }
    write_text(output, &render_chunks(&chunks))?;
    info!("Prepared {} -> {} ({} chunks)", input.display(), output.display(), chunks.len());
    Ok(Done::Written(output.to_path_buf()))
}

/// `{output_dir}/{stem}_prepared.txt` for every `*.txt` in `input_dir`.
pub fn prepare_dir(
    input_dir: &Path,
    output_dir: &Path,
    lang: &str,
    max_len: usize,
    mode: RunMode,
) -> Result<BatchReport> {
    language::require_known(lang)?;
    let files = collect_files(input_dir, &["txt"], false)?;
    info!("Found {} text files to prepare", files.len());
    Ok(run_batch(files.into_iter().map(FileItem), |item: &FileItem| {
        let stem = item.0.file_stem().and_then(|s| s.to_str()).unwrap_or("text");
        let output = output_dir.join(format!("{}_prepared.txt", stem));
        prepare_file(&item.0, &output, lang, max_len, mode)
    }))
}

/// Write `{output_dir}/{lang}.txt` for each language from one base text.
pub fn create_multilingual(
    base_text: &str,
    languages: &[String],
    output_dir: &Path,
    mode: RunMode,
) -> BatchReport {
    run_batch(languages.iter(), |lang| {
        let language = language::require_known(lang)?;
        let cleaned: Vec<String> = {
            let cleaner = TextCleaner::new(language);
            base_text.lines().map(|l| cleaner.clean(l)).filter(|l| !l.is_empty()).collect()
        };
        if cleaned.is_empty() {
            return Err(Error::MissingText {
                code: language.code.to_string(),
                path: PathBuf::from("<base text>"),
            });
        }
        let output = output_dir.join(format!("{}.txt", lang));
        if mode.is_dry_run() {
            return Ok(Done::Planned(format!("create {}", output.display())));
        }
        let mut contents = cleaned.join("\n\n");
        contents.push('\n');
        write_text(&output, &contents)?;
        Ok(Done::Written(output))
    })
}

/// Fan-out from a base text file.
pub fn create_multilingual_from_file(
    base: &Path,
    languages: &[String],
    output_dir: &Path,
    mode: RunMode,
) -> Result<BatchReport> {
    if base.is_dir() {
        return Err(Error::Config(format!(
            "{} is a directory; multilingual fan-out needs a base text file",
            base.display()
        )));
    }
    let text = read_text(base)?;
    Ok(create_multilingual(&text, languages, output_dir, mode))
}

/// Sample texts written by `init-examples`.
pub const EXAMPLE_TEXTS: &[(&str, &str)] = &[
    ("fr", "Bonjour, ceci est un exemple de texte en français pour le système TTS."),
    ("de", "Hallo, dies ist ein Beispieltext in Deutsch für das TTS-System."),
    ("es", "Hola, este es un ejemplo de texto en español para el sistema TTS."),
    ("it", "Ciao, questo è un esempio di testo in italiano per il sistema TTS."),
    ("sv", "Hej, detta är ett exempel på text på svenska för TTS-systemet."),
    ("tr", "Merhaba, bu Türkçe TTS sistemi için örnek bir metindir."),
];

pub fn write_examples(texts_dir: &Path) -> BatchReport {
    run_batch(EXAMPLE_TEXTS.iter().map(|(lang, _)| *lang), |lang| {
        let text = EXAMPLE_TEXTS
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, t)| *t)
            .unwrap_or_default();
        let path = texts_dir.join(format!("{}.txt", lang));
        write_text(&path, text)?;
        Ok(Done::Written(path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Status;
    use crate::error::ErrorKind;

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fan_out_creates_one_file_per_language() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("texts");
        let report = create_multilingual("Hello  world !", &langs(&["fr", "de", "es"]), &out, RunMode::Execute);
        assert!(!report.has_failures());

        let mut names: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["de.txt", "es.txt", "fr.txt"]);
        for name in names {
            let body = std::fs::read_to_string(out.join(&name)).unwrap();
            assert!(!body.trim().is_empty(), "{} is empty", name);
        }
        assert_eq!(std::fs::read_to_string(out.join("fr.txt")).unwrap(), "Hello world!\n");
    }

    #[test]
    fn fan_out_isolates_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let report = create_multilingual("Hi", &langs(&["fr", "xx", "de"]), dir.path(), RunMode::Execute);
        assert_eq!(report.succeeded(), 2);
        let failed = report.get("xx").unwrap();
        assert!(matches!(failed.status, Status::Failed { kind: ErrorKind::UnsupportedLanguage, .. }));
        assert!(!dir.path().join("xx.txt").exists());
    }

    #[test]
    fn fan_out_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("texts");
        let report = create_multilingual("Hi", &langs(&["fr"]), &out, RunMode::DryRun);
        assert!(matches!(report.items[0].status, Status::Planned { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn prepare_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = prepare_file(&missing, &dir.path().join("o.txt"), "fr", 200, RunMode::Execute).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputNotFound);

        let src = dir.path().join("src.txt");
        std::fs::write(&src, "Hi").unwrap();
        let err = prepare_file(&src, &dir.path().join("o.txt"), "xx", 200, RunMode::Execute).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    }

    #[test]
    fn prepare_file_writes_paragraph_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "Bonjour   tout le monde !\nAu revoir ?").unwrap();
        let out = dir.path().join("out").join("fr.txt");
        prepare_file(&src, &out, "fr", 200, RunMode::Execute).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "Bonjour tout le monde!\n\nAu revoir?\n\n");
    }

    #[test]
    fn prepare_dir_names_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.txt"), "One.").unwrap();
        std::fs::write(input.join("b.txt"), "Two.").unwrap();
        let output = dir.path().join("out");
        let report = prepare_dir(&input, &output, "en", 200, RunMode::Execute).unwrap();
        assert_eq!(report.succeeded(), 2);
        assert!(output.join("a_prepared.txt").exists());
        assert!(output.join("b_prepared.txt").exists());
    }

    #[test]
    fn examples_cover_six_languages() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_examples(dir.path());
        assert_eq!(report.succeeded(), 6);
        assert!(dir.path().join("sv.txt").exists());
    }
}
