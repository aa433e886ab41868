//! Pipeline Orchestrator — reference audio → text assets → synthesis →
//! post-processing, driven by one [`PipelineConfig`].
//!
//! Only the reference stage can abort a run.  Every later failure is recorded
//! per language in the [`RunReport`] and the run carries on.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::batch::{run_batch, BatchReport, Done, ItemOutcome, RunMode, Status};
use crate::config::PipelineConfig;
use crate::engine::{AudioTools, Synthesizer};
use crate::error::{require_exists, Error, Result};
use crate::language;
use crate::normalizer;
use crate::postprocess::{self, PostOptions};
use crate::report::{RunReport, Stage, StageReport};
use crate::synthesis::SynthesisDriver;
use crate::wav;

/// Which optional stages run.  The reference check always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSelection {
    pub preprocessing: bool,
    pub synthesis: bool,
    pub post_processing: bool,
}

impl Default for StageSelection {
    fn default() -> Self {
        Self { preprocessing: true, synthesis: true, post_processing: true }
    }
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    synthesizer: &'a dyn Synthesizer,
    tools: &'a dyn AudioTools,
    mode: RunMode,
    stages: StageSelection,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, synthesizer: &'a dyn Synthesizer, tools: &'a dyn AudioTools) -> Self {
        Self { config, synthesizer, tools, mode: RunMode::Execute, stages: StageSelection::default() }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stages(mut self, stages: StageSelection) -> Self {
        self.stages = stages;
        self
    }

    /// Where a non-canonical reference is converted to.
    pub fn canonical_reference(&self) -> PathBuf {
        let raw = &self.config.reference_audio;
        let dir = raw.parent().unwrap_or_else(|| Path::new(""));
        normalizer::batch_output_path(raw, dir)
    }

    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(self.mode);
        let languages = &self.config.languages;
        info!(
            "{} pipeline for {} language(s): {}",
            if self.mode.is_dry_run() { "Planning" } else { "Running" },
            languages.len(),
            languages.join(", ")
        );

        // (a) reference audio
        let t = Instant::now();
        let (reference, outcome) = self.stage_reference()?;
        report.push(StageReport::ran(Stage::Reference, BatchReport { items: vec![outcome] }, t.elapsed()));

        // (b) text assets
        let mut ready: Vec<String> = languages.clone();
        if self.stages.preprocessing {
            let t = Instant::now();
            let texts = self.stage_texts();
            ready.retain(|lang| texts.get(lang).map_or(true, |o| !o.status.is_failure()));
            report.push(StageReport::ran(Stage::Texts, texts, t.elapsed()));
        } else {
            report.push(StageReport::skipped(Stage::Texts, "--skip-preprocessing"));
        }

        // (c) synthesis
        let synthesized: Vec<String> = if self.stages.synthesis {
            let t = Instant::now();
            let items = self.synthesis_driver(&reference).run(&ready, self.mode)?;
            let produced = items
                .items
                .iter()
                .filter(|o| matches!(o.status, Status::Success | Status::Planned { .. }))
                .map(|o| o.item.clone())
                .collect();
            report.push(StageReport::ran(Stage::Synthesis, items, t.elapsed()));
            produced
        } else {
            report.push(StageReport::skipped(Stage::Synthesis, "--skip-synthesis"));
            ready.into_iter().filter(|lang| self.config.output_path(lang).is_file()).collect()
        };

        // (d) post-processing
        let opts = PostOptions::from(&self.config.preprocessing);
        if !self.stages.post_processing {
            report.push(StageReport::skipped(Stage::PostProcessing, "--skip-post-processing"));
        } else if !self.config.preprocessing.any_enabled() {
            report.push(StageReport::skipped(Stage::PostProcessing, "disabled in configuration"));
        } else {
            let t = Instant::now();
            let items = self.stage_post(&synthesized, &opts);
            report.push(StageReport::ran(Stage::PostProcessing, items, t.elapsed()));
        }

        report.finish(languages, started.elapsed());
        Ok(report)
    }

    fn synthesis_driver(&self, reference: &Path) -> SynthesisDriver<'a> {
        SynthesisDriver::new(
            self.synthesizer,
            &self.config.texts_dir,
            reference,
            &self.config.output_dir,
            &self.config.label,
        )
        .with_max_chunk_chars(self.config.max_chunk_chars)
    }

    /// Returns the path synthesis should use.  Errors here are fatal.
    fn stage_reference(&self) -> Result<(PathBuf, ItemOutcome)> {
        let raw = &self.config.reference_audio;
        require_exists(raw)?;
        let item = raw.display().to_string();

        if wav::is_canonical(raw).unwrap_or(false) {
            info!("Reference {} is already 16 kHz mono", raw.display());
            normalizer::warn_on_duration(raw);
            let outcome = ItemOutcome { item, output: Some(raw.clone()), status: Status::Success };
            return Ok((raw.clone(), outcome));
        }

        let canonical = self.canonical_reference();
        match normalizer::normalize_file(self.tools, raw, &canonical, self.mode)? {
            Done::Planned(action) => {
                info!("[reference] would {}", action);
                // Nothing converted yet; validation continues against the raw file.
                let outcome = ItemOutcome { item, output: None, status: Status::Planned { action } };
                Ok((raw.clone(), outcome))
            }
            Done::Written(path) => {
                info!("Reference normalized to {}", path.display());
                let outcome = ItemOutcome { item, output: Some(path.clone()), status: Status::Success };
                Ok((path, outcome))
            }
            Done::Skipped(reason) => Err(Error::Config(reason)),
        }
    }

    fn stage_texts(&self) -> BatchReport {
        if !self.config.texts_dir.is_dir() {
            warn!("Texts directory {} does not exist", self.config.texts_dir.display());
        }
        run_batch(self.config.languages.iter(), |lang| {
            language::require_synthesizable(lang)?;
            let path = self.config.text_path(lang);
            if !path.is_file() {
                return Err(Error::MissingText { code: lang.to_string(), path });
            }
            let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            if text.trim().is_empty() {
                return Ok(Done::Skipped(format!("{} is empty", path.display())));
            }
            Ok(Done::Written(path))
        })
    }

    fn stage_post(&self, languages: &[String], opts: &PostOptions) -> BatchReport {
        run_batch(languages.iter(), |lang| {
            let path = self.config.output_path(lang);
            if self.mode.is_dry_run() {
                return Ok(Done::Planned(format!("{} {}", opts.describe(), path.display())));
            }
            postprocess::process_file(self.tools, &path, &path, opts, self.mode)
        })
    }
}
