//! Run Report — per-stage outcomes and timings plus one final status per
//! language.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::batch::{BatchReport, ItemOutcome, RunMode, Status};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reference,
    Texts,
    Synthesis,
    PostProcessing,
}

impl Stage {
    /// Stages whose outputs are the per-language audio files.
    pub fn produces_audio(self) -> bool {
        matches!(self, Stage::Synthesis | Stage::PostProcessing)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Reference => "reference audio",
            Stage::Texts => "text assets",
            Stage::Synthesis => "synthesis",
            Stage::PostProcessing => "post-processing",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Set when the stage did not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub elapsed_ms: u64,
    pub items: BatchReport,
}

impl StageReport {
    pub fn ran(stage: Stage, items: BatchReport, elapsed: Duration) -> Self {
        Self { stage, skipped: None, elapsed_ms: elapsed.as_millis() as u64, items }
    }

    pub fn skipped(stage: Stage, reason: impl Into<String>) -> Self {
        Self { stage, skipped: Some(reason.into()), elapsed_ms: 0, items: BatchReport::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub stages: Vec<StageReport>,
    /// Final outcome per configured language, in configuration order.
    pub languages: Vec<ItemOutcome>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self { mode, stages: Vec::new(), languages: Vec::new(), elapsed_ms: 0 }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Fold the per-stage outcomes into one outcome per language.
    ///
    /// A failure in any stage wins.  Otherwise the latest audio stage
    /// (synthesis, post-processing) that mentions the language decides; a
    /// language no audio stage produced anything for is skipped.
    pub fn finish(&mut self, languages: &[String], elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self.languages = languages
            .iter()
            .map(|lang| {
                let mentions: Vec<(Stage, &ItemOutcome)> = self
                    .stages
                    .iter()
                    .filter_map(|s| s.items.get(lang).map(|o| (s.stage, o)))
                    .collect();
                if let Some((_, failed)) = mentions.iter().find(|(_, o)| o.status.is_failure()) {
                    return (*failed).clone();
                }
                if let Some((_, last)) = mentions.iter().rev().find(|(stage, _)| stage.produces_audio()) {
                    return (*last).clone();
                }
                let reason = mentions
                    .iter()
                    .rev()
                    .find_map(|(_, o)| match &o.status {
                        Status::Skipped { reason } => Some(reason.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "no audio produced".into());
                ItemOutcome { item: lang.clone(), output: None, status: Status::Skipped { reason } }
            })
            .collect();
    }

    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| s.items.has_failures())
    }

    pub fn outputs(&self) -> Vec<&PathBuf> {
        self.languages.iter().filter_map(|o| o.output.as_ref()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(format!("cannot serialize report: {}", e)))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io(path, e))
    }

    /// Human-readable summary on stdout.
    pub fn print_summary(&self) {
        let title = match self.mode {
            RunMode::Execute => "Run report",
            RunMode::DryRun => "Dry-run plan",
        };
        println!("\n{}", title);
        println!("{}", "─".repeat(60));
        for stage in &self.stages {
            match &stage.skipped {
                Some(reason) => println!("{:<16} skipped ({})", stage.stage.to_string(), reason),
                None => println!(
                    "{:<16} {} item(s), {} failed, {:.1} s",
                    stage.stage.to_string(),
                    stage.items.items.len(),
                    stage.items.failures().count(),
                    stage.elapsed_ms as f64 / 1000.0
                ),
            }
        }
        println!("{}", "─".repeat(60));
        for outcome in &self.languages {
            let detail = match &outcome.status {
                Status::Success => outcome.output.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                Status::Planned { action } => action.clone(),
                Status::Skipped { reason } => reason.clone(),
                Status::Failed { kind, message } => format!("{}: {}", kind, message),
            };
            println!("  {:<6} {:<8} {}", outcome.item, outcome.status.label(), detail);
        }
        let failed = self.languages.iter().filter(|o| o.status.is_failure()).count();
        println!(
            "{} language(s), {} failed, total {:.1} s",
            self.languages.len(),
            failed,
            self.elapsed_ms as f64 / 1000.0
        );
    }
}
