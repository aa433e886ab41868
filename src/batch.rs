//! One batch driver for every component: run a per-item operation over a
//! list of items, isolate failures per item and collect the outcomes.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, ErrorKind, Result};

/// Whether a stage performs its work or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Execute,
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

/// Result of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Success,
    /// Dry-run: validation passed, the action that would run.
    Planned { action: String },
    Skipped { reason: String },
    Failed { kind: ErrorKind, message: String },
}

impl Status {
    pub fn failed(err: &Error) -> Self {
        Status::Failed { kind: err.kind(), message: err.to_string() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Success => "ok",
            Status::Planned { .. } => "planned",
            Status::Skipped { .. } => "skipped",
            Status::Failed { .. } => "FAILED",
        }
    }
}

/// What the per-item operation reports back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Done {
    Written(PathBuf),
    Planned(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub item: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub status: Status,
}

/// Ordered outcomes of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: ItemOutcome) {
        self.items.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|o| o.status.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|o| o.status == Status::Success).count()
    }

    pub fn get(&self, item: &str) -> Option<&ItemOutcome> {
        self.items.iter().find(|o| o.item == item)
    }

    pub fn extend(&mut self, other: BatchReport) {
        self.items.extend(other.items);
    }
}

/// Run `op` on every item in order.  An error on one item is logged and
/// recorded; the remaining items still run.
pub fn run_batch<T, F>(items: impl IntoIterator<Item = T>, mut op: F) -> BatchReport
where
    T: std::fmt::Display,
    F: FnMut(&T) -> Result<Done>,
{
    let mut report = BatchReport::default();
    for item in items {
        let name = item.to_string();
        let outcome = match op(&item) {
            Ok(Done::Written(path)) => {
                info!("[{}] ok: {}", name, path.display());
                ItemOutcome { item: name, output: Some(path), status: Status::Success }
            }
            Ok(Done::Planned(action)) => {
                info!("[{}] would {}", name, action);
                ItemOutcome { item: name, output: None, status: Status::Planned { action } }
            }
            Ok(Done::Skipped(reason)) => {
                warn!("[{}] skipped: {}", name, reason);
                ItemOutcome { item: name, output: None, status: Status::Skipped { reason } }
            }
            Err(err) => {
                error!("[{}] {}: {}", name, err.kind(), err);
                ItemOutcome { item: name, output: None, status: Status::failed(&err) }
            }
        };
        report.push(outcome);
    }
    report
}

/// Files under `dir` whose extension is in `extensions` (case-insensitive),
/// sorted by path.
pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound(dir.to_path_buf()));
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Display wrapper so paths can be batch items.
#[derive(Debug, Clone)]
pub struct FileItem(pub PathBuf);

impl std::fmt::Display for FileItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
