//! Run reports.
//!
//! A [`Report`] is what the CLI prints: file counts, per-target changes and
//! the outcome of every file, serializable to JSON.

use std::path::{Path, PathBuf};

use depsync_resolve::ResolvedGraph;
use serde::Serialize;

use crate::engine::Mode;
use crate::plan::{FileAction, SyncPlan, TargetChange, display_path};
use crate::writer::WriteOutcome;

/// Exit code for a clean run or a check without drift.
pub const EXIT_OK: i32 = 0;
/// Exit code for drift found by a check or dry run.
pub const EXIT_DRIFT: i32 = 1;
/// Exit code for fatal errors and failed writes.
pub const EXIT_FAILURE: i32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Final state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Would change, but the run does not write.
    Pending,
    Written,
    Deleted,
    Failed,
    Skipped,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub action: FileAction,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub version: String,
    pub workspace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mode: Mode,
    /// Resolved packages, dependencies first.
    pub packages: Vec<PackageSummary>,
    pub counts: Counts,
    pub targets: Vec<TargetChange>,
    pub files: Vec<FileReport>,
}

impl Report {
    /// Build a report for `plan`. `outcome` is `None` when nothing was
    /// written (check and dry-run modes).
    pub fn new(
        mode: Mode,
        graph: &ResolvedGraph,
        plan: &SyncPlan,
        outcome: Option<&WriteOutcome>,
    ) -> Self {
        let packages = graph
            .build_order()
            .iter()
            .filter_map(|name| graph.get(name))
            .map(|p| PackageSummary {
                name: p.name().to_string(),
                version: p.version().to_string(),
                workspace: p.is_workspace(),
            })
            .collect();

        let files = plan
            .files()
            .iter()
            .map(|file| {
                let (status, error) = match (file.action, outcome) {
                    (FileAction::Unchanged, _) => (FileStatus::Unchanged, None),
                    (_, None) => (FileStatus::Pending, None),
                    (_, Some(outcome)) => file_status(outcome, &file.relative),
                };
                FileReport {
                    path: display_path(&file.relative),
                    action: file.action,
                    status,
                    error,
                    diff: file.diff.clone(),
                }
            })
            .collect();

        Self {
            mode,
            packages,
            counts: Counts {
                created: plan.count(FileAction::Create),
                modified: plan.count(FileAction::Modify),
                deleted: plan.count(FileAction::Delete),
                unchanged: plan.count(FileAction::Unchanged),
            },
            targets: plan.changes().cloned().collect(),
            files,
        }
    }

    /// True when generated files differ from what the run computed.
    pub fn has_drift(&self) -> bool {
        self.counts.created + self.counts.modified + self.counts.deleted > 0
    }

    pub fn has_failures(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.status, FileStatus::Failed | FileStatus::Skipped))
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_FAILURE
        } else if self.mode.is_read_only() && self.has_drift() {
            EXIT_DRIFT
        } else {
            EXIT_OK
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn file_status(outcome: &WriteOutcome, path: &Path) -> (FileStatus, Option<String>) {
    let matches = |p: &PathBuf| p == path;
    if outcome.written.iter().any(matches) {
        (FileStatus::Written, None)
    } else if outcome.deleted.iter().any(matches) {
        (FileStatus::Deleted, None)
    } else if let Some(failed) = outcome.failed.iter().find(|f| f.path == path) {
        (FileStatus::Failed, Some(failed.error.clone()))
    } else {
        (FileStatus::Skipped, None)
    }
}
