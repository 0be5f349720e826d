//! Applies a [`SyncPlan`] to disk.
//!
//! Files are independent, so pending plans are applied in parallel. Each
//! file is committed by a single rename (or removal); the first failure
//! raises an abort flag and writes that have not started yet are skipped.
//! Committed writes are never rolled back: rerunning is safe because the
//! plan of an up-to-date file is empty.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use depsync_fs::CancelToken;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::plan::{FileAction, FilePlan, SyncPlan};

/// A file whose write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWrite {
    pub path: PathBuf,
    pub error: String,
}

/// What happened to each pending file. Paths are relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<FailedWrite>,
    pub skipped: Vec<PathBuf>,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

enum Applied {
    Written,
    Deleted,
    Skipped,
    Failed(String),
}

/// Apply every pending file of `plan`.
pub fn apply(plan: &SyncPlan, cancel: &CancelToken) -> WriteOutcome {
    let abort = AtomicBool::new(false);
    let pending: Vec<&FilePlan> = plan.pending().collect();

    let results: Vec<(PathBuf, Applied)> = pending
        .par_iter()
        .map(|file| (file.relative.clone(), apply_file(file, cancel, &abort)))
        .collect();

    let mut outcome = WriteOutcome::default();
    for (path, applied) in results {
        match applied {
            Applied::Written => outcome.written.push(path),
            Applied::Deleted => outcome.deleted.push(path),
            Applied::Skipped => outcome.skipped.push(path),
            Applied::Failed(error) => outcome.failed.push(FailedWrite { path, error }),
        }
    }
    outcome
}

fn apply_file(file: &FilePlan, cancel: &CancelToken, abort: &AtomicBool) -> Applied {
    if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
        return Applied::Skipped;
    }

    let result = match (file.action, &file.new_content) {
        (FileAction::Delete, _) => {
            depsync_fs::remove_file(&file.path, cancel).map(|()| Applied::Deleted)
        }
        (_, Some(content)) => {
            depsync_fs::write_atomic(&file.path, content.as_bytes(), cancel)
                .map(|()| Applied::Written)
        }
        (_, None) => Ok(Applied::Skipped),
    };

    match result {
        Ok(applied) => {
            debug!(path = %file.relative.display(), "applied file plan");
            applied
        }
        Err(depsync_fs::Error::Cancelled { .. }) => Applied::Skipped,
        Err(e) => {
            abort.store(true, Ordering::SeqCst);
            warn!(path = %file.relative.display(), error = %e, "write failed, skipping remaining files");
            Applied::Failed(e.to_string())
        }
    }
}
