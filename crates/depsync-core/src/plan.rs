//! Sync plan computation.
//!
//! Nothing here writes: each destination file is read, its managed region
//! extracted and compared with freshly rendered text. The result is a
//! [`SyncPlan`] the writer applies or the reporter describes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use depsync_blocks::{find_region, render_region, splice_region, unmanaged_text};
use rayon::prelude::*;
use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::render::{RenderedTarget, parse_targets, render_targets};
use crate::synth::{Layout, TargetDescriptor, group_by_file, label};

/// What the writer will do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
    Unchanged,
}

/// Per-target structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    FeaturesChanged,
    DepsChanged,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetChange {
    pub label: String,
    pub kind: ChangeKind,
}

/// The planned change for one build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    /// Absolute destination path.
    pub path: PathBuf,
    /// Destination relative to the workspace root.
    pub relative: PathBuf,
    pub action: FileAction,
    pub old_region: String,
    pub new_region: String,
    /// Full file content to write; `None` for deletions and unchanged files.
    pub new_content: Option<String>,
    /// Unified line diff of the managed region, empty when unchanged.
    pub diff: String,
    pub changes: Vec<TargetChange>,
}

/// Every file the run touches or checked, ordered by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    files: Vec<FilePlan>,
}

impl SyncPlan {
    pub fn files(&self) -> &[FilePlan] {
        &self.files
    }

    /// Files that need a write or a deletion.
    pub fn pending(&self) -> impl Iterator<Item = &FilePlan> {
        self.files
            .iter()
            .filter(|f| f.action != FileAction::Unchanged)
    }

    /// True when applying the plan would change nothing on disk.
    pub fn is_empty(&self) -> bool {
        self.pending().next().is_none()
    }

    pub fn count(&self, action: FileAction) -> usize {
        self.files.iter().filter(|f| f.action == action).count()
    }

    pub fn changes(&self) -> impl Iterator<Item = &TargetChange> {
        self.files.iter().flat_map(|f| f.changes.iter())
    }
}

/// Compute the plan for `targets` under `root`.
///
/// Build files anywhere under `root` that still carry a managed region but
/// belong to no resolved package are included with no targets, so their
/// region is emptied or the file deleted.
pub fn build_plan(root: &Path, layout: &Layout, targets: &[TargetDescriptor]) -> Result<SyncPlan> {
    let mut files = group_by_file(targets, layout);
    for existing in discover_build_files(root, layout)? {
        files.entry(existing).or_default();
    }

    let entries: Vec<(PathBuf, Vec<&TargetDescriptor>)> = files.into_iter().collect();
    let plans = entries
        .par_iter()
        .map(|(relative, targets)| plan_file(root, relative, targets))
        .collect::<Result<Vec<_>>>()?;

    let plan = SyncPlan {
        files: plans.into_iter().flatten().collect(),
    };
    debug!(
        files = plan.files.len(),
        pending = plan.pending().count(),
        "computed sync plan"
    );
    Ok(plan)
}

/// Existing build files below `root`, relative to it. Hidden directories and
/// the layout's skipped directories are left out.
fn discover_build_files(root: &Path, layout: &Layout) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        glob::Pattern::escape(&layout.build_file)
    );
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let entries = glob::glob_with(&pattern, options).map_err(|e| Error::Pattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable directory");
                continue;
            }
        };
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if relative.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            || layout.is_skipped(relative)
        {
            continue;
        }
        found.push(relative.to_path_buf());
    }
    Ok(found)
}

fn plan_file(
    root: &Path,
    relative: &Path,
    targets: &[&TargetDescriptor],
) -> Result<Option<FilePlan>> {
    let path = root.join(relative);
    let region_error = |source| Error::Region {
        path: path.clone(),
        source,
    };
    let new_region = render_targets(targets.iter().copied());

    let (action, old_region, new_content) = match depsync_fs::read_optional(&path)? {
        None if targets.is_empty() => return Ok(None),
        None => (
            FileAction::Create,
            String::new(),
            Some(render_region(&new_region)),
        ),
        Some(source) => match find_region(&source).map_err(region_error)? {
            // Not ours: hand-written file in a directory we no longer manage.
            None if targets.is_empty() => return Ok(None),
            None => (
                FileAction::Modify,
                String::new(),
                Some(splice_region(&source, &new_region).map_err(region_error)?),
            ),
            Some(region) => {
                let rest = unmanaged_text(&source).map_err(region_error)?;
                if targets.is_empty() && rest.trim().is_empty() {
                    (FileAction::Delete, region.content, None)
                } else if region.content == new_region {
                    (FileAction::Unchanged, region.content, None)
                } else {
                    let content = splice_region(&source, &new_region).map_err(region_error)?;
                    (FileAction::Modify, region.content, Some(content))
                }
            }
        },
    };

    let display = display_path(relative);
    let dir = relative.parent().unwrap_or(Path::new(""));
    let (changes, diff) = if action == FileAction::Unchanged {
        (Vec::new(), String::new())
    } else {
        (
            classify(dir, &display, &old_region, targets),
            unified_diff(&display, &old_region, &new_region),
        )
    };

    Ok(Some(FilePlan {
        path,
        relative: relative.to_path_buf(),
        action,
        old_region,
        new_region,
        new_content,
        diff,
        changes,
    }))
}

fn classify(
    dir: &Path,
    file: &str,
    old_region: &str,
    targets: &[&TargetDescriptor],
) -> Vec<TargetChange> {
    let old: BTreeMap<String, RenderedTarget> = match parse_targets(old_region) {
        Ok(parsed) => parsed.into_iter().map(|t| (t.name.clone(), t)).collect(),
        Err(e) => {
            warn!(file = %file, error = %e, "existing managed region is not canonical, treating all targets as added");
            BTreeMap::new()
        }
    };
    let new: BTreeMap<String, RenderedTarget> = targets
        .iter()
        .map(|t| (t.name.clone(), RenderedTarget::from_descriptor(t)))
        .collect();

    let mut names: Vec<&String> = old.keys().chain(new.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| {
            let kind = match (old.get(name), new.get(name)) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Removed,
                (Some(before), Some(after)) if before == after => return None,
                (Some(before), Some(after)) if before.features != after.features => {
                    ChangeKind::FeaturesChanged
                }
                (Some(before), Some(after)) if before.deps != after.deps => ChangeKind::DepsChanged,
                (Some(_), Some(_)) => ChangeKind::Modified,
                (None, None) => return None,
            };
            Some(TargetChange {
                label: label(dir, name),
                kind,
            })
        })
        .collect()
}

fn unified_diff(display: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("a/{display}"), &format!("b/{display}"))
        .to_string()
}

/// Relative path with `/` separators.
pub(crate) fn display_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
