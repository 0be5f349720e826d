//! Human-readable report rendering

use std::fmt::Write as _;

use colored::Colorize;
use depsync_core::{ChangeKind, FileStatus, Mode, Report};

/// Render `report` for the terminal.
///
/// Detail 0 prints counts and problems, 1 adds one line per changed target,
/// 2 adds the unified diff of every changed file.
pub fn render(report: &Report, detail: u8) -> String {
    let mut out = String::new();
    let counts = &report.counts;

    let summary = format!(
        "{} created, {} modified, {} deleted, {} unchanged",
        counts.created, counts.modified, counts.deleted, counts.unchanged
    );
    let _ = match (report.mode, report.has_drift()) {
        (Mode::Sync, true) => writeln!(out, "{} Synced build files: {summary}", "=>".blue().bold()),
        (Mode::Sync, false) => writeln!(out, "{} Build files are up to date.", "OK".green().bold()),
        (_, true) => writeln!(out, "{} Build files have drifted: {summary}", "DRIFT".yellow().bold()),
        (_, false) => writeln!(out, "{} No drift detected.", "OK".green().bold()),
    };

    if detail >= 1 {
        for change in &report.targets {
            let (marker, kind) = match change.kind {
                ChangeKind::Added => ("+".green(), "added"),
                ChangeKind::Removed => ("-".red(), "removed"),
                ChangeKind::FeaturesChanged => ("~".yellow(), "features changed"),
                ChangeKind::DepsChanged => ("~".yellow(), "deps changed"),
                ChangeKind::Modified => ("~".yellow(), "modified"),
            };
            let _ = writeln!(out, "   {marker} {} ({})", change.label.cyan(), kind.dimmed());
        }
    }

    if detail >= 2 {
        for file in report.files.iter().filter(|f| !f.diff.is_empty()) {
            let _ = writeln!(out);
            for line in file.diff.lines() {
                let line = if line.starts_with("+++") || line.starts_with("---") {
                    line.bold()
                } else if line.starts_with('+') {
                    line.green()
                } else if line.starts_with('-') {
                    line.red()
                } else if line.starts_with("@@") {
                    line.cyan()
                } else {
                    line.normal()
                };
                let _ = writeln!(out, "{line}");
            }
        }
    }

    for file in &report.files {
        match file.status {
            FileStatus::Failed => {
                let _ = writeln!(
                    out,
                    "   {} {}: {}",
                    "!".red(),
                    file.path.cyan(),
                    file.error.as_deref().unwrap_or("write failed")
                );
            }
            FileStatus::Skipped => {
                let _ = writeln!(out, "   {} {} (skipped)", "!".red(), file.path.cyan());
            }
            _ => {}
        }
    }

    if report.mode != Mode::Sync && report.has_drift() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Run {} to apply.", "depsync".cyan());
    }
    out
}
