//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use depsync_core::Mode;

/// depsync - Keep generated build files in step with dependency manifests
#[derive(Parser, Debug)]
#[command(name = "depsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Report drift without writing; exits 1 when files would change
    #[arg(long, conflicts_with = "dry_run")]
    pub check: bool,

    /// Show every change that would be made without writing; exits 1 on drift
    #[arg(long)]
    pub dry_run: bool,

    /// Increase output detail (-v per-target changes, -vv diffs)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Workspace root holding the root manifest
    #[arg(long, env = "DEPSYNC_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Registry index directory, overriding depsync.toml
    #[arg(long, env = "DEPSYNC_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.check {
            Mode::Check
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Sync
        }
    }

    /// Output detail level. A dry run always lists target changes.
    pub fn detail(&self) -> u8 {
        match self.mode() {
            Mode::DryRun => self.verbose.max(1),
            _ => self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags() {
        let cli = Cli::parse_from(["depsync"]);
        assert_eq!(cli.mode(), Mode::Sync);
        assert_eq!(cli.detail(), 0);

        let cli = Cli::parse_from(["depsync", "--check", "-vv"]);
        assert_eq!(cli.mode(), Mode::Check);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["depsync", "--dry-run"]);
        assert_eq!(cli.mode(), Mode::DryRun);
        assert_eq!(cli.detail(), 1);
    }

    #[test]
    fn test_check_conflicts_with_dry_run() {
        assert!(Cli::try_parse_from(["depsync", "--check", "--dry-run"]).is_err());
    }

    #[test]
    fn test_paths() {
        let cli = Cli::parse_from(["depsync", "--root", "ws", "--registry", "/srv/index"]);
        assert_eq!(cli.root, PathBuf::from("ws"));
        assert_eq!(cli.registry, Some(PathBuf::from("/srv/index")));
    }
}
