//! Error types for depsync-core

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Result type for depsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Loading,
    Resolving,
    Synthesizing,
    Diffing,
    Writing,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Resolving => "resolving",
            Self::Synthesizing => "synthesizing",
            Self::Diffing => "diffing",
            Self::Writing => "writing",
            Self::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while running a sync
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or invalid `depsync.toml`
    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// Malformed managed region markers in an existing build file
    #[error("malformed managed region in {}: {source}", .path.display())]
    Region {
        path: PathBuf,
        #[source]
        source: depsync_blocks::Error,
    },

    /// A glob used for orphan discovery could not be compiled
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// The run was interrupted
    #[error("sync cancelled")]
    Cancelled,

    #[error(transparent)]
    Manifest(#[from] depsync_manifest::Error),

    #[error(transparent)]
    Resolve(#[from] depsync_resolve::Error),

    #[error(transparent)]
    Fs(#[from] depsync_fs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The error class this error belongs to, for user-facing reports.
    pub fn class(&self) -> &'static str {
        use depsync_manifest::Error as ManifestError;
        use depsync_resolve::Error as ResolveError;

        match self {
            Self::Manifest(ManifestError::IncludeCycle { .. }) => "ManifestCycleError",
            Self::Manifest(_) | Self::Resolve(ResolveError::Manifest(_)) => "ManifestParseError",
            Self::Resolve(ResolveError::Cycle { .. }) => "ResolutionCycleError",
            Self::Resolve(
                ResolveError::RegistryUnavailable { .. }
                | ResolveError::NotFound { .. }
                | ResolveError::InvalidMetadata { .. },
            ) => "RegistryUnavailableError",
            Self::Resolve(
                ResolveError::Conflict { .. }
                | ResolveError::UnknownFeature { .. }
                | ResolveError::Diverged { .. },
            ) => "ResolutionConflictError",
            Self::Fs(_) => "FilesystemWriteError",
            Self::Region { .. } => "ManagedRegionError",
            Self::Config { .. } | Self::Pattern { .. } => "ConfigError",
            Self::Cancelled => "Cancelled",
            Self::Json(_) => "ReportError",
        }
    }

    /// The pipeline stage where this error surfaces.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config { .. } | Self::Manifest(_) => Stage::Loading,
            Self::Resolve(_) => Stage::Resolving,
            Self::Region { .. } | Self::Pattern { .. } => Stage::Diffing,
            Self::Fs(_) | Self::Cancelled => Stage::Writing,
            Self::Json(_) => Stage::Reporting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_and_stage() {
        let cycle = Error::Manifest(depsync_manifest::Error::IncludeCycle {
            cycle: vec![PathBuf::from("a"), PathBuf::from("a")],
        });
        assert_eq!(cycle.class(), "ManifestCycleError");
        assert_eq!(cycle.stage(), Stage::Loading);

        let conflict = Error::Resolve(depsync_resolve::Error::Conflict {
            package: "b".into(),
            constraints: vec![],
            available: vec![],
        });
        assert_eq!(conflict.class(), "ResolutionConflictError");
        assert_eq!(conflict.stage(), Stage::Resolving);

        let unavailable = Error::Resolve(depsync_resolve::Error::RegistryUnavailable {
            package: "b".into(),
            attempts: 4,
            reason: "timed out".into(),
        });
        assert_eq!(unavailable.class(), "RegistryUnavailableError");

        let write = Error::Fs(depsync_fs::Error::LockFailed {
            path: PathBuf::from("BUCK"),
        });
        assert_eq!(write.class(), "FilesystemWriteError");
        assert_eq!(write.stage(), Stage::Writing);
    }

    #[test]
    fn test_transparent_messages() {
        let err = Error::Resolve(depsync_resolve::Error::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        });
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
        assert_eq!(err.class(), "ResolutionCycleError");
    }
}
