use std::path::PathBuf;

/// Errors raised while loading the manifest tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed TOML syntax or shape, with the 1-based position.
    #[error("failed to parse manifest {}:{line}:{column}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Well-formed TOML with an invalid value.
    #[error("invalid manifest {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },

    /// Manifest inclusion loops back on itself.
    #[error("manifest inclusion cycle: {}", format_cycle(.cycle))]
    IncludeCycle { cycle: Vec<PathBuf> },

    /// The root manifest does not exist.
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A literal member path has no manifest.
    #[error("workspace member '{pattern}' listed in {} has no manifest", .manifest.display())]
    MemberNotFound { manifest: PathBuf, pattern: String },

    /// A member glob could not be compiled.
    #[error("invalid member pattern '{pattern}' in {}: {reason}", .manifest.display())]
    InvalidPattern {
        manifest: PathBuf,
        pattern: String,
        reason: String,
    },

    /// A member resolves to a directory outside the workspace root.
    #[error("member {} lies outside the workspace root {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Two manifests declare the same package name.
    #[error("duplicate package '{name}' declared in {} and {}", .first.display(), .second.display())]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Invalid version constraint string.
    #[error("invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// Invalid platform predicate.
    #[error("invalid platform predicate '{predicate}': {reason}")]
    InvalidPlatform { predicate: String, reason: String },

    /// I/O error reading a manifest.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, Error>;
