//! Error types for depsync-fs

use std::path::PathBuf;

/// Result type for depsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while touching the filesystem
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Write to {path} cancelled before commit")]
    Cancelled { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The path this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::LockFailed { path } | Self::Cancelled { path } => path,
        }
    }
}
