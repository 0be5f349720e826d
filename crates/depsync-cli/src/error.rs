//! Error types for depsync-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from depsync-core
    #[error(transparent)]
    Core(#[from] depsync_core::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Error class shown next to the message.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Core(e) => e.class(),
            Self::Io(_) => "IoError",
        }
    }
}
