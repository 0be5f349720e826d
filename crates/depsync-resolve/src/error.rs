use thiserror::Error;

/// Errors raised while fetching metadata or resolving versions.
#[derive(Debug, Error)]
pub enum Error {
    /// No version satisfies every constraint on a package.
    #[error(
        "no version of '{package}' satisfies all constraints: {}; available: {}",
        .constraints.join(", "),
        available_list(.available)
    )]
    Conflict {
        package: String,
        constraints: Vec<String>,
        available: Vec<String>,
    },

    /// A package transitively depends on itself.
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// The registry kept failing after every retry.
    #[error("registry unavailable for '{package}' after {attempts} attempts: {reason}")]
    RegistryUnavailable {
        package: String,
        attempts: u32,
        reason: String,
    },

    /// The registry has no entry for a package.
    #[error("package '{package}' not found in registry")]
    NotFound { package: String },

    /// Registry metadata is malformed.
    #[error("invalid registry metadata for '{package}': {message}")]
    InvalidMetadata { package: String, message: String },

    /// A requested feature is not declared by the chosen version.
    #[error("package '{package}@{version}' has no feature '{feature}'")]
    UnknownFeature {
        package: String,
        version: String,
        feature: String,
    },

    /// Resolution kept changing its choices.
    #[error("resolution did not converge after {iterations} iterations")]
    Diverged { iterations: usize },

    #[error(transparent)]
    Manifest(#[from] depsync_manifest::Error),
}

fn available_list(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
