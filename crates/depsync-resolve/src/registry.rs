//! The registry capability and its implementations.
//!
//! A [`Registry`] answers one question: what versions, features and
//! dependencies does a package name have. Retrying, timeouts and caching are
//! layered on top by [`Fetcher`](crate::Fetcher); implementations only report
//! whether a failure is worth retrying.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::metadata::PackageMetadata;

/// Failure of a single registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The registry has no such package. Never retried.
    #[error("not found")]
    NotFound,
    /// The entry exists but cannot be understood. Never retried.
    #[error("{0}")]
    Invalid(String),
    /// Anything that might succeed on a later attempt.
    #[error("{0}")]
    Transient(String),
}

/// Per-package metadata lookup.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<PackageMetadata, FetchError>;
}

/// A registry backed by a directory of `<name>.toml` index files.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Registry for FileRegistry {
    async fn fetch(&self, name: &str) -> Result<PackageMetadata, FetchError> {
        let path = self.dir.join(format!("{name}.toml"));
        debug!(path = %path.display(), "reading registry entry");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(FetchError::NotFound),
            Err(e) => {
                return Err(FetchError::Transient(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let metadata = PackageMetadata::from_toml(&content)
            .map_err(|e| FetchError::Invalid(format!("{}: {e}", path.display())))?;
        if metadata.name != name {
            return Err(FetchError::Invalid(format!(
                "{} declares package '{}'",
                path.display(),
                metadata.name
            )));
        }
        Ok(metadata)
    }
}

#[derive(Debug, Default)]
struct Canned {
    packages: BTreeMap<String, PackageMetadata>,
    /// Remaining transient failures to inject per name.
    failures: BTreeMap<String, u32>,
    calls: BTreeMap<String, u32>,
}

/// Canned responses for tests, with injectable failures and latency.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<Canned>,
    delay: Option<Duration>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, replacing any previous entry with the same name.
    pub fn with_package(self, metadata: PackageMetadata) -> Self {
        self.insert(metadata);
        self
    }

    pub fn insert(&self, metadata: PackageMetadata) {
        self.lock().packages.insert(metadata.name.clone(), metadata);
    }

    /// Fail the next `times` lookups of `name` with a transient error.
    pub fn fail_times(self, name: &str, times: u32) -> Self {
        self.lock().failures.insert(name.to_string(), times);
        self
    }

    /// Sleep before answering every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many lookups `name` has received.
    pub fn calls(&self, name: &str) -> u32 {
        self.lock().calls.get(name).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Canned> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn fetch(&self, name: &str) -> Result<PackageMetadata, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        *state.calls.entry(name.to_string()).or_default() += 1;
        if let Some(remaining) = state.failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Transient(format!("injected failure for '{name}'")));
            }
        }
        state.packages.get(name).cloned().ok_or(FetchError::NotFound)
    }
}
