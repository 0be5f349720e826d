//! Workspace configuration (`depsync.toml`)
//!
//! Every field has a default, so a workspace without the file behaves as if
//! it contained:
//!
//! ```toml
//! [sync]
//! manifest = "depsync-manifest.toml"
//! build_file = "BUCK"
//! third_party_dir = "third-party"
//! platforms = ["linux", "macos", "windows"]
//!
//! [registry]
//! path = "registry"
//! timeout_ms = 10000
//! max_retries = 3
//! initial_backoff_ms = 100
//! max_backoff_ms = 5000
//! concurrency = 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use depsync_manifest::{MANIFEST_FILENAME, PlatformUniverse, validate_name};
use depsync_resolve::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file at the workspace root.
pub const CONFIG_FILENAME: &str = "depsync.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sync: SyncSection,
    pub registry: RegistrySection,
}

/// The `[sync]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    /// Manifest file name searched for in every directory.
    pub manifest: String,
    /// Generated build file name.
    pub build_file: String,
    /// Destination root for registry packages, relative to the workspace root.
    pub third_party_dir: PathBuf,
    /// The platform universe predicates are evaluated against.
    pub platforms: Vec<String>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            manifest: MANIFEST_FILENAME.to_string(),
            build_file: "BUCK".to_string(),
            third_party_dir: PathBuf::from("third-party"),
            platforms: vec!["linux".into(), "macos".into(), "windows".into()],
        }
    }
}

/// The `[registry]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    /// Local index directory, relative to the workspace root.
    pub path: PathBuf,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub concurrency: usize,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("registry"),
            timeout_ms: 10_000,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            concurrency: 8,
        }
    }
}

impl Config {
    /// Load `depsync.toml` from `root`, falling back to defaults when the
    /// file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILENAME);
        let content = depsync_fs::read_optional(&path)?;
        match content {
            Some(content) => Self::parse(&content, &path),
            None => {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate configuration text. `path` is used for messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| Error::Config {
            path: path.to_path_buf(),
            message,
        };

        if self.sync.manifest.is_empty() || self.sync.manifest.contains(['/', '\\']) {
            return Err(invalid(format!(
                "sync.manifest must be a plain file name, got '{}'",
                self.sync.manifest
            )));
        }
        if self.sync.build_file.is_empty() || self.sync.build_file.contains(['/', '\\']) {
            return Err(invalid(format!(
                "sync.build_file must be a plain file name, got '{}'",
                self.sync.build_file
            )));
        }
        if self.sync.build_file == self.sync.manifest {
            return Err(invalid("sync.build_file and sync.manifest must differ".into()));
        }
        if self.sync.third_party_dir.is_absolute() {
            return Err(invalid("sync.third_party_dir must be relative".into()));
        }
        if self.sync.platforms.is_empty() {
            return Err(invalid("sync.platforms must not be empty".into()));
        }
        for platform in &self.sync.platforms {
            validate_name(platform)
                .map_err(|reason| invalid(format!("invalid platform '{platform}': {reason}")))?;
        }
        if self.registry.concurrency == 0 {
            return Err(invalid("registry.concurrency must be at least 1".into()));
        }
        if self.registry.timeout_ms == 0 {
            return Err(invalid("registry.timeout_ms must be positive".into()));
        }
        if self.registry.initial_backoff_ms > self.registry.max_backoff_ms {
            return Err(invalid(
                "registry.initial_backoff_ms must not exceed registry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn universe(&self) -> PlatformUniverse {
        PlatformUniverse::new(self.sync.platforms.iter().cloned())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.registry.timeout_ms),
            max_retries: self.registry.max_retries,
            initial_backoff: Duration::from_millis(self.registry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.registry.max_backoff_ms),
            concurrency: self.registry.concurrency,
        }
    }
}
