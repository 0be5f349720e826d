//! The sync pipeline.
//!
//! `Loading -> Resolving -> Synthesizing -> Diffing -> Writing -> Reporting`.
//! Each stage consumes the previous stage's output read-only and runs in a
//! span named after it. A failing stage returns its error and later stages
//! never run; in particular nothing is written unless the whole plan was
//! computed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use depsync_fs::CancelToken;
use depsync_manifest::{LoadedWorkspace, ManifestLoader};
use depsync_resolve::{Fetcher, FileRegistry, Registry, ResolvedGraph, Resolver};
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::plan::{FileAction, SyncPlan, build_plan};
use crate::report::Report;
use crate::synth::{Layout, TargetDescriptor, synthesize};
use crate::writer;

/// How a run treats the computed plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Apply the plan.
    #[default]
    Sync,
    /// Report drift without writing.
    Check,
    /// Describe every change that would be made without writing.
    DryRun,
}

impl Mode {
    pub fn is_read_only(self) -> bool {
        !matches!(self, Self::Sync)
    }
}

/// Everything computed before the writing stage.
#[derive(Debug)]
pub struct Planned {
    pub workspace: LoadedWorkspace,
    pub graph: ResolvedGraph,
    pub targets: Vec<TargetDescriptor>,
    pub plan: SyncPlan,
}

/// Runs the pipeline for one workspace.
pub struct Engine {
    root: PathBuf,
    config: Config,
    registry: Arc<dyn Registry>,
    cancel: CancelToken,
}

impl Engine {
    /// Create an engine reading registry metadata from the configured index
    /// directory.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        let registry = Arc::new(FileRegistry::new(root.join(&config.registry.path)));
        Self {
            root,
            config,
            registry,
            cancel: CancelToken::new(),
        }
    }

    /// Load `depsync.toml` from `root` and create an engine.
    pub fn from_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Where build files go. A registry index inside the workspace is
    /// excluded from the stale build file search.
    pub fn layout(&self) -> Layout {
        let layout = Layout::new(
            self.config.sync.build_file.clone(),
            self.config.sync.third_party_dir.clone(),
        );
        let index = &self.config.registry.path;
        if index.is_relative() {
            layout.with_skipped(index.clone())
        } else {
            layout
        }
    }

    /// Run every stage up to and including diffing.
    pub async fn plan(&self) -> Result<Planned> {
        let workspace = {
            let _span = info_span!("loading").entered();
            info!(root = %self.root.display(), "loading manifests");
            let loader = ManifestLoader::new(
                &self.root,
                &self.config.sync.manifest,
                self.config.universe(),
            );
            let workspace = loader.load()?;
            info!(
                manifests = workspace.manifests.len(),
                packages = workspace.packages.len(),
                requests = workspace.requests.len(),
                "loaded manifests"
            );
            workspace
        };
        self.check_cancelled()?;

        let fetcher = Fetcher::new(Arc::clone(&self.registry), self.config.retry_policy());
        let universe = self.config.universe();
        let graph = async {
            info!("resolving versions");
            Resolver::new(&fetcher, &universe).resolve(&workspace).await
        }
        .instrument(info_span!("resolving"))
        .await?;
        self.check_cancelled()?;

        let layout = self.layout();
        let targets = {
            let _span = info_span!("synthesizing").entered();
            let targets = synthesize(&graph, &layout);
            info!(packages = graph.len(), targets = targets.len(), "synthesized targets");
            targets
        };

        let plan = {
            let _span = info_span!("diffing").entered();
            let plan = build_plan(&workspace.root, &layout, &targets)?;
            info!(
                create = plan.count(FileAction::Create),
                modify = plan.count(FileAction::Modify),
                delete = plan.count(FileAction::Delete),
                unchanged = plan.count(FileAction::Unchanged),
                "computed plan"
            );
            plan
        };

        Ok(Planned {
            workspace,
            graph,
            targets,
            plan,
        })
    }

    /// Run the whole pipeline.
    ///
    /// Failed file writes do not make this return an error; they are listed
    /// in the report, which then carries a failure exit code. Cancellation
    /// does: once the token fires, no further file is committed and the run
    /// ends with [`Error::Cancelled`].
    pub async fn run(&self, mode: Mode) -> Result<Report> {
        let planned = self.plan().await?;

        let outcome = if mode.is_read_only() {
            info!(?mode, pending = planned.plan.pending().count(), "read-only run, nothing written");
            None
        } else {
            let _span = info_span!("writing").entered();
            self.check_cancelled()?;
            let outcome = writer::apply(&planned.plan, &self.cancel);
            if self.cancel.is_cancelled() {
                warn!(
                    written = outcome.written.len(),
                    deleted = outcome.deleted.len(),
                    skipped = outcome.skipped.len(),
                    "sync cancelled"
                );
                return Err(Error::Cancelled);
            }
            info!(
                written = outcome.written.len(),
                deleted = outcome.deleted.len(),
                failed = outcome.failed.len(),
                "applied plan"
            );
            Some(outcome)
        };

        let _span = info_span!("reporting").entered();
        Ok(Report::new(
            mode,
            &planned.graph,
            &planned.plan,
            outcome.as_ref(),
        ))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
