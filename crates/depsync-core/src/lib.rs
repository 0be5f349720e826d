//! Pipeline layer for depsync
//!
//! Ties the lower crates together into one run:
//!
//! ```text
//!              depsync-cli
//!                   |
//!              depsync-core
//!                   |
//!   +----------+----+------+-----------+
//!   |          |           |           |
//! depsync-fs depsync-blocks depsync-manifest depsync-resolve
//! ```
//!
//! - [`config`]: `depsync.toml`
//! - [`synth`]: resolved packages to target descriptors
//! - [`render`]: canonical build-rule text and its inverse
//! - [`plan`]: per-file diffs against managed regions
//! - [`writer`]: atomic, parallel application of a plan
//! - [`report`]: counts, target changes, exit codes
//! - [`engine`]: the staged pipeline

pub mod config;
pub mod engine;
pub mod error;
pub mod plan;
pub mod render;
pub mod report;
pub mod synth;
pub mod writer;

pub use config::{CONFIG_FILENAME, Config, RegistrySection, SyncSection};
pub use engine::{Engine, Mode, Planned};
pub use error::{Error, Result, Stage};
pub use plan::{ChangeKind, FileAction, FilePlan, SyncPlan, TargetChange, build_plan};
pub use render::{RenderedTarget, parse_targets, render_targets};
pub use report::{EXIT_DRIFT, EXIT_FAILURE, EXIT_OK, FileReport, FileStatus, Report};
pub use synth::{Layout, TargetDescriptor, TargetKind, group_by_file, label, synthesize};
pub use writer::{FailedWrite, WriteOutcome, apply};
