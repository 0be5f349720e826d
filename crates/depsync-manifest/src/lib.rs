//! Manifest tree loading for depsync.
//!
//! This crate parses `depsync-manifest.toml` documents, applies the default
//! table, evaluates version constraints and platform predicates, and walks
//! the workspace member tree into a flat list of [`PackageRequest`]s.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod platform;
pub mod request;
pub mod version;

/// The default manifest file name searched for in every member directory.
pub const MANIFEST_FILENAME: &str = "depsync-manifest.toml";

pub use error::{Error, Result};
pub use loader::{LoadedWorkspace, ManifestLoader, WorkspacePackage};
pub use manifest::{DependencyDecl, Manifest, PackageDecl, validate_name};
pub use platform::{PlatformSet, PlatformUniverse, parse_predicate};
pub use request::{PackageRequest, RequestOrigin};
pub use version::{VersionConstraint, parse_version};
