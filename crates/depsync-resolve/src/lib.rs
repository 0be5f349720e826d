//! Registry access and version resolution for depsync.
//!
//! The [`Resolver`] turns a [`LoadedWorkspace`](depsync_manifest::LoadedWorkspace)
//! into a [`ResolvedGraph`]: one version per package name, unioned features,
//! the platforms each package is needed on, and platform-narrowed edges.
//! Registry lookups go through a [`Fetcher`], which bounds concurrency,
//! applies timeouts and retries transient failures.

pub mod error;
pub mod fetch;
pub mod graph;
pub mod metadata;
pub mod registry;
pub mod resolved;
pub mod resolver;

pub use error::{Error, Result};
pub use fetch::{Fetcher, RetryPolicy};
pub use graph::DependencyGraph;
pub use metadata::{DependencySpec, FeatureEntry, PackageMetadata, PlatformOverride, VersionMetadata};
pub use registry::{FetchError, FileRegistry, InMemoryRegistry, Registry};
pub use resolved::{PackageSource, ResolvedEdge, ResolvedGraph, ResolvedPackage};
pub use resolver::{MAX_ITERATIONS, Resolver};
