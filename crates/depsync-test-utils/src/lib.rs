//! Shared test utilities for the depsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`workspace`]: [`TestWorkspace`] builder for manifest trees, registry
//!   index files and existing build files

pub mod workspace;

pub use workspace::TestWorkspace;
