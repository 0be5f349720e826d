//! Managed regions inside generated build files.
//!
//! A build file may mix hand-written rules with rules that depsync owns.
//! The owned part is bracketed by two hash-comment marker lines:
//!
//! ```text
//! load("//tools:defs.bzl", "custom_rule")
//!
//! # depsync:begin managed region, generated, do not edit
//! rust_library(
//!     name = "serde",
//! )
//! # depsync:end
//! ```
//!
//! Everything outside the markers is preserved byte for byte by
//! [`splice_region`]. A file holds at most one region.

pub mod error;
pub mod parser;
pub mod writer;

pub use error::{Error, Result};
pub use parser::{BEGIN_MARKER, END_MARKER, ManagedRegion, find_region, has_region};
pub use writer::{render_region, splice_region, unmanaged_text};
