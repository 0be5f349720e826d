//! Filesystem primitives for depsync
//!
//! Every generated build file is committed through [`io::write_atomic`]:
//! the content goes to a temporary sibling first and a single rename makes
//! it visible. A [`CancelToken`] is consulted right before that rename so an
//! interrupted run never leaves a half-written destination behind.

pub mod cancel;
pub mod error;
pub mod io;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use io::{read_optional, remove_file, write_atomic};
