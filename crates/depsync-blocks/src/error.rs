//! Error types for depsync-blocks

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed managed region markers. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("managed region opened on line {line} is never closed")]
    Unterminated { line: usize },

    #[error("managed region end marker on line {line} has no matching begin marker")]
    UnmatchedEnd { line: usize },

    #[error("duplicate managed region {marker} marker on line {line}")]
    Duplicate { marker: &'static str, line: usize },
}
