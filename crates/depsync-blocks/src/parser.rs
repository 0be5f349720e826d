//! Managed region parsing.
//!
//! Parses the marker-delimited region with the format:
//! ```text
//! # depsync:begin managed region, generated, do not edit
//! content here
//! # depsync:end
//! ```
//! Markers must start a line. Trailing text after the marker keyword is
//! ignored so older banners are still recognised.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// The canonical opening marker line.
pub const BEGIN_MARKER: &str = "# depsync:begin managed region, generated, do not edit";

/// The canonical closing marker line.
pub const END_MARKER: &str = "# depsync:end";

static BEGIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#[ \t]*depsync:begin\b[^\n]*$").expect("Invalid begin marker regex")
});

static END_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#[ \t]*depsync:end\b[^\n]*$").expect("Invalid end marker regex")
});

/// A parsed managed region with its content and position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRegion {
    /// The lines between the markers, each terminated by a newline.
    pub content: String,
    /// The 1-based line number of the opening marker.
    pub start_line: usize,
    /// The 1-based line number of the closing marker.
    pub end_line: usize,
    /// Byte span from the opening marker through the closing marker's
    /// line terminator.
    pub span: Range<usize>,
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Locate the managed region in `source`.
///
/// Returns `Ok(None)` when the file carries no markers at all.
///
/// # Errors
/// Fails on a begin marker without an end, an end without a begin, or a
/// second marker of either kind.
///
/// # Example
/// ```
/// use depsync_blocks::find_region;
///
/// let source = "head\n# depsync:begin\nbody\n# depsync:end\ntail\n";
/// let region = find_region(source).unwrap().unwrap();
/// assert_eq!(region.content, "body\n");
/// assert_eq!(region.start_line, 2);
/// ```
pub fn find_region(source: &str) -> Result<Option<ManagedRegion>> {
    let begins: Vec<_> = BEGIN_PATTERN.find_iter(source).collect();
    let ends: Vec<_> = END_PATTERN.find_iter(source).collect();

    if let Some(extra) = begins.get(1) {
        return Err(Error::Duplicate {
            marker: "begin",
            line: line_of(source, extra.start()),
        });
    }
    if let Some(extra) = ends.get(1) {
        return Err(Error::Duplicate {
            marker: "end",
            line: line_of(source, extra.start()),
        });
    }

    let (begin, end) = match (begins.first(), ends.first()) {
        (None, None) => return Ok(None),
        (Some(begin), None) => {
            return Err(Error::Unterminated {
                line: line_of(source, begin.start()),
            });
        }
        (None, Some(end)) => {
            return Err(Error::UnmatchedEnd {
                line: line_of(source, end.start()),
            });
        }
        (Some(begin), Some(end)) if end.start() < begin.end() => {
            return Err(Error::UnmatchedEnd {
                line: line_of(source, end.start()),
            });
        }
        (Some(begin), Some(end)) => (begin, end),
    };

    // The begin marker is followed by '\n' because the end marker starts a later line.
    let content_start = begin.end() + 1;
    let content = source[content_start..end.start()].to_string();

    let span_end = if source[end.end()..].starts_with('\n') {
        end.end() + 1
    } else {
        end.end()
    };

    Ok(Some(ManagedRegion {
        content,
        start_line: line_of(source, begin.start()),
        end_line: line_of(source, end.start()),
        span: begin.start()..span_end,
    }))
}

/// Checks whether `source` contains a well-formed managed region.
pub fn has_region(source: &str) -> bool {
    matches!(find_region(source), Ok(Some(_)))
}
