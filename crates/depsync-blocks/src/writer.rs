//! Managed region writing.
//!
//! Provides functions to render a region and splice it into existing file
//! content without touching anything outside the markers.

use crate::error::Result;
use crate::parser::{BEGIN_MARKER, END_MARKER, find_region};

/// Renders a complete region: markers plus content.
///
/// Content is normalised to end with a newline so the closing marker
/// always starts its own line.
pub fn render_region(content: &str) -> String {
    let mut out = String::with_capacity(BEGIN_MARKER.len() + content.len() + END_MARKER.len() + 3);
    out.push_str(BEGIN_MARKER);
    out.push('\n');
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// Replaces the managed region in `source` with `content`, or appends a
/// new region when the file has none.
///
/// Bytes before and after an existing region are copied verbatim. When
/// appending to non-empty hand-written content, a blank separator line is
/// added after it.
///
/// # Errors
/// Fails when the existing markers are malformed.
///
/// # Example
/// ```
/// use depsync_blocks::splice_region;
///
/// let updated = splice_region("# hand-written\n", "rule()\n").unwrap();
/// assert!(updated.starts_with("# hand-written\n\n# depsync:begin"));
/// assert!(updated.contains("rule()\n# depsync:end\n"));
/// ```
pub fn splice_region(source: &str, content: &str) -> Result<String> {
    let rendered = render_region(content);

    match find_region(source)? {
        Some(region) => {
            let mut out = String::with_capacity(source.len() + rendered.len());
            out.push_str(&source[..region.span.start]);
            out.push_str(&rendered);
            out.push_str(&source[region.span.end..]);
            Ok(out)
        }
        None if source.is_empty() => Ok(rendered),
        None => {
            let mut out = String::with_capacity(source.len() + rendered.len() + 2);
            out.push_str(source);
            if !source.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&rendered);
            Ok(out)
        }
    }
}

/// Returns `source` with the managed region (markers included) cut out.
///
/// # Errors
/// Fails when the existing markers are malformed.
pub fn unmanaged_text(source: &str) -> Result<String> {
    Ok(match find_region(source)? {
        Some(region) => {
            let mut out = String::with_capacity(source.len());
            out.push_str(&source[..region.span.start]);
            out.push_str(&source[region.span.end..]);
            out
        }
        None => source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_region() {
        assert_eq!(
            render_region(""),
            format!("{BEGIN_MARKER}\n{END_MARKER}\n")
        );
    }

    #[test]
    fn test_render_adds_missing_newline() {
        assert_eq!(
            render_region("x"),
            format!("{BEGIN_MARKER}\nx\n{END_MARKER}\n")
        );
    }

    #[test]
    fn test_splice_into_empty_file() {
        assert_eq!(splice_region("", "x\n").unwrap(), render_region("x\n"));
    }

    #[test]
    fn test_unmanaged_text_without_region() {
        assert_eq!(unmanaged_text("abc").unwrap(), "abc");
    }
}
