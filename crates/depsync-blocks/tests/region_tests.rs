//! Integration tests for managed region parsing and splicing.

use depsync_blocks::{
    BEGIN_MARKER, END_MARKER, Error, find_region, has_region, render_region, splice_region,
    unmanaged_text,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

const PREAMBLE: &str = "load(\"//tools:defs.bzl\", \"custom_rule\")\n\ncustom_rule(name = \"keep\")\n";
const TRAILER: &str = "\n# trailing notes, also hand-written\n";

fn file_with_region(content: &str) -> String {
    format!("{PREAMBLE}{}{TRAILER}", render_region(content))
}

#[test]
fn test_replace_preserves_surrounding_bytes() {
    let source = file_with_region("old_rule()\n");

    let updated = splice_region(&source, "new_rule()\n").unwrap();

    assert!(updated.starts_with(PREAMBLE));
    assert!(updated.ends_with(TRAILER));
    assert!(updated.contains("new_rule()"));
    assert!(!updated.contains("old_rule()"));
    assert_eq!(
        unmanaged_text(&source).unwrap(),
        unmanaged_text(&updated).unwrap()
    );
}

#[test]
fn test_splice_same_content_is_identity() {
    let source = file_with_region("rule()\n");
    assert_eq!(splice_region(&source, "rule()\n").unwrap(), source);
}

#[test]
fn test_append_to_hand_written_file() {
    let updated = splice_region(PREAMBLE, "rule()\n").unwrap();
    assert_eq!(
        updated,
        format!("{PREAMBLE}\n{BEGIN_MARKER}\nrule()\n{END_MARKER}\n")
    );
    assert_eq!(find_region(&updated).unwrap().unwrap().content, "rule()\n");
}

#[test]
fn test_append_adds_newline_when_missing() {
    let updated = splice_region("custom()", "").unwrap();
    assert_eq!(updated, format!("custom()\n\n{BEGIN_MARKER}\n{END_MARKER}\n"));
}

#[test]
fn test_empty_region_is_kept_with_markers() {
    let source = file_with_region("rule()\n");
    let updated = splice_region(&source, "").unwrap();
    let region = find_region(&updated).unwrap().unwrap();
    assert_eq!(region.content, "");
    assert!(updated.starts_with(PREAMBLE));
}

#[test]
fn test_unmanaged_text_of_generated_only_file_is_empty() {
    let source = render_region("a()\nb()\n");
    assert_eq!(unmanaged_text(&source).unwrap(), "");
}

#[test]
fn test_region_line_numbers() {
    let source = file_with_region("a()\nb()\n");
    let region = find_region(&source).unwrap().unwrap();
    assert_eq!(region.start_line, 4);
    assert_eq!(region.end_line, 7);
}

#[rstest]
#[case::unterminated(format!("{BEGIN_MARKER}\nrule()\n"), Error::Unterminated { line: 1 })]
#[case::unmatched_end(format!("x\n{END_MARKER}\n"), Error::UnmatchedEnd { line: 2 })]
#[case::duplicate_begin(
    format!("{BEGIN_MARKER}\n{BEGIN_MARKER}\n{END_MARKER}\n"),
    Error::Duplicate { marker: "begin", line: 2 }
)]
#[case::duplicate_end(
    format!("{BEGIN_MARKER}\n{END_MARKER}\n{END_MARKER}\n"),
    Error::Duplicate { marker: "end", line: 3 }
)]
fn test_malformed_markers(#[case] source: String, #[case] expected: Error) {
    assert_eq!(find_region(&source).unwrap_err(), expected);
    assert!(!has_region(&source));
    assert!(splice_region(&source, "x\n").is_err());
}

#[test]
fn test_loose_marker_spacing_is_recognised() {
    let source = "#depsync:begin\nx()\n#   depsync:end (old banner)\n";
    let region = find_region(source).unwrap().unwrap();
    assert_eq!(region.content, "x()\n");
    let updated = splice_region(source, "y()\n").unwrap();
    assert_eq!(updated, render_region("y()\n"));
}
