//! The default table for optional manifest fields.
//!
//! Raw documents keep optional fields as `Option`s; conversion into
//! [`Manifest`](crate::Manifest) fills every gap from this table and nowhere
//! else.
//!
//! | field                          | default        |
//! |--------------------------------|----------------|
//! | dependency `version`           | `*`            |
//! | dependency `features`          | `[]`           |
//! | dependency `default-features`  | `true`         |
//! | dependency `platform`          | every platform |
//! | package `srcs`                 | `["src/lib.rs"]` |
//! | package `native`               | `[]`           |
//! | workspace `members`            | `[]`           |

/// Version constraint applied when a dependency names none.
pub const VERSION_CONSTRAINT: &str = "*";

/// Whether a dependency keeps its default features unless told otherwise.
pub const DEFAULT_FEATURES: bool = true;

/// Library sources assumed for a package that lists none.
pub const SRCS: &[&str] = &["src/lib.rs"];

/// Native shim sources assumed for a package that lists none.
pub const NATIVE: &[&str] = &[];

pub(crate) fn or_default_list(value: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    value.unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
}
