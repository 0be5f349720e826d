//! Version constraint parsing and checking.
//!
//! A constraint is a comma-separated list of specifiers that must all hold:
//!
//! - comparisons: `>=1.0`, `>1.0`, `<=1.0`, `<2.0`, `=1.2.3`, `==1.2.3`, `!=1.1.0`
//! - caret and tilde ranges: `^0.2`, `~1.4.1`
//! - a bare version meaning exact match: `1.2.3`
//! - the wildcard `*` matching everything
//!
//! Missing minor/patch components default to 0, so `>=1.5` means `>=1.5.0`.
//!
//! Comparisons follow semver precedence with no special case for
//! pre-releases: `2.0.0-rc.1` sorts below `2.0.0`, so `<2.0` accepts it.
//! The resolver only falls back to a pre-release when no stable release
//! satisfies every constraint.
//!
//! # Examples
//!
//! ```
//! use depsync_manifest::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse(">=1.0,<2.0").unwrap();
//! assert!(constraint.satisfies("1.9.0"));
//! assert!(!constraint.satisfies("2.0.0"));
//!
//! let caret = VersionConstraint::parse("^0.2").unwrap();
//! assert!(caret.satisfies("0.2.9"));
//! assert!(!caret.satisfies("0.3.0"));
//! ```

use semver::Version;

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `=` or `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn new(op: CompareOp, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// An empty specifier list (from `*`) matches every version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// The constraint that matches every version.
    pub fn any() -> Self {
        Self {
            specifiers: Vec::new(),
            raw: "*".to_string(),
        }
    }

    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.trim().to_string();
        let mut specifiers = Vec::new();
        let mut saw_wildcard = false;

        for part in raw.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            if part == "*" {
                saw_wildcard = true;
                continue;
            }
            specifiers.extend(parse_specifier(part)?);
        }

        if specifiers.is_empty() && !saw_wildcard {
            return Err(Error::InvalidConstraint {
                constraint: raw,
                reason: "empty constraint".to_string(),
            });
        }

        Ok(Self { specifiers, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match parse_partial(version) {
            Ok((parsed, _)) => self.satisfies_version(&parsed),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse one specifier. Caret and tilde expand into a lower and upper bound.
fn parse_specifier(s: &str) -> Result<Vec<Specifier>> {
    let invalid = |reason: String| Error::InvalidConstraint {
        constraint: s.to_string(),
        reason,
    };

    if let Some(rest) = s.strip_prefix('^') {
        let (version, components) = parse_partial(rest).map_err(invalid)?;
        let upper = caret_upper(&version, components)
            .ok_or_else(|| invalid(format!("no version above '{rest}'")))?;
        return Ok(vec![
            Specifier::new(CompareOp::Gte, version),
            Specifier::new(CompareOp::Lt, upper),
        ]);
    }
    if let Some(rest) = s.strip_prefix('~') {
        let (version, components) = parse_partial(rest).map_err(invalid)?;
        let upper = if components == 1 {
            version.major.checked_add(1).map(|major| Version::new(major, 0, 0))
        } else {
            version
                .minor
                .checked_add(1)
                .map(|minor| Version::new(version.major, minor, 0))
        }
        .ok_or_else(|| invalid(format!("no version above '{rest}'")))?;
        return Ok(vec![
            Specifier::new(CompareOp::Gte, version),
            Specifier::new(CompareOp::Lt, upper),
        ]);
    }

    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('=') {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version implies ==
        (CompareOp::Eq, s)
    };

    let (version, _) = parse_partial(version_str).map_err(invalid)?;
    Ok(vec![Specifier::new(op, version)])
}

/// Exclusive upper bound of a caret range, `None` when it would overflow.
fn caret_upper(version: &Version, components: usize) -> Option<Version> {
    if version.major > 0 || components == 1 {
        Some(Version::new(version.major.checked_add(1)?, 0, 0))
    } else if version.minor > 0 || components == 2 {
        Some(Version::new(0, version.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, version.patch.checked_add(1)?))
    }
}

/// Parse a possibly partial version, reporting how many numeric components
/// were written.
///
/// - `"1.5"` -> `1.5.0`, 2 components
/// - `"2"` -> `2.0.0`, 1 component
/// - `"1.2.3-rc.1"` -> itself, 3 components
pub(crate) fn parse_partial(s: &str) -> std::result::Result<(Version, usize), String> {
    let s = s.trim();

    if let Ok(v) = Version::parse(s) {
        return Ok((v, 3));
    }

    let components = s.split('.').count();
    let padded = match components {
        1 => format!("{s}.0.0"),
        2 => format!("{s}.0"),
        _ => s.to_string(),
    };
    Version::parse(&padded)
        .map(|v| (v, components))
        .map_err(|e| format!("invalid version '{s}': {e}"))
}

/// Parse a package version, accepting the same partial forms as constraints.
pub fn parse_version(s: &str) -> std::result::Result<Version, String> {
    parse_partial(s).map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_compound() {
        let c = VersionConstraint::parse(">=1.0,<2.0").unwrap();
        assert_eq!(c.specifiers.len(), 2);
        assert_eq!(c.as_str(), ">=1.0,<2.0");
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let c = VersionConstraint::parse("*").unwrap();
        assert!(c.is_any());
        assert!(c.satisfies("0.0.1"));
        assert!(c.satisfies("99.0.0-alpha"));
        assert_eq!(c, VersionConstraint::any());
    }

    #[test]
    fn test_parse_empty_rejected() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse(" , ").is_err());
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(VersionConstraint::parse(">=abc").is_err());
        assert!(VersionConstraint::parse("^x.y").is_err());
    }

    #[rstest]
    #[case(">=1.5", "1.5.0", true)]
    #[case(">=1.5", "1.4.9", false)]
    #[case(">1.5", "1.5.0", false)]
    #[case("<=1.5", "1.5.0", true)]
    #[case("<2", "1.99.0", true)]
    #[case("<2", "2.0.0", false)]
    #[case("=1.2.3", "1.2.3", true)]
    #[case("==1.2.3", "1.2.4", false)]
    #[case("1.2.3", "1.2.3", true)]
    #[case("!=1.1.0", "1.1.0", false)]
    #[case("^1.2.3", "1.9.0", true)]
    #[case("^1.2.3", "2.0.0", false)]
    #[case("^1.2.3", "1.2.2", false)]
    #[case("^0.2.3", "0.2.9", true)]
    #[case("^0.2.3", "0.3.0", false)]
    #[case("^0.0.3", "0.0.4", false)]
    #[case("^0", "0.9.0", true)]
    #[case("^0", "1.0.0", false)]
    #[case("^0.0", "0.0.9", true)]
    #[case("^0.0", "0.1.0", false)]
    #[case("~1.4.1", "1.4.9", true)]
    #[case("~1.4.1", "1.5.0", false)]
    #[case("~1", "1.9.0", true)]
    #[case("~1", "2.0.0", false)]
    #[case("<2.0", "2.0.0-rc.1", true)]
    #[case(">=1.0", "1.0.0-beta", false)]
    fn test_satisfies(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        let c = VersionConstraint::parse(constraint).unwrap();
        assert_eq!(c.satisfies(version), expected, "{constraint} vs {version}");
    }

    #[rstest]
    #[case("^18446744073709551615")]
    #[case("^0.18446744073709551615")]
    #[case("^0.0.18446744073709551615")]
    #[case("~18446744073709551615")]
    #[case("~1.18446744073709551615")]
    fn test_unbounded_ranges_rejected(#[case] constraint: &str) {
        let err = VersionConstraint::parse(constraint).unwrap_err();
        assert!(
            matches!(err, Error::InvalidConstraint { ref reason, .. } if reason.contains("no version above")),
            "{constraint}: {err}"
        );
    }

    #[test]
    fn test_satisfies_invalid_version_returns_false() {
        let c = VersionConstraint::parse(">=1.0").unwrap();
        assert!(!c.satisfies("not-a-version"));
    }

    #[test]
    fn test_partial_components() {
        assert_eq!(parse_partial("1.5").unwrap(), (Version::new(1, 5, 0), 2));
        assert_eq!(parse_partial("2").unwrap(), (Version::new(2, 0, 0), 1));
        assert_eq!(parse_partial(" 1.2.3 ").unwrap(), (Version::new(1, 2, 3), 3));
    }

    #[test]
    fn test_display_round_trips_raw_text() {
        let c: VersionConstraint = ">=1.0, <2.0".parse().unwrap();
        assert_eq!(format!("{c}"), ">=1.0, <2.0");
    }
}
