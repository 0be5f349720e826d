//! Parsing of a single `depsync-manifest.toml` document.
//!
//! # Example TOML
//!
//! ```toml
//! [package]
//! name = "app"
//! version = "0.1.0"
//! srcs = ["src/main.rs"]
//!
//! [workspace]
//! members = ["libs/*"]
//!
//! [dependencies]
//! serde = { version = ">=1.0,<2.0", features = ["derive"] }
//! log = ">=0.4"
//!
//! [target.'cfg(linux)'.dependencies]
//! libc = "^0.2"
//! ```
//!
//! Deserialization goes through raw types whose optional fields stay
//! `Option`; [`Manifest::parse`] fills the gaps from [`crate::defaults`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use semver::Version;
use serde::Deserialize;

use crate::defaults;
use crate::error::{Error, Result};
use crate::platform::{PlatformSet, PlatformUniverse, parse_predicate};
use crate::version::{VersionConstraint, parse_version};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    package: Option<RawPackage>,
    workspace: Option<RawWorkspace>,
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
    #[serde(default)]
    target: BTreeMap<String, RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    version: String,
    srcs: Option<Vec<String>>,
    native: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspace {
    members: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Version(String),
    Detailed(RawDependencyDetail),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawDependencyDetail {
    version: Option<String>,
    features: Option<Vec<String>>,
    default_features: Option<bool>,
    optional: Option<bool>,
    platform: Option<String>,
}

/// The `[package]` table of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub version: Version,
    pub srcs: Vec<String>,
    pub native: Vec<String>,
}

/// One declared dependency edge, with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub name: String,
    pub constraint: VersionConstraint,
    pub features: BTreeSet<String>,
    pub default_features: bool,
    /// Platforms on which the edge applies.
    pub platforms: PlatformSet,
}

/// A parsed manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    pub package: Option<PackageDecl>,
    /// Member patterns, relative to the manifest's directory.
    pub members: Vec<String>,
    pub dependencies: Vec<DependencyDecl>,
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path, universe: &PlatformUniverse) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.to_path_buf())
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&content, path, universe)
    }

    /// Parse manifest text. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path, universe: &PlatformUniverse) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content).map_err(|e| {
            let (line, column) = e
                .span()
                .map(|span| line_column(content, span.start))
                .unwrap_or((1, 1));
            Error::Parse {
                path: path.to_path_buf(),
                line,
                column,
                message: e.message().trim().to_string(),
            }
        })?;

        let invalid = |message: String| Error::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let package = raw
            .package
            .map(|p| -> Result<PackageDecl> {
                validate_name(&p.name).map_err(invalid)?;
                let version = parse_version(&p.version).map_err(invalid)?;
                Ok(PackageDecl {
                    name: p.name,
                    version,
                    srcs: defaults::or_default_list(p.srcs, defaults::SRCS),
                    native: defaults::or_default_list(p.native, defaults::NATIVE),
                })
            })
            .transpose()?;

        let members = raw
            .workspace
            .and_then(|w| w.members)
            .unwrap_or_default();

        let all = universe.all();
        let mut dependencies = Vec::new();
        for (name, dep) in raw.dependencies {
            dependencies.push(dependency_decl(name, dep, &all, universe, path)?);
        }
        for (predicate, target) in raw.target {
            let platforms =
                parse_predicate(&predicate, universe).map_err(|e| invalid(e.to_string()))?;
            for (name, dep) in target.dependencies {
                dependencies.push(dependency_decl(name, dep, &platforms, universe, path)?);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            package,
            members,
            dependencies,
        })
    }

    /// Directory holding this manifest.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}

fn dependency_decl(
    name: String,
    raw: RawDependency,
    scope: &PlatformSet,
    universe: &PlatformUniverse,
    path: &Path,
) -> Result<DependencyDecl> {
    let invalid = |message: String| Error::Invalid {
        path: path.to_path_buf(),
        message,
    };
    validate_name(&name).map_err(invalid)?;

    let detail = match raw {
        RawDependency::Version(version) => RawDependencyDetail {
            version: Some(version),
            features: None,
            default_features: None,
            optional: None,
            platform: None,
        },
        RawDependency::Detailed(detail) => detail,
    };

    if detail.optional == Some(true) {
        return Err(invalid(format!(
            "dependency '{name}' is optional, but workspace manifests have no features to enable it"
        )));
    }

    let constraint = VersionConstraint::parse(
        detail
            .version
            .as_deref()
            .unwrap_or(defaults::VERSION_CONSTRAINT),
    )
    .map_err(|e| invalid(format!("dependency '{name}': {e}")))?;
    let platforms = match detail.platform {
        Some(predicate) => {
            let narrowed = parse_predicate(&predicate, universe)
                .map_err(|e| invalid(format!("dependency '{name}': {e}")))?;
            scope.intersection(&narrowed)
        }
        None => scope.clone(),
    };

    Ok(DependencyDecl {
        name,
        constraint,
        features: detail.features.unwrap_or_default().into_iter().collect(),
        default_features: detail
            .default_features
            .unwrap_or(defaults::DEFAULT_FEATURES),
        platforms,
    })
}

/// Check a package name: a leading ASCII letter, then ASCII alphanumerics,
/// `-` or `_`.
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("package name must not be empty".to_string()),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err(format!("package name '{name}' must start with a letter"));
        }
        Some(_) => {}
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(format!(
            "package name '{name}' contains invalid character '{bad}'"
        ));
    }
    Ok(())
}

/// 1-based line and column of a byte offset.
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
