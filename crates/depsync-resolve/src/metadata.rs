//! Registry index entries.
//!
//! One TOML document per package name lists every published version with its
//! sources, feature table, declared dependencies and per-platform overrides.
//!
//! ```toml
//! name = "b"
//!
//! [[versions]]
//! version = "1.9.0"
//! features = { default = ["std"], std = [] }
//!
//! [[versions.dependencies]]
//! name = "c"
//! version = ">=1.0"
//!
//! [versions.platform.windows]
//! srcs = ["src/windows.rs"]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use depsync_manifest::defaults;
use depsync_manifest::{VersionConstraint, parse_version, validate_name};
use semver::Version;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndex {
    name: String,
    #[serde(default)]
    versions: Vec<RawVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersion {
    version: String,
    srcs: Option<Vec<String>>,
    native: Option<Vec<String>>,
    #[serde(default)]
    features: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    platform: BTreeMap<String, RawOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawDependency {
    name: String,
    version: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    features: Vec<String>,
    default_features: Option<bool>,
    platform: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOverride {
    #[serde(default)]
    srcs: Vec<String>,
    #[serde(default)]
    native: Vec<String>,
}

/// One entry of a feature's activation list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureEntry {
    /// `name`: another feature of the same package.
    Feature(String),
    /// `dep:name`: activates an optional dependency.
    Dependency(String),
    /// `name/feature`: enables a feature on a dependency.
    DependencyFeature { dependency: String, feature: String },
}

impl FeatureEntry {
    pub fn parse(entry: &str) -> Result<Self, String> {
        if let Some(dep) = entry.strip_prefix("dep:") {
            validate_name(dep)?;
            return Ok(Self::Dependency(dep.to_string()));
        }
        if let Some((dependency, feature)) = entry.split_once('/') {
            validate_name(dependency)?;
            if feature.is_empty() {
                return Err(format!("feature entry '{entry}' names no feature"));
            }
            return Ok(Self::DependencyFeature {
                dependency: dependency.to_string(),
                feature: feature.to_string(),
            });
        }
        if entry.is_empty() {
            return Err("empty feature entry".to_string());
        }
        Ok(Self::Feature(entry.to_string()))
    }
}

/// A dependency declared by a published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    pub constraint: VersionConstraint,
    pub optional: bool,
    pub features: BTreeSet<String>,
    pub default_features: bool,
    /// Raw platform predicate; evaluated against the platform universe
    /// during resolution.
    pub platform: Option<String>,
}

/// Extra sources a version needs on one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformOverride {
    pub srcs: Vec<String>,
    pub native: Vec<String>,
}

impl PlatformOverride {
    pub fn is_empty(&self) -> bool {
        self.srcs.is_empty() && self.native.is_empty()
    }
}

/// A single published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMetadata {
    pub version: Version,
    /// Version text exactly as published, used for lexical tie-breaks.
    pub raw_version: String,
    pub srcs: Vec<String>,
    pub native: Vec<String>,
    pub features: BTreeMap<String, Vec<FeatureEntry>>,
    pub dependencies: Vec<DependencySpec>,
    pub platform: BTreeMap<String, PlatformOverride>,
}

impl VersionMetadata {
    pub fn dependency(&self, name: &str) -> Option<&DependencySpec> {
        self.dependencies.iter().find(|d| d.name == name)
    }
}

/// Everything the registry knows about one package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub versions: Vec<VersionMetadata>,
}

impl PackageMetadata {
    /// Parse an index document.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let raw: RawIndex = toml::from_str(content).map_err(|e| e.message().trim().to_string())?;
        validate_name(&raw.name)?;

        let mut versions = Vec::with_capacity(raw.versions.len());
        for version in raw.versions {
            versions.push(convert_version(version)?);
        }

        Ok(Self {
            name: raw.name,
            versions,
        })
    }

    pub fn version(&self, version: &Version) -> Option<&VersionMetadata> {
        self.versions.iter().find(|v| &v.version == version)
    }
}

fn convert_version(raw: RawVersion) -> Result<VersionMetadata, String> {
    let version = parse_version(&raw.version)?;

    let mut features = BTreeMap::new();
    for (name, entries) in raw.features {
        let entries = entries
            .iter()
            .map(|e| FeatureEntry::parse(e))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("version {}: feature '{name}': {e}", raw.version))?;
        features.insert(name, entries);
    }

    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for dep in raw.dependencies {
        validate_name(&dep.name)?;
        let constraint = VersionConstraint::parse(
            dep.version.as_deref().unwrap_or(defaults::VERSION_CONSTRAINT),
        )
        .map_err(|e| format!("version {}: {e}", raw.version))?;
        dependencies.push(DependencySpec {
            name: dep.name,
            constraint,
            optional: dep.optional,
            features: dep.features.into_iter().collect(),
            default_features: dep.default_features.unwrap_or(defaults::DEFAULT_FEATURES),
            platform: dep.platform,
        });
    }

    let platform = raw
        .platform
        .into_iter()
        .map(|(name, o)| {
            (
                name,
                PlatformOverride {
                    srcs: o.srcs,
                    native: o.native,
                },
            )
        })
        .collect();

    Ok(VersionMetadata {
        version,
        raw_version: raw.version,
        srcs: raw
            .srcs
            .unwrap_or_else(|| defaults::SRCS.iter().map(|s| (*s).to_string()).collect()),
        native: raw.native.unwrap_or_default(),
        features,
        dependencies,
        platform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_index() {
        let meta = PackageMetadata::from_toml(
            r#"
name = "b"

[[versions]]
version = "1.9.0"
features = { default = ["std"], std = [], derive = ["dep:b-derive", "c/extra"] }

[[versions.dependencies]]
name = "b-derive"
version = ">=1.0"
optional = true
platform = "cfg(any(linux, macos))"

[[versions.dependencies]]
name = "c"

[versions.platform.windows]
srcs = ["src/windows.rs"]
native = ["shim/win.c"]

[[versions]]
version = "1.0"
"#,
        )
        .unwrap();

        assert_eq!(meta.name, "b");
        assert_eq!(meta.versions.len(), 2);

        let v19 = &meta.versions[0];
        assert_eq!(v19.srcs, vec!["src/lib.rs".to_string()]);
        assert_eq!(
            v19.features["derive"],
            vec![
                FeatureEntry::Dependency("b-derive".to_string()),
                FeatureEntry::DependencyFeature {
                    dependency: "c".to_string(),
                    feature: "extra".to_string()
                },
            ]
        );
        assert!(v19.dependency("b-derive").unwrap().optional);
        assert!(v19.dependency("c").unwrap().constraint.is_any());
        assert!(v19.dependency("c").unwrap().default_features);
        assert_eq!(v19.platform["windows"].native, vec!["shim/win.c".to_string()]);

        assert_eq!(meta.versions[1].version, Version::new(1, 0, 0));
        assert_eq!(meta.versions[1].raw_version, "1.0");
    }

    #[rstest]
    #[case("std", FeatureEntry::Feature("std".into()))]
    #[case("dep:serde", FeatureEntry::Dependency("serde".into()))]
    #[case("serde/derive", FeatureEntry::DependencyFeature { dependency: "serde".into(), feature: "derive".into() })]
    fn test_feature_entries(#[case] text: &str, #[case] expected: FeatureEntry) {
        assert_eq!(FeatureEntry::parse(text).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("dep:")]
    #[case("serde/")]
    fn test_bad_feature_entries(#[case] text: &str) {
        assert!(FeatureEntry::parse(text).is_err());
    }

    #[test]
    fn test_rejects_bad_version() {
        let err = PackageMetadata::from_toml("name = \"x\"\n[[versions]]\nversion = \"latest\"\n")
            .unwrap_err();
        assert!(err.contains("latest"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(PackageMetadata::from_toml("name = \"x\"\nowner = \"y\"\n").is_err());
    }
}
