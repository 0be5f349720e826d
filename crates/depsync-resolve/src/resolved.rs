//! The frozen output of resolution.
//!
//! A [`ResolvedGraph`] holds exactly one [`ResolvedPackage`] per package name
//! and only hands out shared references, so everything downstream of the
//! resolver reads the same snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use depsync_manifest::PlatformSet;
use semver::Version;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::metadata::PlatformOverride;

/// Where a package's sources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// Declared by a workspace manifest in `dir` (relative to the root).
    Workspace { dir: PathBuf },
    /// Published in the registry.
    Registry,
}

/// A dependency edge of a resolved package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEdge {
    pub name: String,
    /// Platforms on which the edge applies.
    pub platforms: PlatformSet,
}

/// One package of the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    name: String,
    version: Version,
    source: PackageSource,
    features: BTreeSet<String>,
    platforms: PlatformSet,
    dependencies: Vec<ResolvedEdge>,
    srcs: Vec<String>,
    native: Vec<String>,
    overrides: BTreeMap<String, PlatformOverride>,
}

impl ResolvedPackage {
    pub fn new(name: impl Into<String>, version: Version, source: PackageSource) -> Self {
        Self {
            name: name.into(),
            version,
            source,
            features: BTreeSet::new(),
            platforms: PlatformSet::empty(),
            dependencies: Vec::new(),
            srcs: Vec::new(),
            native: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platforms(mut self, platforms: PlatformSet) -> Self {
        self.platforms = platforms;
        self
    }

    /// Add an edge. Repeated edges to the same package merge their platforms.
    pub fn with_dependency(mut self, name: impl Into<String>, platforms: PlatformSet) -> Self {
        let name = name.into();
        match self.dependencies.iter_mut().find(|e| e.name == name) {
            Some(edge) => edge.platforms = edge.platforms.union(&platforms),
            None => {
                self.dependencies.push(ResolvedEdge { name, platforms });
                self.dependencies.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        self
    }

    pub fn with_sources(mut self, srcs: Vec<String>, native: Vec<String>) -> Self {
        self.srcs = srcs;
        self.native = native;
        self
    }

    pub fn with_override(mut self, platform: impl Into<String>, extra: PlatformOverride) -> Self {
        self.overrides.insert(platform.into(), extra);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn source(&self) -> &PackageSource {
        &self.source
    }

    pub fn is_workspace(&self) -> bool {
        matches!(self.source, PackageSource::Workspace { .. })
    }

    /// Workspace directory, if this is a workspace package.
    pub fn workspace_dir(&self) -> Option<&Path> {
        match &self.source {
            PackageSource::Workspace { dir } => Some(dir),
            PackageSource::Registry => None,
        }
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    /// Platforms on which some requester needs this package.
    pub fn platforms(&self) -> &PlatformSet {
        &self.platforms
    }

    /// Edges sorted by dependency name.
    pub fn dependencies(&self) -> &[ResolvedEdge] {
        &self.dependencies
    }

    pub fn srcs(&self) -> &[String] {
        &self.srcs
    }

    pub fn native(&self) -> &[String] {
        &self.native
    }

    /// Per-platform extra sources, limited to platforms this package is
    /// needed on and with empty overrides dropped.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &PlatformOverride)> {
        self.overrides
            .iter()
            .filter(|(platform, extra)| self.platforms.contains(platform) && !extra.is_empty())
            .map(|(platform, extra)| (platform.as_str(), extra))
    }
}

/// The frozen, acyclic resolution result.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    packages: BTreeMap<String, ResolvedPackage>,
    graph: DependencyGraph,
    order: Vec<String>,
}

impl ResolvedGraph {
    /// Freeze a set of packages.
    ///
    /// Fails with [`Error::Cycle`] when the edges loop and with
    /// [`Error::NotFound`] when an edge names a package not in the set.
    pub fn from_packages(packages: impl IntoIterator<Item = ResolvedPackage>) -> Result<Self> {
        let packages: BTreeMap<String, ResolvedPackage> = packages
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        let mut graph = DependencyGraph::new();
        for package in packages.values() {
            graph.add_node(package.name.clone());
            for edge in &package.dependencies {
                if !packages.contains_key(&edge.name) {
                    return Err(Error::NotFound {
                        package: edge.name.clone(),
                    });
                }
                graph.add_edge(&package.name, &edge.name);
            }
        }

        let order = graph
            .topological_order()
            .map_err(|path| Error::Cycle { path })?
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            packages,
            graph,
            order,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Package names, dependencies before dependents.
    pub fn build_order(&self) -> &[String] {
        &self.order
    }

    /// Every package `name` transitively depends on, plus `name` itself.
    pub fn reachable_from(&self, name: &str) -> BTreeSet<String> {
        if !self.contains(name) {
            return BTreeSet::new();
        }
        self.graph.reachable_from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> PlatformSet {
        ["linux", "macos", "windows"].into_iter().collect()
    }

    fn registry(name: &str) -> ResolvedPackage {
        ResolvedPackage::new(name, Version::new(1, 0, 0), PackageSource::Registry)
            .with_platforms(all())
    }

    #[test]
    fn test_repeated_edges_merge() {
        let package = registry("a")
            .with_dependency("c", PlatformSet::single("linux"))
            .with_dependency("b", all())
            .with_dependency("c", PlatformSet::single("macos"));

        let names: Vec<&str> = package.dependencies().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(
            package.dependencies()[1].platforms,
            ["linux", "macos"].into_iter().collect()
        );
    }

    #[test]
    fn test_overrides_limited_to_needed_platforms() {
        let package = registry("a")
            .with_platforms(PlatformSet::single("linux"))
            .with_override(
                "linux",
                PlatformOverride {
                    srcs: vec!["src/linux.rs".into()],
                    native: vec![],
                },
            )
            .with_override(
                "windows",
                PlatformOverride {
                    srcs: vec!["src/windows.rs".into()],
                    native: vec![],
                },
            )
            .with_override("macos", PlatformOverride::default());

        let platforms: Vec<&str> = package.overrides().map(|(p, _)| p).collect();
        assert_eq!(platforms, vec!["linux"]);
    }

    #[test]
    fn test_graph_rejects_cycles() {
        let err = ResolvedGraph::from_packages([
            registry("a").with_dependency("b", all()),
            registry("b").with_dependency("a", all()),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_graph_rejects_dangling_edges() {
        let err = ResolvedGraph::from_packages([registry("a").with_dependency("ghost", all())])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref package } if package == "ghost"));
    }

    #[test]
    fn test_order_and_reachability() {
        let graph = ResolvedGraph::from_packages([
            registry("app").with_dependency("log", all()),
            registry("log"),
            registry("other"),
        ])
        .unwrap();

        assert_eq!(graph.build_order(), ["log", "app", "other"]);
        assert_eq!(
            graph.reachable_from("app"),
            BTreeSet::from(["app".to_string(), "log".to_string()])
        );
        assert!(graph.reachable_from("missing").is_empty());
    }
}
