//! Fixed-point version resolution.
//!
//! Each round rebuilds the full request set from the workspace manifests and
//! the dependencies of the current choices, groups requests by package name,
//! and picks one version per name. Rounds repeat until the choice map stops
//! changing. Choosing a version reveals that version's own dependencies, so
//! the request set grows (or shrinks) until it is self-consistent.
//!
//! Version policy among the candidates satisfying every constraint: stable
//! releases before pre-releases, then the highest semantic version, then the
//! lexically greatest version text.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use depsync_manifest::{
    LoadedWorkspace, PackageRequest, PlatformSet, PlatformUniverse, RequestOrigin,
    VersionConstraint, WorkspacePackage, parse_predicate,
};
use semver::Version;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::metadata::{FeatureEntry, PackageMetadata, VersionMetadata};
use crate::resolved::{PackageSource, ResolvedGraph, ResolvedPackage};

/// Rounds allowed before resolution is declared divergent.
pub const MAX_ITERATIONS: usize = 64;

/// An outgoing edge of a chosen version, before platform narrowing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeSpec {
    name: String,
    constraint: VersionConstraint,
    features: BTreeSet<String>,
    default_features: bool,
    /// Platforms the edge's own predicate allows.
    predicate: PlatformSet,
}

/// The decision for one package name in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Choice {
    version: Version,
    features: BTreeSet<String>,
    platforms: PlatformSet,
    edges: Vec<EdgeSpec>,
}

/// Resolves a loaded workspace against a registry.
pub struct Resolver<'a> {
    fetcher: &'a Fetcher,
    universe: &'a PlatformUniverse,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a Fetcher, universe: &'a PlatformUniverse) -> Self {
        Self { fetcher, universe }
    }

    pub async fn resolve(&self, workspace: &LoadedWorkspace) -> Result<ResolvedGraph> {
        let mut choices: BTreeMap<String, Choice> = BTreeMap::new();
        let mut metadata: BTreeMap<String, Arc<PackageMetadata>> = BTreeMap::new();

        for iteration in 1..=MAX_ITERATIONS {
            let requests = self.collect_requests(workspace, &choices);

            let mut groups: BTreeMap<&str, Vec<&PackageRequest>> = workspace
                .packages
                .keys()
                .map(|name| (name.as_str(), Vec::new()))
                .collect();
            for request in &requests {
                groups.entry(request.name.as_str()).or_default().push(request);
            }

            let registry_names: BTreeSet<String> = groups
                .keys()
                .filter(|name| !workspace.packages.contains_key(**name))
                .map(|name| (*name).to_string())
                .collect();
            metadata.extend(self.fetcher.fetch_all(&registry_names).await?);

            let mut next = BTreeMap::new();
            for (name, group) in &groups {
                let choice = match workspace.packages.get(*name) {
                    Some(package) => self.choose_workspace(package, group)?,
                    None => {
                        let meta = metadata.get(*name).ok_or_else(|| Error::NotFound {
                            package: (*name).to_string(),
                        })?;
                        self.choose_registry(meta, group)?
                    }
                };
                next.insert((*name).to_string(), choice);
            }

            debug!(iteration, requests = requests.len(), packages = next.len(), "resolution round");

            if next == choices {
                info!(iterations = iteration, packages = next.len(), "resolution converged");
                return self.freeze(workspace, &metadata, next);
            }
            choices = next;
        }

        Err(Error::Diverged {
            iterations: MAX_ITERATIONS,
        })
    }

    /// Workspace requests plus the dependencies of every chosen registry
    /// package, narrowed to the platforms the requester is needed on.
    fn collect_requests(
        &self,
        workspace: &LoadedWorkspace,
        choices: &BTreeMap<String, Choice>,
    ) -> Vec<PackageRequest> {
        let mut requests: Vec<PackageRequest> = workspace
            .requests
            .iter()
            .filter(|r| !r.platforms.is_empty())
            .cloned()
            .collect();

        for (name, choice) in choices {
            if workspace.packages.contains_key(name) {
                continue;
            }
            for edge in &choice.edges {
                let platforms = choice.platforms.intersection(&edge.predicate);
                if platforms.is_empty() {
                    continue;
                }
                requests.push(PackageRequest {
                    name: edge.name.clone(),
                    constraint: edge.constraint.clone(),
                    features: edge.features.clone(),
                    default_features: edge.default_features,
                    platforms,
                    origin: RequestOrigin::Package {
                        name: name.clone(),
                        version: choice.version.clone(),
                    },
                });
            }
        }

        requests
    }

    fn choose_workspace(
        &self,
        package: &WorkspacePackage,
        group: &[&PackageRequest],
    ) -> Result<Choice> {
        if group
            .iter()
            .any(|r| !r.constraint.satisfies_version(&package.version))
        {
            return Err(conflict(&package.name, group, vec![package.version.to_string()]));
        }
        if let Some(feature) = group.iter().flat_map(|r| r.features.iter()).next() {
            return Err(Error::UnknownFeature {
                package: package.name.clone(),
                version: package.version.to_string(),
                feature: feature.clone(),
            });
        }

        let edges = package
            .dependencies
            .iter()
            .map(|dep| EdgeSpec {
                name: dep.name.clone(),
                constraint: dep.constraint.clone(),
                features: dep.features.clone(),
                default_features: dep.default_features,
                predicate: dep.platforms.clone(),
            })
            .collect();

        Ok(Choice {
            version: package.version.clone(),
            features: BTreeSet::new(),
            platforms: self.universe.all(),
            edges,
        })
    }

    fn choose_registry(&self, meta: &PackageMetadata, group: &[&PackageRequest]) -> Result<Choice> {
        let candidates: Vec<&VersionMetadata> = meta
            .versions
            .iter()
            .filter(|v| group.iter().all(|r| r.constraint.satisfies_version(&v.version)))
            .collect();

        let stable: Vec<&VersionMetadata> = candidates
            .iter()
            .copied()
            .filter(|v| v.version.pre.is_empty())
            .collect();
        let pool = if stable.is_empty() { candidates } else { stable };

        let Some(chosen) = pool.into_iter().max_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.raw_version.cmp(&b.raw_version))
        }) else {
            let mut available: Vec<&VersionMetadata> = meta.versions.iter().collect();
            available.sort_by(|a, b| a.version.cmp(&b.version));
            return Err(conflict(
                &meta.name,
                group,
                available.iter().map(|v| v.raw_version.clone()).collect(),
            ));
        };

        for platform in chosen.platform.keys() {
            if !self.universe.contains(platform) {
                return Err(invalid(
                    meta,
                    format!("version {} overrides unknown platform '{platform}'", chosen.raw_version),
                ));
            }
        }

        let mut requested: BTreeSet<String> = group
            .iter()
            .flat_map(|r| r.features.iter().cloned())
            .collect();
        if group.iter().any(|r| r.default_features) && chosen.features.contains_key("default") {
            requested.insert("default".to_string());
        }
        let activation = expand_features(meta, chosen, requested)?;

        let mut edges = Vec::new();
        for spec in &chosen.dependencies {
            if spec.optional && !activation.dependencies.contains(&spec.name) {
                continue;
            }
            let predicate = match &spec.platform {
                Some(predicate) => parse_predicate(predicate, self.universe)
                    .map_err(|e| invalid(meta, e.to_string()))?,
                None => self.universe.all(),
            };
            let mut features = spec.features.clone();
            if let Some(extra) = activation.dependency_features.get(&spec.name) {
                features.extend(extra.iter().cloned());
            }
            edges.push(EdgeSpec {
                name: spec.name.clone(),
                constraint: spec.constraint.clone(),
                features,
                default_features: spec.default_features,
                predicate,
            });
        }

        let platforms = group
            .iter()
            .fold(PlatformSet::empty(), |acc, r| acc.union(&r.platforms));

        Ok(Choice {
            version: chosen.version.clone(),
            features: activation.features,
            platforms,
            edges,
        })
    }

    fn freeze(
        &self,
        workspace: &LoadedWorkspace,
        metadata: &BTreeMap<String, Arc<PackageMetadata>>,
        choices: BTreeMap<String, Choice>,
    ) -> Result<ResolvedGraph> {
        let mut packages = Vec::with_capacity(choices.len());

        for (name, choice) in choices {
            let mut package = match workspace.packages.get(&name) {
                Some(ws) => ResolvedPackage::new(
                    &name,
                    choice.version.clone(),
                    PackageSource::Workspace { dir: ws.dir.clone() },
                )
                .with_sources(ws.srcs.clone(), ws.native.clone()),
                None => {
                    let version = metadata
                        .get(&name)
                        .and_then(|m| m.version(&choice.version))
                        .ok_or_else(|| Error::NotFound {
                            package: name.clone(),
                        })?;
                    let mut package =
                        ResolvedPackage::new(&name, choice.version.clone(), PackageSource::Registry)
                            .with_sources(version.srcs.clone(), version.native.clone());
                    for (platform, extra) in &version.platform {
                        package = package.with_override(platform, extra.clone());
                    }
                    package
                }
            };

            package = package
                .with_features(choice.features.iter().cloned())
                .with_platforms(choice.platforms.clone());
            for edge in &choice.edges {
                let platforms = choice.platforms.intersection(&edge.predicate);
                if !platforms.is_empty() {
                    package = package.with_dependency(&edge.name, platforms);
                }
            }
            packages.push(package);
        }

        ResolvedGraph::from_packages(packages)
    }
}

/// Features and optional dependencies switched on for a chosen version.
#[derive(Debug, Default)]
struct Activation {
    features: BTreeSet<String>,
    dependencies: BTreeSet<String>,
    dependency_features: BTreeMap<String, BTreeSet<String>>,
}

/// Expand requested features through the version's feature table.
///
/// A name that is not in the table but names an optional dependency
/// activates that dependency.
fn expand_features(
    meta: &PackageMetadata,
    version: &VersionMetadata,
    requested: BTreeSet<String>,
) -> Result<Activation> {
    let mut activation = Activation::default();
    let mut pending: Vec<String> = requested.into_iter().rev().collect();

    while let Some(feature) = pending.pop() {
        if !activation.features.insert(feature.clone()) {
            continue;
        }

        let Some(entries) = version.features.get(&feature) else {
            match version.dependency(&feature) {
                Some(dep) if dep.optional => {
                    activation.dependencies.insert(feature);
                    continue;
                }
                _ => {
                    return Err(Error::UnknownFeature {
                        package: meta.name.clone(),
                        version: version.raw_version.clone(),
                        feature,
                    });
                }
            }
        };

        for entry in entries {
            match entry {
                FeatureEntry::Feature(name) => pending.push(name.clone()),
                FeatureEntry::Dependency(dep) => {
                    require_dependency(meta, version, dep)?;
                    activation.dependencies.insert(dep.clone());
                }
                FeatureEntry::DependencyFeature { dependency, feature } => {
                    require_dependency(meta, version, dependency)?;
                    activation.dependencies.insert(dependency.clone());
                    activation
                        .dependency_features
                        .entry(dependency.clone())
                        .or_default()
                        .insert(feature.clone());
                }
            }
        }
    }

    Ok(activation)
}

fn require_dependency(meta: &PackageMetadata, version: &VersionMetadata, dep: &str) -> Result<()> {
    if version.dependency(dep).is_some() {
        Ok(())
    } else {
        Err(invalid(
            meta,
            format!(
                "version {} enables undeclared dependency '{dep}'",
                version.raw_version
            ),
        ))
    }
}

fn conflict(package: &str, group: &[&PackageRequest], available: Vec<String>) -> Error {
    Error::Conflict {
        package: package.to_string(),
        constraints: group.iter().map(|r| r.to_string()).collect(),
        available,
    }
}

fn invalid(meta: &PackageMetadata, message: String) -> Error {
    Error::InvalidMetadata {
        package: meta.name.clone(),
        message,
    }
}
