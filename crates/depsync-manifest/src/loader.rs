//! Manifest tree traversal.
//!
//! Starting from the root manifest, every `[workspace] members` pattern is
//! expanded to member directories holding a manifest, level by level.
//! Manifests discovered at the same depth are independent and are read and
//! parsed in parallel; the results are merged in sorted path order so the
//! loaded workspace never depends on scheduling.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use semver::Version;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::{DependencyDecl, Manifest};
use crate::platform::PlatformUniverse;
use crate::request::{PackageRequest, RequestOrigin};

/// A package declared by a workspace manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePackage {
    pub name: String,
    pub version: Version,
    /// Package directory relative to the workspace root (empty for the root).
    pub dir: PathBuf,
    pub manifest: PathBuf,
    pub srcs: Vec<String>,
    pub native: Vec<String>,
    pub dependencies: Vec<DependencyDecl>,
}

/// Everything the loader produced for one workspace.
#[derive(Debug, Clone)]
pub struct LoadedWorkspace {
    /// Canonical workspace root.
    pub root: PathBuf,
    /// Every manifest, sorted by path.
    pub manifests: Vec<Manifest>,
    pub packages: BTreeMap<String, WorkspacePackage>,
    /// One request per declared dependency edge, in manifest path order.
    pub requests: Vec<PackageRequest>,
}

/// Loads the manifest tree rooted at a directory.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    root: PathBuf,
    file_name: String,
    universe: PlatformUniverse,
}

impl ManifestLoader {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>, universe: PlatformUniverse) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            universe,
        }
    }

    pub fn load(&self) -> Result<LoadedWorkspace> {
        let root_manifest = self.root.join(&self.file_name);
        if !root_manifest.is_file() {
            return Err(Error::NotFound(root_manifest));
        }
        let root = dunce::canonicalize(&self.root).map_err(|source| Error::Io {
            path: self.root.clone(),
            source,
        })?;
        let root_manifest = root.join(&self.file_name);

        let mut seen: BTreeSet<PathBuf> = BTreeSet::from([root_manifest.clone()]);
        let mut includes: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        let mut manifests = Vec::new();
        let mut level = vec![root_manifest.clone()];

        while !level.is_empty() {
            let parsed: Vec<Result<Manifest>> = level
                .par_iter()
                .map(|path| Manifest::load(path, &self.universe))
                .collect();

            let mut next = Vec::new();
            for manifest in parsed {
                let manifest = manifest?;
                debug!(path = %manifest.path.display(), members = manifest.members.len(), "parsed manifest");

                let members = self.expand_members(&manifest, &root)?;
                for member in &members {
                    if seen.insert(member.clone()) {
                        next.push(member.clone());
                    }
                }
                includes.insert(manifest.path.clone(), members);
                manifests.push(manifest);
            }

            next.sort();
            level = next;
        }

        if let Some(cycle) = find_include_cycle(&root_manifest, &includes) {
            return Err(Error::IncludeCycle { cycle });
        }

        manifests.sort_by(|a, b| a.path.cmp(&b.path));
        let packages = collect_packages(&manifests, &root)?;
        let requests = collect_requests(&manifests, &root);

        info!(
            manifests = manifests.len(),
            packages = packages.len(),
            requests = requests.len(),
            "loaded manifest tree"
        );

        Ok(LoadedWorkspace {
            root,
            manifests,
            packages,
            requests,
        })
    }

    /// Canonical manifest paths of a manifest's members, sorted.
    fn expand_members(&self, manifest: &Manifest, root: &Path) -> Result<Vec<PathBuf>> {
        let dir = manifest.dir();
        let mut members = BTreeSet::new();

        for pattern in &manifest.members {
            let joined = dir.join(pattern);
            let dirs: Vec<PathBuf> = if is_glob(pattern) {
                let text = format!(
                    "{}/{}",
                    glob::Pattern::escape(&dir.to_string_lossy()),
                    pattern
                );
                let paths = glob::glob(&text).map_err(|e| Error::InvalidPattern {
                    manifest: manifest.path.clone(),
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })?;
                let mut dirs = Vec::new();
                for entry in paths {
                    let path = entry.map_err(|e| {
                        let path = e.path().to_path_buf();
                        Error::Io {
                            path,
                            source: e.into_error(),
                        }
                    })?;
                    if path.join(&self.file_name).is_file() {
                        dirs.push(path);
                    }
                }
                dirs
            } else {
                if !joined.join(&self.file_name).is_file() {
                    return Err(Error::MemberNotFound {
                        manifest: manifest.path.clone(),
                        pattern: pattern.clone(),
                    });
                }
                vec![joined]
            };

            for member_dir in dirs {
                let canonical = dunce::canonicalize(&member_dir).map_err(|source| Error::Io {
                    path: member_dir.clone(),
                    source,
                })?;
                if !canonical.starts_with(root) {
                    return Err(Error::OutsideRoot {
                        path: canonical,
                        root: root.to_path_buf(),
                    });
                }
                members.insert(canonical.join(&self.file_name));
            }
        }

        Ok(members.into_iter().collect())
    }
}

/// Depth-first search over manifest inclusion, returning the first loop found.
fn find_include_cycle(
    start: &Path,
    includes: &BTreeMap<PathBuf, Vec<PathBuf>>,
) -> Option<Vec<PathBuf>> {
    fn visit(
        node: &Path,
        includes: &BTreeMap<PathBuf, Vec<PathBuf>>,
        stack: &mut Vec<PathBuf>,
        done: &mut BTreeSet<PathBuf>,
    ) -> Option<Vec<PathBuf>> {
        if let Some(pos) = stack.iter().position(|p| p == node) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(node.to_path_buf());
            return Some(cycle);
        }
        if done.contains(node) {
            return None;
        }
        stack.push(node.to_path_buf());
        for child in includes.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(child, includes, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(node.to_path_buf());
        None
    }

    visit(start, includes, &mut Vec::new(), &mut BTreeSet::new())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn relative_dir(manifest: &Manifest, root: &Path) -> PathBuf {
    manifest
        .dir()
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn collect_packages(
    manifests: &[Manifest],
    root: &Path,
) -> Result<BTreeMap<String, WorkspacePackage>> {
    let mut packages: BTreeMap<String, WorkspacePackage> = BTreeMap::new();

    for manifest in manifests {
        let Some(decl) = &manifest.package else {
            continue;
        };
        if let Some(existing) = packages.get(&decl.name) {
            return Err(Error::DuplicatePackage {
                name: decl.name.clone(),
                first: existing.manifest.clone(),
                second: manifest.path.clone(),
            });
        }
        packages.insert(
            decl.name.clone(),
            WorkspacePackage {
                name: decl.name.clone(),
                version: decl.version.clone(),
                dir: relative_dir(manifest, root),
                manifest: manifest.path.clone(),
                srcs: decl.srcs.clone(),
                native: decl.native.clone(),
                dependencies: manifest.dependencies.clone(),
            },
        );
    }

    Ok(packages)
}

fn collect_requests(manifests: &[Manifest], root: &Path) -> Vec<PackageRequest> {
    manifests
        .iter()
        .flat_map(|manifest| {
            let origin = RequestOrigin::Manifest {
                path: manifest
                    .path
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| manifest.path.clone()),
                package: manifest.package.as_ref().map(|p| p.name.clone()),
            };
            manifest.dependencies.iter().map(move |dep| PackageRequest {
                name: dep.name.clone(),
                constraint: dep.constraint.clone(),
                features: dep.features.clone(),
                default_features: dep.default_features,
                platforms: dep.platforms.clone(),
                origin: origin.clone(),
            })
        })
        .collect()
}
