//! Target synthesis.
//!
//! Maps every package of a frozen [`ResolvedGraph`] onto build targets:
//!
//! - a `Library` named after the package,
//! - a `NativeShim` named `<name>-native` when the package has native
//!   sources (the library depends on it),
//! - for each platform with extra sources, a `PlatformVariant` named
//!   `<name>-<platform>` plus its own `<name>-<platform>-native` shim when
//!   the platform adds native sources.
//!
//! Cross-package edges point at every target of each dependency whose
//! platforms intersect the depending target's platforms narrowed by the
//! edge predicate. The output is a pure function of the graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use depsync_manifest::PlatformSet;
use depsync_resolve::{ResolvedGraph, ResolvedPackage};
use semver::Version;
use serde::Serialize;
use tracing::debug;

/// Kind of a synthesized target. The declaration order is the output order
/// within a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Library,
    NativeShim,
    PlatformVariant,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Library => "library",
            Self::NativeShim => "native-shim",
            Self::PlatformVariant => "platform-variant",
        })
    }
}

/// One buildable unit derived from exactly one resolved package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub name: String,
    pub kind: TargetKind,
    /// Name of the owning package.
    pub package: String,
    pub version: Version,
    /// Directory of the build file, relative to the workspace root.
    pub dir: PathBuf,
    pub srcs: Vec<String>,
    pub features: BTreeSet<String>,
    pub platforms: PlatformSet,
    /// Labels of the targets this one depends on.
    pub deps: BTreeSet<String>,
}

impl TargetDescriptor {
    pub fn label(&self) -> String {
        label(&self.dir, &self.name)
    }
}

/// Where generated build files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub build_file: String,
    pub third_party_dir: PathBuf,
    /// Directories, relative to the root, never searched for stale build files.
    pub skipped: Vec<PathBuf>,
}

impl Layout {
    pub fn new(build_file: impl Into<String>, third_party_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_file: build_file.into(),
            third_party_dir: third_party_dir.into(),
            skipped: Vec::new(),
        }
    }

    pub fn with_skipped(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skipped.push(dir.into());
        self
    }

    pub fn is_skipped(&self, relative: &Path) -> bool {
        self.skipped.iter().any(|dir| relative.starts_with(dir))
    }

    /// Build file directory for a package, relative to the workspace root.
    pub fn package_dir(&self, package: &ResolvedPackage) -> PathBuf {
        match package.workspace_dir() {
            Some(dir) => dir.to_path_buf(),
            None => self.third_party_dir.join(package.name()),
        }
    }

    /// Build file path for a target directory, relative to the workspace root.
    pub fn build_file_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.build_file)
    }
}

/// `//<dir>:<name>`, with `/` separators regardless of host.
pub fn label(dir: &Path, name: &str) -> String {
    let dir: Vec<String> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("//{}:{}", dir.join("/"), name)
}

/// Synthesize all targets, ordered by package name, then kind, then name.
pub fn synthesize(graph: &ResolvedGraph, layout: &Layout) -> Vec<TargetDescriptor> {
    let own: BTreeMap<&str, Vec<TargetDescriptor>> = graph
        .packages()
        .map(|package| (package.name(), package_targets(package, layout)))
        .collect();

    let mut targets = Vec::new();
    for package in graph.packages() {
        for mut target in own.get(package.name()).cloned().unwrap_or_default() {
            for edge in package.dependencies() {
                let scope = target.platforms.intersection(&edge.platforms);
                if scope.is_empty() {
                    continue;
                }
                let dependency_targets = own.get(edge.name.as_str()).into_iter().flatten();
                for dependency in dependency_targets {
                    if dependency.platforms.intersects(&scope) {
                        target.deps.insert(dependency.label());
                    }
                }
            }
            targets.push(target);
        }
    }

    targets.sort_by(|a, b| {
        (&a.package, a.kind, &a.name).cmp(&(&b.package, b.kind, &b.name))
    });
    debug!(packages = graph.len(), targets = targets.len(), "synthesized targets");
    targets
}

/// Targets of one package with only their intra-package edges.
fn package_targets(package: &ResolvedPackage, layout: &Layout) -> Vec<TargetDescriptor> {
    let dir = layout.package_dir(package);
    let make = |name: String, kind: TargetKind, srcs: Vec<String>, platforms: PlatformSet| {
        TargetDescriptor {
            name,
            kind,
            package: package.name().to_string(),
            version: package.version().clone(),
            dir: dir.clone(),
            srcs: sorted(srcs),
            features: BTreeSet::new(),
            platforms,
            deps: BTreeSet::new(),
        }
    };

    let mut targets = Vec::new();

    let mut library = make(
        package.name().to_string(),
        TargetKind::Library,
        package.srcs().to_vec(),
        package.platforms().clone(),
    );
    library.features = package.features().clone();
    if !package.native().is_empty() {
        let shim = make(
            format!("{}-native", package.name()),
            TargetKind::NativeShim,
            package.native().to_vec(),
            package.platforms().clone(),
        );
        library.deps.insert(shim.label());
        targets.push(shim);
    }
    let library_label = library.label();
    targets.push(library);

    for (platform, extra) in package.overrides() {
        let mut srcs = package.srcs().to_vec();
        srcs.extend(extra.srcs.iter().cloned());
        let mut variant = make(
            format!("{}-{}", package.name(), platform),
            TargetKind::PlatformVariant,
            srcs,
            PlatformSet::single(platform),
        );
        variant.features = package.features().clone();
        variant.deps.insert(library_label.clone());

        if !extra.native.is_empty() {
            let shim = make(
                format!("{}-{}-native", package.name(), platform),
                TargetKind::NativeShim,
                extra.native.clone(),
                PlatformSet::single(platform),
            );
            variant.deps.insert(shim.label());
            targets.push(shim);
        }
        targets.push(variant);
    }

    targets
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

/// Group targets by destination build file (relative to the root),
/// keeping their order.
pub fn group_by_file<'a>(
    targets: &'a [TargetDescriptor],
    layout: &Layout,
) -> BTreeMap<PathBuf, Vec<&'a TargetDescriptor>> {
    let mut files: BTreeMap<PathBuf, Vec<&TargetDescriptor>> = BTreeMap::new();
    for target in targets {
        files
            .entry(layout.build_file_in(&target.dir))
            .or_default()
            .push(target);
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use depsync_resolve::{PackageSource, PlatformOverride};
    use pretty_assertions::assert_eq;

    fn all() -> PlatformSet {
        ["linux", "macos", "windows"].into_iter().collect()
    }

    fn layout() -> Layout {
        Layout::new("BUCK", "third-party")
    }

    fn registry(name: &str, version: &str) -> ResolvedPackage {
        ResolvedPackage::new(name, Version::parse(version).unwrap(), PackageSource::Registry)
            .with_platforms(all())
            .with_sources(vec!["src/lib.rs".into()], vec![])
    }

    fn names(targets: &[TargetDescriptor]) -> Vec<&str> {
        targets.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_label_format() {
        assert_eq!(label(Path::new("third-party/b"), "b"), "//third-party/b:b");
        assert_eq!(label(Path::new(""), "root"), "//:root");
    }

    #[test]
    fn test_single_library() {
        let graph = ResolvedGraph::from_packages([
            registry("b", "1.9.0").with_features(["std"]),
        ])
        .unwrap();
        let targets = synthesize(&graph, &layout());

        assert_eq!(targets.len(), 1);
        let b = &targets[0];
        assert_eq!(b.kind, TargetKind::Library);
        assert_eq!(b.label(), "//third-party/b:b");
        assert_eq!(b.srcs, vec!["src/lib.rs".to_string()]);
        assert!(b.features.contains("std"));
        assert!(b.deps.is_empty());
    }

    #[test]
    fn test_workspace_package_uses_its_directory() {
        let app = ResolvedPackage::new(
            "app",
            Version::new(0, 1, 0),
            PackageSource::Workspace {
                dir: PathBuf::from("apps/app"),
            },
        )
        .with_platforms(all())
        .with_sources(vec!["src/main.rs".into()], vec![]);
        let graph = ResolvedGraph::from_packages([app]).unwrap();

        let targets = synthesize(&graph, &layout());
        assert_eq!(targets[0].label(), "//apps/app:app");
        let files = group_by_file(&targets, &layout());
        assert!(files.contains_key(Path::new("apps/app/BUCK")));
    }

    #[test]
    fn test_native_shim_and_platform_variants() {
        let z = registry("z", "1.0.0")
            .with_sources(vec!["src/lib.rs".into()], vec!["native/z.c".into()])
            .with_override(
                "windows",
                PlatformOverride {
                    srcs: vec!["src/win.rs".into()],
                    native: vec!["native/win.c".into()],
                },
            )
            .with_override(
                "linux",
                PlatformOverride {
                    srcs: vec!["src/linux.rs".into()],
                    native: vec![],
                },
            );
        let graph = ResolvedGraph::from_packages([z]).unwrap();
        let targets = synthesize(&graph, &layout());

        assert_eq!(
            names(&targets),
            vec!["z", "z-native", "z-windows-native", "z-linux", "z-windows"]
        );

        let library = &targets[0];
        assert!(library.deps.contains("//third-party/z:z-native"));

        let windows = targets.iter().find(|t| t.name == "z-windows").unwrap();
        assert_eq!(windows.platforms, PlatformSet::single("windows"));
        assert_eq!(
            windows.srcs,
            vec!["src/lib.rs".to_string(), "src/win.rs".to_string()]
        );
        assert_eq!(
            windows.deps,
            BTreeSet::from([
                "//third-party/z:z".to_string(),
                "//third-party/z:z-windows-native".to_string(),
            ])
        );
    }

    #[test]
    fn test_cross_package_edges_filtered_by_platform() {
        let graph = ResolvedGraph::from_packages([
            registry("a", "1.0.0")
                .with_dependency("b", all())
                .with_dependency("l", PlatformSet::single("linux")),
            registry("b", "1.0.0").with_override(
                "windows",
                PlatformOverride {
                    srcs: vec!["src/win.rs".into()],
                    native: vec![],
                },
            ),
            registry("l", "1.0.0").with_platforms(PlatformSet::single("linux")),
        ])
        .unwrap();
        let targets = synthesize(&graph, &layout());

        let a = targets.iter().find(|t| t.name == "a").unwrap();
        assert_eq!(
            a.deps,
            BTreeSet::from([
                "//third-party/b:b".to_string(),
                "//third-party/b:b-windows".to_string(),
                "//third-party/l:l".to_string(),
            ])
        );
    }

    #[test]
    fn test_edges_skip_disjoint_platforms() {
        let graph = ResolvedGraph::from_packages([
            registry("a", "1.0.0")
                .with_platforms(PlatformSet::single("macos"))
                .with_dependency("w", PlatformSet::single("windows")),
            registry("w", "1.0.0").with_platforms(PlatformSet::single("windows")),
        ])
        .unwrap();
        let targets = synthesize(&graph, &layout());

        let a = targets.iter().find(|t| t.name == "a").unwrap();
        assert!(a.deps.is_empty());
    }

    #[test]
    fn test_order_is_package_then_kind() {
        let graph = ResolvedGraph::from_packages([
            registry("zeta", "1.0.0"),
            registry("alpha", "1.0.0")
                .with_sources(vec!["src/lib.rs".into()], vec!["a.c".into()]),
        ])
        .unwrap();
        let targets = synthesize(&graph, &layout());
        assert_eq!(names(&targets), vec!["alpha", "alpha-native", "zeta"]);
    }
}
