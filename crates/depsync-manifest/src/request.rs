//! Dependency requests, one per edge in the manifest tree or the registry.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::platform::PlatformSet;
use crate::version::VersionConstraint;

/// Where a [`PackageRequest`] came from, for error messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestOrigin {
    /// Declared in a workspace manifest.
    Manifest {
        path: PathBuf,
        package: Option<String>,
    },
    /// Declared by a resolved package's registry metadata.
    Package { name: String, version: semver::Version },
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest {
                path,
                package: Some(package),
            } => write!(f, "{package} ({})", path.display()),
            Self::Manifest {
                path,
                package: None,
            } => write!(f, "{}", path.display()),
            Self::Package { name, version } => write!(f, "{name}@{version}"),
        }
    }
}

/// A single request for a package. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub name: String,
    pub constraint: VersionConstraint,
    pub features: BTreeSet<String>,
    pub default_features: bool,
    /// Platforms on which the requester needs this package.
    pub platforms: PlatformSet,
    pub origin: RequestOrigin,
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (from {})", self.name, self.constraint, self.origin)
    }
}
