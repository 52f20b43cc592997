// Copyright (C) 2026 by GiGa infosystems

//! Point-in-time snapshots of all local packages and their upstream versions, built by
//! [`ReconcileContext::build`].

use crate::foreign::ForeignRepository;
use crate::rules::{ResolvedName, RuleTable};
use crate::upstream::UpstreamResolver;
use crate::version::VersionOrder;
use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::Path,
};
use tracing::{debug, info, warn};

/// Local versions containing this marker have no comparable upstream version
pub const ROLLING_MARKER: &str = "ROLLING";

/// The serialized `upstream_version` of [`UpstreamStatus::Rolling`]
pub const ROLLING_SENTINEL: &str = "Rolling version";

/// The serialized `upstream_version` of [`UpstreamStatus::NotFound`]
pub const NOT_FOUND_SENTINEL: &str = "Not found in repository (different name?)";

/// A package of the tracked distribution, as provided by whatever reads its build description
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LocalPackage {
    pub name: String,
    pub version: String,
    /// The file the package is defined in
    #[serde(default)]
    pub file: Option<String>,
    /// The line in `file` the package is defined at
    #[serde(default)]
    pub line: Option<u32>,
    /// The maintainer, usually as `Name <address>`
    #[serde(default)]
    pub maintainer: Option<String>,
}

impl LocalPackage {
    pub fn is_rolling(&self) -> bool {
        self.version.contains(ROLLING_MARKER)
    }
}

/// Read the local package list from a YAML file
pub fn load_local_packages(path: &Path) -> Result<Vec<LocalPackage>> {
    let source = fs::read_to_string(path)
        .map_err(|err| eyre!("Failed to read local packages from {path:?}: {err}"))?;
    let packages: Vec<LocalPackage> = serde_yaml::from_str(&source)
        .map_err(|err| eyre!("Invalid local package list {path:?}: {err}"))?;
    info!("Read {} local packages from {path:?}", packages.len());
    Ok(packages)
}

/// What is known about the upstream version of a package
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum UpstreamStatus {
    Found { version: String, repository: String },
    /// The local version is rolling, so no upstream version was looked up
    Rolling,
    NotFound,
}

impl UpstreamStatus {
    /// The upstream version, if one was found
    pub fn version(&self) -> Option<&str> {
        match self {
            UpstreamStatus::Found { version, .. } => Some(version.as_str()),
            UpstreamStatus::Rolling | UpstreamStatus::NotFound => None,
        }
    }

    /// The name of the repository the upstream version was found in
    pub fn repository(&self) -> Option<&str> {
        match self {
            UpstreamStatus::Found { repository, .. } => Some(repository.as_str()),
            UpstreamStatus::Rolling | UpstreamStatus::NotFound => None,
        }
    }

    /// The upstream version, or a human readable reason why there is none
    pub fn display_version(&self) -> &str {
        match self {
            UpstreamStatus::Found { version, .. } => version.as_str(),
            UpstreamStatus::Rolling => ROLLING_SENTINEL,
            UpstreamStatus::NotFound => NOT_FOUND_SENTINEL,
        }
    }
}

/// The reconciled record of a single package within a [`DistroPackageStatus`]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(into = "RawDistroPackage", try_from = "RawDistroPackage")]
pub struct DistroPackage {
    pub name: String,
    /// The local version
    pub version: String,
    pub upstream: UpstreamStatus,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl DistroPackage {
    /// The upstream version is strictly newer than the local version
    pub fn is_out_of_date(&self, order: &dyn VersionOrder) -> bool {
        self.upstream
            .version()
            .is_some_and(|upstream| order.is_newer(upstream, &self.version))
    }

    /// The local version is strictly newer than the upstream version
    pub fn is_newer_than_upstream(&self, order: &dyn VersionOrder) -> bool {
        self.upstream
            .version()
            .is_some_and(|upstream| order.is_newer(&self.version, upstream))
    }
}

/// The persisted form of a [`DistroPackage`].
///
/// `found_upstream == false` always comes with an empty `upstream_repo` and one of the
/// sentinels as `upstream_version`.
#[derive(Serialize, Deserialize)]
struct RawDistroPackage {
    package: String,
    version: String,
    upstream_version: String,
    upstream_repo: String,
    found_upstream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
}

impl From<DistroPackage> for RawDistroPackage {
    fn from(package: DistroPackage) -> Self {
        let found_upstream = matches!(package.upstream, UpstreamStatus::Found { .. });
        let (upstream_version, upstream_repo) = match package.upstream {
            UpstreamStatus::Found {
                version,
                repository,
            } => (version, repository),
            UpstreamStatus::Rolling => (ROLLING_SENTINEL.to_owned(), String::new()),
            UpstreamStatus::NotFound => (NOT_FOUND_SENTINEL.to_owned(), String::new()),
        };

        RawDistroPackage {
            package: package.name,
            version: package.version,
            upstream_version,
            upstream_repo,
            found_upstream,
            file: package.file,
            line: package.line,
        }
    }
}

impl TryFrom<RawDistroPackage> for DistroPackage {
    type Error = String;

    fn try_from(raw: RawDistroPackage) -> Result<Self, Self::Error> {
        let upstream = if raw.found_upstream {
            UpstreamStatus::Found {
                version: raw.upstream_version,
                repository: raw.upstream_repo,
            }
        } else if !raw.upstream_repo.is_empty() {
            return Err(format!(
                "package `{}` was not found upstream but names repository `{}`",
                raw.package, raw.upstream_repo
            ));
        } else if raw.upstream_version == ROLLING_SENTINEL {
            UpstreamStatus::Rolling
        } else if raw.upstream_version == NOT_FOUND_SENTINEL {
            UpstreamStatus::NotFound
        } else {
            return Err(format!(
                "package `{}` was not found upstream but has upstream version `{}`",
                raw.package, raw.upstream_version
            ));
        };

        Ok(DistroPackage {
            name: raw.package,
            version: raw.version,
            upstream,
            file: raw.file,
            line: raw.line,
        })
    }
}

/// A snapshot of all (non-ignored) local packages, at most one per name
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct DistroPackageStatus {
    pub packages: Vec<DistroPackage>,
}

impl DistroPackageStatus {
    pub fn package(&self, name: &str) -> Option<&DistroPackage> {
        self.packages.iter().find(|package| package.name == name)
    }

    pub fn out_of_date_packages<'a>(
        &'a self,
        order: &'a dyn VersionOrder,
    ) -> impl Iterator<Item = &'a DistroPackage> + 'a {
        self.packages
            .iter()
            .filter(move |package| package.is_out_of_date(order))
    }

    pub fn count_out_of_date(&self, order: &dyn VersionOrder) -> usize {
        self.out_of_date_packages(order).count()
    }

    /// Packages whose local version is newer than any known upstream version
    pub fn newer_than_upstream<'a>(
        &'a self,
        order: &'a dyn VersionOrder,
    ) -> impl Iterator<Item = &'a DistroPackage> + 'a {
        self.packages
            .iter()
            .filter(move |package| package.is_newer_than_upstream(order))
    }
}

/// Everything needed to reconcile local packages against foreign repositories.
///
/// Constructed once per check.
pub struct ReconcileContext {
    /// Foreign repositories in registration order
    pub repositories: Vec<Box<dyn ForeignRepository>>,
    /// Distribution wide rules, applied before any repository is queried
    pub rules: RuleTable,
    pub order: Box<dyn VersionOrder>,
}

impl ReconcileContext {
    pub fn resolver(&self) -> UpstreamResolver<'_> {
        UpstreamResolver::new(&self.repositories, &*self.order)
    }

    /// Build a snapshot of `local_packages`, except for the ones in `ignored` or dropped by the
    /// distribution rules.
    ///
    /// Only the first package of a given name is included.
    pub fn build(
        &self,
        local_packages: &[LocalPackage],
        ignored: &BTreeSet<String>,
    ) -> DistroPackageStatus {
        let resolver = self.resolver();
        let mut seen = HashSet::new();
        let mut packages = Vec::with_capacity(local_packages.len());

        for local in local_packages {
            if ignored.contains(&local.name) {
                debug!("Ignoring `{}`", local.name);
                continue;
            }

            let lookup_name = match self.rules.resolve(&local.name) {
                Ok(ResolvedName::Dropped) => {
                    debug!("`{}` is dropped by the distribution rules", local.name);
                    continue;
                }
                Ok(ResolvedName::Alias(target)) => target,
                Ok(ResolvedName::Pass(name)) => name,
                Err(err) => {
                    warn!("Ignoring distribution rule for `{}`: {err}", local.name);
                    local.name.clone()
                }
            };

            if !seen.insert(local.name.as_str()) {
                warn!("Duplicate local package `{}`, keeping the first", local.name);
                continue;
            }

            // NOTE: Rolling versions can't be compared, so don't bother looking them up
            let upstream = if local.is_rolling() {
                UpstreamStatus::Rolling
            } else {
                match resolver.resolve(&lookup_name) {
                    Some(found) => UpstreamStatus::Found {
                        version: found.version,
                        repository: found.repository,
                    },
                    None => UpstreamStatus::NotFound,
                }
            };

            packages.push(DistroPackage {
                name: local.name.clone(),
                version: local.version.clone(),
                upstream,
                file: local.file.clone(),
                line: local.line,
            });
        }

        info!("Built snapshot of {} packages", packages.len());
        DistroPackageStatus { packages }
    }
}
