// Copyright (C) 2026 by GiGa infosystems

//! Foreign repositories, the sources of upstream versions, see [`ForeignRepository`].

use crate::rules::{ResolvedName, RuleError, RuleTable};
use crate::store::{HistoryStore, StoreError};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, btree_map},
    fs,
    path::Path,
};
use tracing::{debug, info, warn};

/// The backing data of a repository couldn't be loaded
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read package index {path:?}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse package index {path:?}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// A source of upstream package versions.
///
/// Implementors only provide the raw lookup, rules are applied by [`ForeignRepository::version_of`].
pub trait ForeignRepository {
    /// The name this repository is reported as
    fn name(&self) -> &str;

    /// The rules this repository translates names with
    fn rules(&self) -> &RuleTable;

    /// Look up a name in the repository data, without applying any rules
    fn lookup(&self, name: &str) -> Option<String>;

    /// Return the version of a package after applying the rules of this repository.
    ///
    /// Aliases are only applied once, the alias target is looked up directly.
    fn version_of(&self, name: &str) -> Result<Option<String>, RuleError> {
        let version = match self.rules().resolve(name)? {
            ResolvedName::Dropped => None,
            ResolvedName::Alias(target) => self.lookup(&target),
            ResolvedName::Pass(name) => self.lookup(&name),
        };
        Ok(version)
    }
}

/// A single entry of a [`PackageIndex`]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub version: String,
    /// An alternate name the package is known under (such as the `pname` of a nix attribute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pname: Option<String>,
}

/// The materialized data of an upstream repository, as produced by whatever fetched it
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct PackageIndex {
    pub packages: BTreeMap<String, IndexEntry>,
}

impl PackageIndex {
    /// Read a JSON package index
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let data = fs::read(path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| SourceError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// How a package changed since the last ingestion of a repository
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    New,
    Updated,
    Unchanged,
}

/// A package observed in a repository during ingestion
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ForeignPackage {
    pub name: String,
    pub version: String,
    pub change_status: ChangeStatus,
}

/// The changes found while ingesting a repository, see [`MappedRepository::ingest`]
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct ChangeReport {
    pub repository: String,
    /// New and updated packages only
    pub packages: Vec<ForeignPackage>,
    pub unchanged: usize,
}

/// A repository backed by an in-memory name to version mapping
#[derive(Debug)]
pub struct MappedRepository {
    name: String,
    rules: RuleTable,
    versions: BTreeMap<String, String>,
    /// Maps alternate names to keys of `versions`
    alternate_names: HashMap<String, String>,
}

impl MappedRepository {
    pub fn new(name: impl Into<String>, rules: RuleTable, index: PackageIndex) -> Self {
        let mut versions = BTreeMap::new();
        let mut alternate_names = HashMap::new();

        for (key, entry) in index.packages {
            if let Some(pname) = entry.pname {
                // NOTE: The first key in order wins if multiple keys share an alternate name
                alternate_names.entry(pname).or_insert_with(|| key.clone());
            }
            versions.insert(key, entry.version);
        }

        MappedRepository {
            name: name.into(),
            rules,
            versions,
            alternate_names,
        }
    }

    /// Load a repository from a package index file.
    ///
    /// If the index can't be loaded, the repository is empty for this run, so every lookup
    /// reports the package as absent.
    pub fn load_or_empty(name: impl Into<String>, rules: RuleTable, index: &Path) -> Self {
        let name = name.into();
        let index = match PackageIndex::load(index) {
            Ok(index) => {
                info!(
                    "Loaded {} packages for repository {name}",
                    index.packages.len()
                );
                index
            }
            Err(err) => {
                warn!("Repository {name} is unavailable for this run: {err}");
                PackageIndex::default()
            }
        };
        Self::new(name, rules, index)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Compare the current data against the state recorded for this repository, persist the
    /// current state and report new & updated packages.
    pub fn ingest(&self, store: &mut dyn HistoryStore) -> Result<ChangeReport, StoreError> {
        let packages = store.record_foreign_state(&self.name, &self.versions)?;

        let mut report = ChangeReport {
            repository: self.name.clone(),
            ..ChangeReport::default()
        };
        for package in packages {
            match package.change_status {
                ChangeStatus::Unchanged => report.unchanged += 1,
                ChangeStatus::New | ChangeStatus::Updated => report.packages.push(package),
            }
        }

        debug!(
            "Ingested repository {}: {} changed, {} unchanged",
            self.name,
            report.packages.len(),
            report.unchanged
        );
        Ok(report)
    }
}

impl ForeignRepository for MappedRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn rules(&self) -> &RuleTable {
        &self.rules
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.versions
            .get(name)
            .or_else(|| {
                self.alternate_names
                    .get(name)
                    .and_then(|key| self.versions.get(key))
            })
            .cloned()
    }
}

/// Classify the current state of a repository against the previously recorded state, updating
/// `recorded` in place.
///
/// Shared by the [`HistoryStore`] implementations.
pub(crate) fn classify_changes(
    recorded: &mut BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> Vec<ForeignPackage> {
    current
        .iter()
        .map(|(name, version)| {
            let change_status = match recorded.entry(name.clone()) {
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(version.clone());
                    ChangeStatus::New
                }
                btree_map::Entry::Occupied(entry) if entry.get() == version => {
                    ChangeStatus::Unchanged
                }
                btree_map::Entry::Occupied(mut entry) => {
                    entry.insert(version.clone());
                    ChangeStatus::Updated
                }
            };
            ForeignPackage {
                name: name.clone(),
                version: version.clone(),
                change_status,
            }
        })
        .collect()
}
