// Copyright (C) 2026 by GiGa infosystems

//! The YAML run configuration, see [`Config::load`].

use crate::foreign::{ForeignRepository, MappedRepository};
use crate::rules::RuleTable;
use crate::status::ReconcileContext;
use crate::version::VersionScheme;
use color_eyre::{Result, eyre::eyre};
use itertools::Itertools;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

fn default_database() -> PathBuf {
    "packages.db".into()
}

fn default_rules_dir() -> PathBuf {
    "rules".into()
}

fn default_history_limit() -> usize {
    5
}

/// A foreign repository to compare against
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// The name the repository is reported as
    pub name: String,
    /// The JSON package index of the repository
    pub index: PathBuf,
    /// The rule file, defaults to `<rules_dir>/<name>.yml`
    #[serde(default)]
    pub rules: Option<PathBuf>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub distro_name: String,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// The YAML list of local packages
    pub local_packages: PathBuf,
    /// Distribution wide rules
    #[serde(default)]
    pub rules: Option<PathBuf>,
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
    #[serde(default)]
    pub version_scheme: VersionScheme,
    #[serde(default)]
    pub ignored_packages: BTreeSet<String>,
    /// The amount of previous checks to include in reports
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Foreign repositories in the order they are queried in
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl Config {
    /// Load the configuration, resolving relative paths against the directory of `path`
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .map_err(|err| eyre!("Failed to read configuration {path:?}: {err}"))?;
        let config: Config = serde_yaml::from_str(&source)
            .map_err(|err| eyre!("Invalid configuration {path:?}: {err}"))?;

        let base = path.parent().unwrap_or(Path::new(""));
        Ok(config.relative_to(base))
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.database);
        resolve(&mut self.local_packages);
        resolve(&mut self.rules_dir);
        if let Some(ref mut rules) = self.rules {
            resolve(rules);
        }
        for repository in &mut self.repositories {
            resolve(&mut repository.index);
            if let Some(ref mut rules) = repository.rules {
                resolve(rules);
            }
        }
        self
    }

    /// The rule file of a repository
    pub fn repository_rules_path(&self, repository: &RepositoryConfig) -> PathBuf {
        repository
            .rules
            .clone()
            .unwrap_or_else(|| self.rules_dir.join(format!("{}.yml", repository.name)))
    }

    /// Load the rule files & package indexes of all configured repositories.
    ///
    /// Broken rule files are an error, unavailable package indexes are not.
    pub fn load_repositories(&self) -> Result<Vec<MappedRepository>> {
        let repositories = self
            .repositories
            .iter()
            .map(|repository| {
                let rules = load_rules(&self.repository_rules_path(repository))?;
                Ok(MappedRepository::load_or_empty(
                    repository.name.clone(),
                    rules,
                    &repository.index,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        if repositories.is_empty() {
            warn!("No foreign repositories configured, no package will be found upstream");
        } else {
            info!(
                "Comparing against {}",
                repositories
                    .iter()
                    .map(|repository| repository.name())
                    .join(", ")
            );
        }
        Ok(repositories)
    }

    /// Build the [`ReconcileContext`] for a check against `repositories`
    pub fn reconcile_context(
        &self,
        repositories: Vec<Box<dyn ForeignRepository>>,
    ) -> Result<ReconcileContext> {
        let rules = match self.rules {
            Some(ref path) => load_rules(path)?,
            None => RuleTable::default(),
        };

        Ok(ReconcileContext {
            repositories,
            rules,
            order: self.version_scheme.order(),
        })
    }
}

/// Load a rule file, warning about every malformed entry
fn load_rules(path: &Path) -> Result<RuleTable> {
    let rules = RuleTable::load(path)?;
    for err in rules.validate() {
        warn!("In {path:?}: {err}");
    }
    Ok(rules)
}
