// Copyright (C) 2026 by GiGa infosystems

//! Per-repository name translation rules, see [`RuleTable::resolve`].
//!
//! A rule file is a YAML mapping from package names to rules:
//!
//! ```yaml
//! libfoo-dev:
//!   action: alias
//!   alias: libfoo
//! internal-tool:
//!   action: ignore
//! ```

use serde::Deserialize;
use std::{collections::BTreeMap, fs, io, path::Path};
use tracing::{debug, info};

/// A malformed rule, or a rule file that couldn't be read
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule for `{name}` has no `action`")]
    MissingAction { name: String },
    #[error("rule for `{name}` has unknown action `{action}`")]
    UnknownAction { name: String, action: String },
    #[error("alias rule for `{name}` has no `alias` target")]
    MissingAlias { name: String },
    #[error("failed to read rule file {path:?}: {source}")]
    Io { path: String, source: io::Error },
    #[error("failed to parse rule file {path:?}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// A single rule entry as written in a rule file.
///
/// NOTE: Validation happens on resolution, so that a broken entry only affects the package it is
/// attached to.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
pub struct Rule {
    pub action: Option<String>,
    pub alias: Option<String>,
}

/// The result of [`RuleTable::resolve`]
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ResolvedName {
    /// No rule applies, look the name up as is
    Pass(String),
    /// Look up another name instead
    Alias(String),
    /// The package should not be looked up at all
    Dropped,
}

/// A table of [`Rule`]s keyed by package name.
///
/// An empty table (e.g. because no rule file exists) passes every name through.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: BTreeMap<String, Rule>,
}

impl RuleTable {
    /// Load a rule table from a YAML file.
    ///
    /// A missing file results in an empty table, as rule files are optional.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No rule file at {path:?}, names pass through unchanged");
                return Ok(RuleTable::default());
            }
            Err(source) => {
                return Err(RuleError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        if source.trim().is_empty() {
            return Ok(RuleTable::default());
        }

        // A file with only comments deserializes to `null`
        let table = serde_yaml::from_str::<Option<RuleTable>>(&source)
            .map_err(|source| RuleError::Parse {
                path: path.display().to_string(),
                source,
            })?
            .unwrap_or_default();

        debug!("Loaded {} rules from {path:?}", table.len());
        Ok(table)
    }

    pub fn from_rules(rules: impl IntoIterator<Item = (String, Rule)>) -> Self {
        RuleTable {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Translate a package name according to its rule, if any.
    pub fn resolve(&self, name: &str) -> Result<ResolvedName, RuleError> {
        let Some(rule) = self.rules.get(name) else {
            return Ok(ResolvedName::Pass(name.to_owned()));
        };

        match rule.action.as_deref() {
            Some("ignore") => Ok(ResolvedName::Dropped),
            Some("alias") => match rule.alias {
                Some(ref target) => Ok(ResolvedName::Alias(target.clone())),
                None => Err(RuleError::MissingAlias {
                    name: name.to_owned(),
                }),
            },
            Some(action) => Err(RuleError::UnknownAction {
                name: name.to_owned(),
                action: action.to_owned(),
            }),
            None => Err(RuleError::MissingAction {
                name: name.to_owned(),
            }),
        }
    }

    /// Return the errors of all malformed entries in this table
    pub fn validate(&self) -> Vec<RuleError> {
        self.rules
            .keys()
            .filter_map(|name| self.resolve(name).err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rule(action: Option<&str>, alias: Option<&str>) -> Rule {
        Rule {
            action: action.map(str::to_owned),
            alias: alias.map(str::to_owned),
        }
    }

    fn table() -> RuleTable {
        RuleTable::from_rules([
            ("libfoo-dev".to_owned(), rule(Some("alias"), Some("libfoo"))),
            ("internal-tool".to_owned(), rule(Some("ignore"), Some("x"))),
            ("broken-alias".to_owned(), rule(Some("alias"), None)),
            ("unknown".to_owned(), rule(Some("rename"), Some("y"))),
            ("empty".to_owned(), rule(None, None)),
        ])
    }

    #[test]
    fn test_empty_table_passes_through() {
        let table = RuleTable::default();
        assert_eq!(
            table.resolve("anything").unwrap(),
            ResolvedName::Pass("anything".to_owned())
        );
    }

    #[test]
    fn test_alias_and_ignore() {
        let table = table();
        assert_eq!(
            table.resolve("libfoo-dev").unwrap(),
            ResolvedName::Alias("libfoo".to_owned())
        );
        assert_eq!(table.resolve("internal-tool").unwrap(), ResolvedName::Dropped);
        assert_eq!(
            table.resolve("libbar").unwrap(),
            ResolvedName::Pass("libbar".to_owned())
        );
    }

    #[test]
    fn test_malformed_rules_are_errors() {
        let table = table();
        assert!(matches!(
            table.resolve("broken-alias"),
            Err(RuleError::MissingAlias { .. })
        ));
        assert!(matches!(
            table.resolve("unknown"),
            Err(RuleError::UnknownAction { .. })
        ));
        assert!(matches!(
            table.resolve("empty"),
            Err(RuleError::MissingAction { .. })
        ));
        assert_eq!(table.validate().len(), 3);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let table = table();
        for name in ["libfoo-dev", "internal-tool", "libbar"] {
            assert_eq!(
                table.resolve(name).unwrap(),
                table.resolve(name).unwrap()
            );
        }
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
libfoo-dev:
  action: alias
  alias: libfoo
internal-tool:
  action: ignore
"#
        )
        .unwrap();

        let table = RuleTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.resolve("libfoo-dev").unwrap(),
            ResolvedName::Alias("libfoo".to_owned())
        );
    }

    #[test]
    fn test_load_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let table = RuleTable::load(&dir.path().join("missing.yml")).unwrap();
        assert!(table.is_empty());

        let file = NamedTempFile::new().unwrap();
        assert!(RuleTable::load(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "libfoo: [unclosed").unwrap();
        assert!(matches!(
            RuleTable::load(file.path()),
            Err(RuleError::Parse { .. })
        ));
    }
}
