// Copyright (C) 2026 by GiGa infosystems

//! Pick the newest upstream version of a package across all foreign repositories, see
//! [`UpstreamResolver::resolve`].

use crate::foreign::ForeignRepository;
use crate::version::VersionOrder;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// The best upstream version found for a package
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct UpstreamMatch {
    pub version: String,
    /// The name of the repository that reported `version`
    pub repository: String,
}

/// Queries a list of repositories in registration order
pub struct UpstreamResolver<'a> {
    repositories: &'a [Box<dyn ForeignRepository>],
    order: &'a dyn VersionOrder,
}

impl<'a> UpstreamResolver<'a> {
    pub fn new(repositories: &'a [Box<dyn ForeignRepository>], order: &'a dyn VersionOrder) -> Self {
        UpstreamResolver {
            repositories,
            order,
        }
    }

    /// Return the highest version any repository reports for `name`.
    ///
    /// On equal versions the earlier repository wins. Values that can't be interpreted by the
    /// [`VersionOrder`] and repositories with a broken rule for `name` are skipped.
    pub fn resolve(&self, name: &str) -> Option<UpstreamMatch> {
        let mut best: Option<UpstreamMatch> = None;

        for repository in self.repositories {
            let version = match repository.version_of(name) {
                Ok(Some(version)) => version,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "Skipping repository {} for `{name}`: {err}",
                        repository.name()
                    );
                    continue;
                }
            };

            if let Err(err) = self.order.check(&version) {
                warn!(
                    "Skipping version from repository {} for `{name}`: {err}",
                    repository.name()
                );
                continue;
            }

            let replace = match best {
                None => true,
                Some(ref best) => matches!(
                    self.order.compare(&version, &best.version),
                    Ok(Ordering::Greater)
                ),
            };

            if replace {
                best = Some(UpstreamMatch {
                    version,
                    repository: repository.name().to_owned(),
                });
            }
        }

        match best {
            Some(ref found) => debug!(
                "Upstream of `{name}` is {} from {}",
                found.version, found.repository
            ),
            None => debug!("No upstream found for `{name}`"),
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{IndexEntry, MappedRepository, PackageIndex};
    use crate::rules::{Rule, RuleTable};
    use crate::version::{GenericOrder, SemverOrder};

    fn repository(name: &str, packages: &[(&str, &str)]) -> Box<dyn ForeignRepository> {
        repository_with_rules(name, RuleTable::default(), packages)
    }

    fn repository_with_rules(
        name: &str,
        rules: RuleTable,
        packages: &[(&str, &str)],
    ) -> Box<dyn ForeignRepository> {
        let index = PackageIndex {
            packages: packages
                .iter()
                .map(|(name, version)| {
                    let entry = IndexEntry {
                        version: version.to_string(),
                        pname: None,
                    };
                    (name.to_string(), entry)
                })
                .collect(),
        };
        Box::new(MappedRepository::new(name, rules, index))
    }

    fn found(version: &str, repository: &str) -> Option<UpstreamMatch> {
        Some(UpstreamMatch {
            version: version.to_owned(),
            repository: repository.to_owned(),
        })
    }

    #[test]
    fn test_highest_version_wins() {
        let repositories = [
            repository("A", &[("libfoo", "1.2")]),
            repository("B", &[("libfoo", "1.3")]),
        ];
        let resolver = UpstreamResolver::new(&repositories, &GenericOrder);
        assert_eq!(resolver.resolve("libfoo"), found("1.3", "B"));
        assert_eq!(resolver.resolve("libbar"), None);
    }

    #[test]
    fn test_result_is_order_independent() {
        let repositories = [
            repository("B", &[("libfoo", "1.3")]),
            repository("A", &[("libfoo", "1.2")]),
        ];
        let resolver = UpstreamResolver::new(&repositories, &GenericOrder);
        assert_eq!(resolver.resolve("libfoo"), found("1.3", "B"));
    }

    #[test]
    fn test_equal_versions_keep_first_repository() {
        let repositories = [
            repository("A", &[("libfoo", "1.3")]),
            repository("B", &[("libfoo", "1.3.0")]),
            repository("C", &[("libfoo", "1.1")]),
        ];
        let resolver = UpstreamResolver::new(&repositories, &GenericOrder);
        assert_eq!(resolver.resolve("libfoo"), found("1.3", "A"));
    }

    #[test]
    fn test_uninterpretable_versions_are_skipped() {
        let repositories = [
            repository("A", &[("libfoo", "not-semver")]),
            repository("B", &[("libfoo", "1.2.0")]),
            repository("C", &[("libfoo", "1.3")]),
        ];
        let resolver = UpstreamResolver::new(&repositories, &SemverOrder);
        assert_eq!(resolver.resolve("libfoo"), found("1.2.0", "B"));
    }

    #[test]
    fn test_broken_rules_only_skip_that_repository() {
        let broken = RuleTable::from_rules([("libfoo".to_owned(), Rule::default())]);
        let repositories = [
            repository_with_rules("A", broken, &[("libfoo", "9.9")]),
            repository("B", &[("libfoo", "1.2")]),
        ];
        let resolver = UpstreamResolver::new(&repositories, &GenericOrder);
        assert_eq!(resolver.resolve("libfoo"), found("1.2", "B"));
    }
}
