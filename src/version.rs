// Copyright (C) 2026 by GiGa infosystems

//! Version ordering used for every comparison in this crate, see [`VersionOrder`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use version_compare::Version;

/// A version string the comparator could not interpret
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("cannot interpret version `{version}`: {reason}")]
pub struct ComparatorError {
    pub version: String,
    pub reason: String,
}

impl ComparatorError {
    fn new(version: &str, reason: impl Into<String>) -> Self {
        ComparatorError {
            version: version.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A total order on version strings
pub trait VersionOrder {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering, ComparatorError>;

    /// Check whether a version can be interpreted at all
    fn check(&self, version: &str) -> Result<(), ComparatorError> {
        self.compare(version, version).map(|_| ())
    }

    /// `a` is strictly greater than `b`.
    ///
    /// Versions that can't be interpreted are never newer.
    fn is_newer(&self, a: &str, b: &str) -> bool {
        matches!(self.compare(a, b), Ok(Ordering::Greater))
    }
}

/// The selectable [`VersionOrder`] implementations
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    /// [`GenericOrder`]
    #[default]
    Generic,
    /// [`SemverOrder`]
    Semver,
}

impl VersionScheme {
    pub fn order(self) -> Box<dyn VersionOrder> {
        match self {
            VersionScheme::Generic => Box::new(GenericOrder),
            VersionScheme::Semver => Box::new(SemverOrder),
        }
    }
}

/// Strict [semver](https://semver.org) ordering
pub struct SemverOrder;

impl SemverOrder {
    fn parse(version: &str) -> Result<semver::Version, ComparatorError> {
        semver::Version::parse(version.trim())
            .map_err(|err| ComparatorError::new(version, err.to_string()))
    }
}

impl VersionOrder for SemverOrder {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering, ComparatorError> {
        Ok(Self::parse(a)?.cmp(&Self::parse(b)?))
    }
}

/// Ordering for free-form distribution versions such as `1.2.3`, `1.0-rc1`, `1:4.2-3` or
/// `2024.01.05`, using [`version_compare`].
///
/// Numeric components compare numerically and trailing zero components are insignificant.
/// Strings without any alphanumeric component are rejected.
pub struct GenericOrder;

impl GenericOrder {
    fn parse(version: &str) -> Result<Version<'_>, ComparatorError> {
        if !version.chars().any(char::is_alphanumeric) {
            return Err(ComparatorError::new(version, "no version components"));
        }
        Version::from(version).ok_or_else(|| ComparatorError::new(version, "unparseable version"))
    }
}

impl VersionOrder for GenericOrder {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering, ComparatorError> {
        let left = Self::parse(a)?;
        let right = Self::parse(b)?;
        left
            .partial_cmp(&right)
            .ok_or_else(|| ComparatorError::new(a, format!("not comparable to `{b}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        GenericOrder.compare(a, b).unwrap()
    }

    #[test]
    fn test_generic_numeric() {
        assert_eq!(cmp("1.2", "1.3"), Ordering::Less);
        assert_eq!(cmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(cmp("1.0", "1"), Ordering::Equal);
        assert_eq!(cmp("1.3", "1.3.0"), Ordering::Equal);
        assert_eq!(cmp("2024.01.05", "2023.12.31"), Ordering::Greater);
    }

    #[test]
    fn test_generic_text_components() {
        assert_eq!(cmp("1.0-alpha", "1.0-beta"), Ordering::Less);
    }

    #[test]
    fn test_generic_separators() {
        assert_eq!(cmp("1:4.2-3", "1:4.2-2"), Ordering::Greater);
        assert_eq!(cmp("1_2_3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn test_generic_rejects_empty() {
        assert!(GenericOrder.compare("", "1.0").is_err());
        assert!(GenericOrder.compare("1.0", "-.-").is_err());
        assert!(GenericOrder.check("1.0").is_ok());
        assert!(!GenericOrder.is_newer("", "1.0"));
    }

    #[test]
    fn test_semver() {
        assert_eq!(
            SemverOrder.compare("1.2.3", "1.10.0").unwrap(),
            Ordering::Less
        );
        assert_eq!(
            SemverOrder.compare("1.0.0-rc.1", "1.0.0").unwrap(),
            Ordering::Less
        );
        assert!(SemverOrder.compare("1.2", "1.2.0").is_err());
        assert!(SemverOrder.is_newer("2.0.0", "1.9.9"));
    }

    #[test]
    fn test_scheme_from_command_line() {
        assert_eq!(
            VersionScheme::from_str("semver", true),
            Ok(VersionScheme::Semver)
        );
        assert_eq!(
            VersionScheme::from_str("generic", true),
            Ok(VersionScheme::Generic)
        );
        assert!(VersionScheme::from_str("libversion", true).is_err());
    }

    #[test]
    fn test_scheme_selects_order() {
        assert!(VersionScheme::Semver.order().check("1.2").is_err());
        assert!(VersionScheme::Generic.order().check("1.2").is_ok());
    }
}
