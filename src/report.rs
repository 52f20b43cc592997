// Copyright (C) 2026 by GiGa infosystems

//! The data emitted after a check, see [`Report::new`].
//!
//! The binary renders it as JSON or through a template, so everything in here is plain data.

use crate::check::CheckOutcome;
use crate::diff::StatusDiff;
use crate::foreign::ChangeReport;
use crate::status::{DistroPackage, DistroPackageStatus, LocalPackage};
use crate::store::CheckRecord;
use crate::version::VersionOrder;
use chrono::DateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A single package line of a report
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReportRow {
    pub package: String,
    pub version: String,
    pub upstream_version: String,
    pub upstream_repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl From<&DistroPackage> for ReportRow {
    fn from(package: &DistroPackage) -> Self {
        ReportRow {
            package: package.name.clone(),
            version: package.version.clone(),
            upstream_version: package.upstream.display_version().to_owned(),
            upstream_repo: package.upstream.repository().unwrap_or_default().to_owned(),
            file: package.file.clone(),
            line: package.line,
        }
    }
}

/// A previous check, with a human readable date
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct HistoryRow {
    pub date: String,
    #[serde(flatten)]
    pub record: CheckRecord,
}

impl From<CheckRecord> for HistoryRow {
    fn from(record: CheckRecord) -> Self {
        HistoryRow {
            date: record.date(),
            record,
        }
    }
}

/// The categories of a [`StatusDiff`], resolved to rows of the new snapshot
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct DiffSections {
    pub new_packages: Vec<ReportRow>,
    pub locally_updated_packages: Vec<ReportRow>,
    pub upstream_updated_packages: Vec<ReportRow>,
    pub newly_out_of_date_packages: Vec<ReportRow>,
}

impl DiffSections {
    fn new(diff: &StatusDiff, snapshot: &DistroPackageStatus) -> Self {
        let rows = |names: &[String]| {
            names
                .iter()
                .filter_map(|name| snapshot.package(name))
                .map(ReportRow::from)
                .collect::<Vec<_>>()
        };

        DiffSections {
            new_packages: rows(&diff.new_packages),
            locally_updated_packages: rows(&diff.locally_updated_packages),
            upstream_updated_packages: rows(&diff.upstream_updated_packages),
            newly_out_of_date_packages: rows(&diff.newly_out_of_date_packages),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Report {
    pub distro_name: String,
    /// RFC 3339 time of the check
    pub generated_at: String,
    pub total_package_count: usize,
    pub out_of_date_count: usize,
    /// Recent checks, newest first, including this one
    pub history: Vec<HistoryRow>,
    /// `None` on the first check
    pub diff: Option<DiffSections>,
    pub out_of_date: Vec<ReportRow>,
    /// Packages found upstream whose local version is newer
    pub newer_than_upstream: Vec<ReportRow>,
    /// Names of packages without a (non-blank) maintainer
    pub maintainerless: Vec<String>,
    /// Newly out of date packages per maintainer address
    pub maintainer_updates: BTreeMap<String, Vec<ReportRow>>,
    /// Newly out of date packages without a maintainer
    pub maintainerless_updates: Vec<ReportRow>,
    /// Changes per foreign repository since the last ingestion
    pub foreign_changes: Vec<ChangeReport>,
}

/// The address part of a `Name <address>` maintainer, or the whole value otherwise
pub fn maintainer_address(maintainer: &str) -> &str {
    maintainer
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(address, _)| address.trim())
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| maintainer.trim())
}

impl Report {
    pub fn new(
        distro_name: &str,
        outcome: &CheckOutcome,
        local_packages: &[LocalPackage],
        history: Vec<CheckRecord>,
        foreign_changes: Vec<ChangeReport>,
        order: &dyn VersionOrder,
    ) -> Self {
        let snapshot = &outcome.snapshot;

        // The first definition of a package is the one in the snapshot
        let mut maintainers = HashMap::new();
        for local in local_packages {
            let maintainer = local
                .maintainer
                .as_deref()
                .filter(|maintainer| !maintainer.trim().is_empty());
            maintainers.entry(local.name.as_str()).or_insert(maintainer);
        }
        let maintainer_of = |name: &str| maintainers.get(name).copied().flatten();

        let maintainerless = snapshot
            .packages
            .iter()
            .filter(|package| maintainer_of(&package.name).is_none())
            .map(|package| package.name.clone())
            .collect();

        let mut maintainer_updates = BTreeMap::<String, Vec<ReportRow>>::new();
        let mut maintainerless_updates = Vec::new();
        if let Some(ref diff) = outcome.diff {
            for name in &diff.newly_out_of_date_packages {
                let Some(package) = snapshot.package(name) else {
                    continue;
                };
                match maintainer_of(name) {
                    Some(maintainer) => maintainer_updates
                        .entry(maintainer_address(maintainer).to_owned())
                        .or_default()
                        .push(ReportRow::from(package)),
                    None => maintainerless_updates.push(ReportRow::from(package)),
                }
            }
        }

        Report {
            distro_name: distro_name.to_owned(),
            generated_at: DateTime::from_timestamp(outcome.record.timestamp, 0)
                .map(|time| time.to_rfc3339())
                .unwrap_or_default(),
            total_package_count: outcome.record.total_package_count,
            out_of_date_count: outcome.record.out_of_date_count,
            history: history.into_iter().map(HistoryRow::from).collect(),
            diff: outcome
                .diff
                .as_ref()
                .map(|diff| DiffSections::new(diff, snapshot)),
            out_of_date: snapshot
                .out_of_date_packages(order)
                .map(ReportRow::from)
                .collect(),
            newer_than_upstream: snapshot
                .newer_than_upstream(order)
                .map(ReportRow::from)
                .collect(),
            maintainerless,
            maintainer_updates,
            maintainerless_updates,
            foreign_changes,
        }
    }
}
