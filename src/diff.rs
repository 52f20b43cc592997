// Copyright (C) 2026 by GiGa infosystems

//! Generate a diff between two [`DistroPackageStatus`]es, see [`StatusDiff::between`].

use crate::status::{DistroPackage, DistroPackageStatus, UpstreamStatus};
use crate::version::VersionOrder;
use serde::Serialize;
use std::collections::HashMap;

/// The transitions of packages between two snapshots.
///
/// All lists are package names in the order of the newer snapshot. A package can show up in more
/// than one list (e.g. if it got updated both locally and upstream), except for `new_packages`.
/// Packages that got removed are not reported.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct StatusDiff {
    /// Packages without a counterpart of the same name in the old snapshot
    pub new_packages: Vec<String>,
    /// Packages whose local version increased
    pub locally_updated_packages: Vec<String>,
    /// Packages whose upstream version increased, including packages that are now found
    /// upstream but weren't before
    pub upstream_updated_packages: Vec<String>,
    /// Packages that are out of date now, but weren't before
    pub newly_out_of_date_packages: Vec<String>,
}

/// Whether the upstream version of `new` is strictly greater than the one of `old`.
///
/// Missing upstream versions (rolling or not found) sort below every found version.
fn upstream_increased(order: &dyn VersionOrder, new: &UpstreamStatus, old: &UpstreamStatus) -> bool {
    match (new.version(), old.version()) {
        (Some(new), Some(old)) => order.is_newer(new, old),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

impl StatusDiff {
    /// Returns the transitions of packages from `old` to `new`
    pub fn between(
        old: &DistroPackageStatus,
        new: &DistroPackageStatus,
        order: &dyn VersionOrder,
    ) -> Self {
        let old_packages = old
            .packages
            .iter()
            .map(|package| (package.name.as_str(), package))
            .collect::<HashMap<&str, &DistroPackage>>();

        let mut diff = StatusDiff::default();

        for package in &new.packages {
            let Some(old_package) = old_packages.get(package.name.as_str()) else {
                diff.new_packages.push(package.name.clone());
                continue;
            };

            if order.is_newer(&package.version, &old_package.version) {
                diff.locally_updated_packages.push(package.name.clone());
            }

            if upstream_increased(order, &package.upstream, &old_package.upstream) {
                diff.upstream_updated_packages.push(package.name.clone());
            }

            if package.is_out_of_date(order) && !old_package.is_out_of_date(order) {
                diff.newly_out_of_date_packages.push(package.name.clone());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.new_packages.is_empty()
            && self.locally_updated_packages.is_empty()
            && self.upstream_updated_packages.is_empty()
            && self.newly_out_of_date_packages.is_empty()
    }
}
