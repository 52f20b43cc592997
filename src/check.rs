// Copyright (C) 2026 by GiGa infosystems

//! A single check: build a snapshot, diff it against the previous one and record it.

use crate::diff::StatusDiff;
use crate::status::{DistroPackageStatus, LocalPackage, ReconcileContext};
use crate::store::{CheckRecord, HistoryStore, StoreError};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The result of [`run_check`]
#[derive(Debug)]
pub struct CheckOutcome {
    pub snapshot: DistroPackageStatus,
    /// `None` on the first check, as there is nothing to compare against
    pub diff: Option<StatusDiff>,
    pub record: CheckRecord,
}

/// The key for a check started at `now`.
///
/// Snapshots are keyed by the second, so a check within the same second as (or, with a skewed
/// clock, before) the latest one is moved just past it.
pub fn next_check_timestamp(latest: Option<i64>, now: i64) -> i64 {
    match latest {
        Some(latest) if latest >= now => {
            debug!("Moving check from {now} past the latest check at {latest}");
            latest + 1
        }
        _ => now,
    }
}

/// Run a full check at `timestamp`.
///
/// The check only succeeds if the snapshot got recorded in `store`.
pub fn run_check(
    ctx: &ReconcileContext,
    local_packages: &[LocalPackage],
    ignored: &BTreeSet<String>,
    store: &mut dyn HistoryStore,
    timestamp: i64,
) -> Result<CheckOutcome, StoreError> {
    let snapshot = ctx.build(local_packages, ignored);

    let diff = match store.latest()? {
        Some((previous_timestamp, previous)) => {
            info!("Comparing against the check at {previous_timestamp}");
            Some(StatusDiff::between(&previous, &snapshot, &*ctx.order))
        }
        None => {
            info!("No previous check found, this check becomes the baseline");
            None
        }
    };

    let record = CheckRecord {
        timestamp,
        total_package_count: snapshot.packages.len(),
        out_of_date_count: snapshot.count_out_of_date(&*ctx.order),
    };
    store.append(&snapshot, &record)?;

    Ok(CheckOutcome {
        snapshot,
        diff,
        record,
    })
}
