// Copyright (C) 2026 by GiGa infosystems

//! Durable history of snapshots & check records, see [`HistoryStore`].
//!
//! Snapshots are keyed by the unix timestamp of the check that produced them. History is
//! append-only: nothing ever rewrites or deletes a stored snapshot.

use crate::foreign::{ForeignPackage, classify_changes};
use crate::status::DistroPackageStatus;
use chrono::DateTime;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info};

/// The persistence layer failed, which is fatal to a check
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to (de)serialize a snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("a different snapshot was already recorded at timestamp {timestamp}")]
    Conflict { timestamp: i64 },
    #[error("timestamp {timestamp} is older than the latest recorded check at {latest}")]
    NonMonotonic { timestamp: i64, latest: i64 },
}

/// Summary metadata of a single check
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub total_package_count: usize,
    pub out_of_date_count: usize,
}

impl CheckRecord {
    /// The day of the check as `dd/mm/yyyy` (UTC)
    pub fn date(&self) -> String {
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|time| time.format("%d/%m/%Y").to_string())
            .unwrap_or_default()
    }
}

/// Storage for the history of checks
pub trait HistoryStore {
    /// Append a snapshot together with its [`CheckRecord`], keyed by `record.timestamp`.
    ///
    /// Either both get stored or neither. Appending identical data for an existing timestamp
    /// again does nothing.
    fn append(
        &mut self,
        snapshot: &DistroPackageStatus,
        record: &CheckRecord,
    ) -> Result<(), StoreError>;

    /// The most recent snapshot with its timestamp, or `None` before the first check
    fn latest(&self) -> Result<Option<(i64, DistroPackageStatus)>, StoreError>;

    /// Up to `limit` check records, newest first
    fn recent_check_records(&self, limit: usize) -> Result<Vec<CheckRecord>, StoreError>;

    /// Replace the recorded state of a foreign repository, returning every package of `packages`
    /// classified against the previously recorded state.
    fn record_foreign_state(
        &mut self,
        repository: &str,
        packages: &BTreeMap<String, String>,
    ) -> Result<Vec<ForeignPackage>, StoreError>;
}

/// Checks shared by all stores before appending at `timestamp`.
///
/// Returns `true` if the exact same data is already stored, in which case the append is a no-op.
fn check_append<T: PartialEq>(
    timestamp: i64,
    latest: Option<i64>,
    existing: Option<T>,
    new: T,
) -> Result<bool, StoreError> {
    match existing {
        Some(existing) if existing == new => Ok(true),
        Some(_) => Err(StoreError::Conflict { timestamp }),
        None => match latest {
            Some(latest) if latest > timestamp => {
                Err(StoreError::NonMonotonic { timestamp, latest })
            }
            _ => Ok(false),
        },
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    unix_timestamp INTEGER PRIMARY KEY,
    status_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS check_records (
    unix_timestamp INTEGER PRIMARY KEY,
    total_package_count INTEGER NOT NULL,
    out_of_date_count INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS foreign_packages (
    repository TEXT NOT NULL,
    package TEXT NOT NULL,
    version TEXT NOT NULL,
    PRIMARY KEY (repository, package)
);
";

/// A [`HistoryStore`] in a SQLite database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening history database at {path:?}");
        Self::init(Connection::open(path)?)
    }

    /// Open an existing database without creating or migrating anything, e.g. to seed a dry run.
    ///
    /// Appending to a read-only store fails.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        info!("Opening history database at {path:?} read-only");
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(SqliteStore { conn })
    }

    /// A database that only lives as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // Readers of the database must only ever see complete checks
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!("SQLite journal mode: {mode}");
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn })
    }
}

impl HistoryStore for SqliteStore {
    fn append(
        &mut self,
        snapshot: &DistroPackageStatus,
        record: &CheckRecord,
    ) -> Result<(), StoreError> {
        let timestamp = record.timestamp;
        let status_json = serde_json::to_string(snapshot)?;
        let counts = (
            record.total_package_count as i64,
            record.out_of_date_count as i64,
        );

        let tx = self.conn.transaction()?;

        let latest: Option<i64> =
            tx.query_row("SELECT MAX(unix_timestamp) FROM snapshots", [], |row| {
                row.get(0)
            })?;
        let existing_json: Option<String> = tx
            .query_row(
                "SELECT status_json FROM snapshots WHERE unix_timestamp = ?1",
                [timestamp],
                |row| row.get(0),
            )
            .optional()?;
        let existing_counts: Option<(i64, i64)> = tx
            .query_row(
                "SELECT total_package_count, out_of_date_count FROM check_records
                 WHERE unix_timestamp = ?1",
                [timestamp],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let existing = (existing_json.is_some() || existing_counts.is_some())
            .then_some((existing_json, existing_counts));
        if check_append(
            timestamp,
            latest,
            existing,
            (Some(status_json.clone()), Some(counts)),
        )? {
            debug!("Check at {timestamp} was already recorded");
            return Ok(());
        }

        tx.execute(
            "INSERT INTO snapshots (unix_timestamp, status_json) VALUES (?1, ?2)",
            params![timestamp, status_json],
        )?;
        tx.execute(
            "INSERT INTO check_records (unix_timestamp, total_package_count, out_of_date_count)
             VALUES (?1, ?2, ?3)",
            params![timestamp, counts.0, counts.1],
        )?;
        tx.commit()?;

        info!(
            "Recorded check at {timestamp} with {} packages",
            snapshot.packages.len()
        );
        Ok(())
    }

    fn latest(&self) -> Result<Option<(i64, DistroPackageStatus)>, StoreError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT unix_timestamp, status_json FROM snapshots
                 ORDER BY unix_timestamp DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(timestamp, json)| Ok::<_, StoreError>((timestamp, serde_json::from_str(&json)?)))
            .transpose()
    }

    fn recent_check_records(&self, limit: usize) -> Result<Vec<CheckRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT unix_timestamp, total_package_count, out_of_date_count FROM check_records
             ORDER BY unix_timestamp DESC LIMIT ?1",
        )?;

        let records = stmt
            .query_map([limit as i64], |row| {
                Ok(CheckRecord {
                    timestamp: row.get(0)?,
                    total_package_count: row.get::<_, i64>(1)? as usize,
                    out_of_date_count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn record_foreign_state(
        &mut self,
        repository: &str,
        packages: &BTreeMap<String, String>,
    ) -> Result<Vec<ForeignPackage>, StoreError> {
        let tx = self.conn.transaction()?;

        let mut recorded = {
            let mut stmt =
                tx.prepare("SELECT package, version FROM foreign_packages WHERE repository = ?1")?;
            let recorded = stmt
                .query_map([repository], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<BTreeMap<String, String>, _>>()?;
            recorded
        };

        let classified = classify_changes(&mut recorded, packages);

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO foreign_packages (repository, package, version)
                 VALUES (?1, ?2, ?3)",
            )?;
            for package in &classified {
                if package.change_status != crate::foreign::ChangeStatus::Unchanged {
                    stmt.execute(params![repository, package.name, package.version])?;
                }
            }
        }

        tx.commit()?;
        Ok(classified)
    }
}

/// A [`HistoryStore`] that lives in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: BTreeMap<i64, DistroPackageStatus>,
    check_records: BTreeMap<i64, CheckRecord>,
    foreign: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Copy the latest snapshot and the recent check records of another store, e.g. to run a
    /// check without persisting anything
    pub fn seeded_from(other: &dyn HistoryStore, limit: usize) -> Result<Self, StoreError> {
        let mut store = MemoryStore::default();
        if let Some((timestamp, snapshot)) = other.latest()? {
            store.snapshots.insert(timestamp, snapshot);
        }
        store.check_records = other
            .recent_check_records(limit)?
            .into_iter()
            .map(|record| (record.timestamp, record))
            .collect();
        Ok(store)
    }
}

impl HistoryStore for MemoryStore {
    fn append(
        &mut self,
        snapshot: &DistroPackageStatus,
        record: &CheckRecord,
    ) -> Result<(), StoreError> {
        let timestamp = record.timestamp;
        let latest = self.snapshots.keys().next_back().copied();
        let stored = (
            self.snapshots.get(&timestamp),
            self.check_records.get(&timestamp),
        );
        let existing = (stored != (None, None)).then_some(stored);

        if check_append(timestamp, latest, existing, (Some(snapshot), Some(record)))? {
            return Ok(());
        }

        self.snapshots.insert(timestamp, snapshot.clone());
        self.check_records.insert(timestamp, *record);
        Ok(())
    }

    fn latest(&self) -> Result<Option<(i64, DistroPackageStatus)>, StoreError> {
        Ok(self
            .snapshots
            .last_key_value()
            .map(|(timestamp, snapshot)| (*timestamp, snapshot.clone())))
    }

    fn recent_check_records(&self, limit: usize) -> Result<Vec<CheckRecord>, StoreError> {
        Ok(self.check_records.values().rev().take(limit).copied().collect())
    }

    fn record_foreign_state(
        &mut self,
        repository: &str,
        packages: &BTreeMap<String, String>,
    ) -> Result<Vec<ForeignPackage>, StoreError> {
        let recorded = self.foreign.entry(repository.to_owned()).or_default();
        Ok(classify_changes(recorded, packages))
    }
}
