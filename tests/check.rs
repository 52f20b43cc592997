// Copyright (C) 2026 by GiGa infosystems

use std::fs;
use std::path::Path;

use distro_statusdiff::check::{CheckOutcome, run_check};
use distro_statusdiff::config::Config;
use distro_statusdiff::foreign::{ChangeStatus, ForeignRepository};
use distro_statusdiff::report::Report;
use distro_statusdiff::status::{UpstreamStatus, load_local_packages};
use distro_statusdiff::store::{HistoryStore, MemoryStore, SqliteStore, StoreError};

const CONFIG: &str = r#"
distro_name: Managarm
database: packages.db
local_packages: packages.yml
rules: distro-rules.yml
ignored_packages: [ignored-pkg]
repositories:
  - name: A
    index: a.json
  - name: B
    index: b.json
"#;

const PACKAGES: &str = r#"
- name: libfoo-dev
  version: "1.2"
  maintainer: Jane Doe <jane@example.org>
- name: pkg-x
  version: "1.0"
  file: bootstrap.d/x.yml
  line: 12
  maintainer: ops@example.org
- name: kernel
  version: ROLLING_ID
- name: internal-tool
  version: "0.1"
- name: ignored-pkg
  version: "0.1"
- name: libbar
  version: "0.3"
"#;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn setup(dir: &Path) {
    write(dir, "tracker.yml", CONFIG);
    write(dir, "packages.yml", PACKAGES);
    write(
        dir,
        "distro-rules.yml",
        "internal-tool:\n  action: ignore\nlibfoo-dev:\n  action: alias\n  alias: libfoo\n",
    );
    write(
        dir,
        "a.json",
        r#"{"packages": {"libfoo": {"version": "1.2"}, "pkg-x": {"version": "1.0"}, "kernel": {"version": "6.1"}}}"#,
    );
    write(
        dir,
        "b.json",
        r#"{"packages": {"libfoo": {"version": "1.3"}, "internal-tool": {"version": "9.9"}}}"#,
    );
}

fn check(dir: &Path, store: &mut dyn HistoryStore, timestamp: i64) -> Result<CheckOutcome, StoreError> {
    let config = Config::load(&dir.join("tracker.yml")).unwrap();
    let local_packages = load_local_packages(&config.local_packages).unwrap();
    let repositories = config.load_repositories().unwrap();
    for repository in &repositories {
        repository.ingest(store)?;
    }

    let repositories = repositories
        .into_iter()
        .map(|repository| Box::new(repository) as Box<dyn ForeignRepository>)
        .collect();
    let ctx = config.reconcile_context(repositories).unwrap();
    run_check(
        &ctx,
        &local_packages,
        &config.ignored_packages,
        store,
        timestamp,
    )
}

#[test]
fn first_check_becomes_baseline() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let mut store = SqliteStore::open(&dir.path().join("packages.db")).unwrap();
    let outcome = check(dir.path(), &mut store, 1000).unwrap();
    assert!(outcome.diff.is_none());

    let names = outcome
        .snapshot
        .packages
        .iter()
        .map(|package| package.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["libfoo-dev", "pkg-x", "kernel", "libbar"]);

    let libfoo = outcome.snapshot.package("libfoo-dev").unwrap();
    assert_eq!(
        libfoo.upstream,
        UpstreamStatus::Found {
            version: "1.3".to_owned(),
            repository: "B".to_owned()
        }
    );
    assert_eq!(
        outcome.snapshot.package("kernel").unwrap().upstream,
        UpstreamStatus::Rolling
    );
    assert_eq!(
        outcome.snapshot.package("libbar").unwrap().upstream,
        UpstreamStatus::NotFound
    );
    assert_eq!(outcome.record.total_package_count, 4);
    assert_eq!(outcome.record.out_of_date_count, 1);

    let (timestamp, latest) = store.latest().unwrap().unwrap();
    assert_eq!(timestamp, 1000);
    assert_eq!(latest, outcome.snapshot);
}

#[test]
fn second_check_produces_diff() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    {
        let mut store = SqliteStore::open(&dir.path().join("packages.db")).unwrap();
        check(dir.path(), &mut store, 1000).unwrap();
    }

    write(
        dir.path(),
        "a.json",
        r#"{"packages": {"libfoo": {"version": "1.2"}, "pkg-x": {"version": "1.1"}, "kernel": {"version": "6.2"}}}"#,
    );
    write(
        dir.path(),
        "packages.yml",
        &format!("{PACKAGES}- name: libnew\n  version: \"2.0\"\n"),
    );

    let mut store = SqliteStore::open(&dir.path().join("packages.db")).unwrap();
    let outcome = check(dir.path(), &mut store, 2000).unwrap();
    let diff = outcome.diff.as_ref().unwrap();

    assert_eq!(diff.new_packages, ["libnew"]);
    assert_eq!(diff.upstream_updated_packages, ["pkg-x"]);
    assert_eq!(diff.newly_out_of_date_packages, ["pkg-x"]);
    assert!(diff.locally_updated_packages.is_empty());

    let records = store.recent_check_records(5).unwrap();
    assert_eq!(
        records
            .iter()
            .map(|record| record.timestamp)
            .collect::<Vec<_>>(),
        [2000, 1000]
    );
    assert_eq!(records[0].out_of_date_count, 2);

    let config = Config::load(&dir.path().join("tracker.yml")).unwrap();
    let locals = load_local_packages(&config.local_packages).unwrap();
    let report = Report::new(
        &config.distro_name,
        &outcome,
        &locals,
        records,
        Vec::new(),
        &*config.version_scheme.order(),
    );
    assert_eq!(report.maintainer_updates["ops@example.org"][0].package, "pkg-x");
    assert_eq!(
        report.diff.unwrap().newly_out_of_date_packages[0].file.as_deref(),
        Some("bootstrap.d/x.yml")
    );
}

#[test]
fn older_timestamp_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let mut store = SqliteStore::open(&dir.path().join("packages.db")).unwrap();
    check(dir.path(), &mut store, 2000).unwrap();
    assert!(matches!(
        check(dir.path(), &mut store, 1000),
        Err(StoreError::NonMonotonic { .. })
    ));
    assert_eq!(store.recent_check_records(5).unwrap().len(), 1);
}

#[test]
fn dry_run_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let sqlite = SqliteStore::open(&dir.path().join("packages.db")).unwrap();
    check(dir.path(), &mut MemoryStore::seeded_from(&sqlite, 5).unwrap(), 1000).unwrap();
    assert!(sqlite.latest().unwrap().is_none());

    let mut sqlite = sqlite;
    check(dir.path(), &mut sqlite, 1000).unwrap();

    let mut dry = MemoryStore::seeded_from(&sqlite, 5).unwrap();
    let outcome = check(dir.path(), &mut dry, 2000).unwrap();
    assert!(outcome.diff.unwrap().is_empty());
    assert_eq!(sqlite.recent_check_records(5).unwrap().len(), 1);
}

#[test]
fn foreign_changes_are_tracked() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let config = Config::load(&dir.path().join("tracker.yml")).unwrap();
    let mut store = SqliteStore::open(&config.database).unwrap();

    let repositories = config.load_repositories().unwrap();
    let first = repositories[0].ingest(&mut store).unwrap();
    assert_eq!(first.repository, "A");
    assert_eq!(first.packages.len(), 3);

    write(
        dir.path(),
        "a.json",
        r#"{"packages": {"libfoo": {"version": "1.2"}, "pkg-x": {"version": "1.1"}, "kernel": {"version": "6.1"}}}"#,
    );
    let repositories = config.load_repositories().unwrap();
    let second = repositories[0].ingest(&mut store).unwrap();
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.packages.len(), 1);
    assert_eq!(second.packages[0].name, "pkg-x");
    assert_eq!(second.packages[0].change_status, ChangeStatus::Updated);
}
