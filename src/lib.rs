// Copyright (C) 2026 by GiGa infosystems

//! `distro-statusdiff` tracks how the packages of a distribution compare to the versions found in
//! foreign (upstream) repositories, and what changed between two checks.
//!
//! The order of operations is:
//! * Translate names between the distribution and each repository with [`rules::RuleTable`]
//! * Ingest the current data of every [`foreign::MappedRepository`]
//! * Pick the newest upstream version of each package with [`upstream::UpstreamResolver`]
//! * Build a snapshot of all local packages with [`status::ReconcileContext::build`]
//! * Get a diff against the previous snapshot with [`diff::StatusDiff`]
//! * Record the snapshot in a [`store::HistoryStore`] and emit a [`report::Report`]
//!
//! [`check::run_check`] does the last three steps in one go.
//!
//! Versions are only ever compared through a [`version::VersionOrder`], since neither local nor
//! upstream versions follow any single scheme.

pub mod check;
pub mod config;
pub mod diff;
pub mod foreign;
pub mod report;
pub mod rules;
pub mod status;
pub mod store;
pub mod upstream;
pub mod version;
