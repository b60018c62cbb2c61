//! Release tracking and reconciliation for GitHub-distributed packages
//!
//! Tracks a set of GitHub repositories, resolves their latest stable and
//! pre-release tracks, and compares each track against locally installed
//! packages to decide whether an update, downgrade, or nothing is pending.
//!
//! # Modules
//!
//! - [`config`]: Default repository constants and data-directory paths
//! - [`download`]: Streaming artifact download with progress reporting
//! - [`error`]: Error types for the storage, API, download, and update layers
//! - [`github`]: GitHub REST API client and response models
//! - [`identity`]: Per-track package identity resolution with global fallback
//! - [`inventory`]: Installed-package queries, artifact inspection, install hooks
//! - [`reconcile`]: Reconciliation engine producing per-repository snapshots
//! - [`repos`]: Tracked-repository and credential management flows
//! - [`store`]: SQLite persistence for repositories and credentials
//! - [`track`]: Release-to-track resolution (first stable, first pre-release)
//! - [`update`]: Update orchestration from asset selection to install decision
//! - [`version`]: Lenient version-string comparator

pub mod config;
pub mod download;
pub mod error;
pub mod github;
pub mod identity;
pub mod inventory;
pub mod reconcile;
pub mod repos;
pub mod store;
pub mod track;
pub mod update;
pub mod version;
