//! Release reconciliation
//!
//! One pass walks every tracked repository in stored order, fetches its
//! releases, resolves tracks and compares each track against the installed
//! package it maps to. Results are published as one complete snapshot; a
//! fetch failure is captured in that repository's state and never aborts
//! the rest of the pass.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_REPO_AVATAR_URL, DEFAULT_REPO_NAME, DEFAULT_REPO_OWNER, DEFAULT_REPO_PACKAGE,
};
use crate::error::StoreError;
use crate::github::client::ReleaseSource;
use crate::identity::resolve_package_id;
use crate::inventory::{InstalledPackageInfo, PackageInventory};
use crate::store::{Store, TrackedRepository};
use crate::track::{Track, resolve_tracks};
use crate::version::compare_versions;

/// Status of a track relative to the installed package it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// This exact version is installed
    Installed,
    /// Newer than installed, or not installed at all
    Update,
    /// Older than installed
    Old,
    /// Package identity could not be resolved
    Unknown,
}

/// A resolved track together with its computed status
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    pub track: Track,
    /// Package identifier the track was compared against, if resolved
    pub package_id: Option<String>,
    pub status: TrackStatus,
}

/// Immutable per-repository reconciliation result
#[derive(Debug, Clone, PartialEq)]
pub struct RepoState {
    pub repo: TrackedRepository,
    pub installed: Vec<InstalledPackageInfo>,
    pub tracks: Vec<TrackState>,
    /// True iff some installed package's version is >= the highest
    /// version across all resolved tracks
    pub is_up_to_date: bool,
    pub error: Option<String>,
}

/// Compute a track's status relative to the installed package it maps to.
///
/// Version codes win whenever both sides expose one; the string comparator
/// is only a fallback. An unresolved package identity is always `Unknown`,
/// and a resolved-but-not-installed package is an available `Update`.
pub fn track_status(
    track: &Track,
    package_id: Option<&str>,
    installed: Option<&InstalledPackageInfo>,
) -> TrackStatus {
    if package_id.is_none() {
        return TrackStatus::Unknown;
    }
    let Some(installed) = installed else {
        return TrackStatus::Update;
    };

    let ordering = match (track.version_code, installed.version_code) {
        (Some(release_code), Some(installed_code)) => release_code.cmp(&installed_code),
        _ => compare_versions(&track.version, &installed.version_name),
    };

    match ordering {
        Ordering::Greater => TrackStatus::Update,
        Ordering::Less => TrackStatus::Old,
        Ordering::Equal => TrackStatus::Installed,
    }
}

/// Drives reconciliation passes over the tracked-repository set
pub struct ReconcileEngine {
    store: Arc<Store>,
    source: Arc<dyn ReleaseSource>,
    inventory: Arc<dyn PackageInventory>,
    in_flight: AtomicBool,
}

impl ReconcileEngine {
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn ReleaseSource>,
        inventory: Arc<dyn PackageInventory>,
    ) -> Self {
        Self {
            store,
            source,
            inventory,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one reconciliation pass, or returns `Ok(None)` when a pass is
    /// already in flight. Triggers while running are coalesced instead of
    /// cancelling, preserving the atomic-snapshot guarantee.
    pub async fn try_refresh(&self) -> Result<Option<Vec<RepoState>>, StoreError> {
        if self
            .in_flight
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_err()
        {
            debug!("Reconciliation already running, coalescing trigger");
            return Ok(None);
        }

        let result = self.refresh_inner().await;
        self.in_flight.store(false, AtomicOrdering::Release);
        result.map(Some)
    }

    async fn refresh_inner(&self) -> Result<Vec<RepoState>, StoreError> {
        self.ensure_default()?;

        let repos = self.store.all_repositories()?;
        info!("Reconciling {} repositories", repos.len());

        let mut states = Vec::with_capacity(repos.len());
        for repo in repos {
            states.push(self.reconcile_repo(repo).await);
        }

        Ok(states)
    }

    /// Seeds the protected default repository if it is missing. Idempotent,
    /// guarded by a presence check on the tracked set.
    fn ensure_default(&self) -> Result<(), StoreError> {
        if self
            .store
            .find_repository(DEFAULT_REPO_OWNER, DEFAULT_REPO_NAME)?
            .is_some()
        {
            return Ok(());
        }

        info!(
            "Default repository missing, seeding {}/{}",
            DEFAULT_REPO_OWNER, DEFAULT_REPO_NAME
        );
        self.store.insert_repository(&TrackedRepository {
            id: 0,
            owner: DEFAULT_REPO_OWNER.to_string(),
            name: DEFAULT_REPO_NAME.to_string(),
            package_id: DEFAULT_REPO_PACKAGE.to_string(),
            display_name: DEFAULT_REPO_NAME.to_string(),
            owner_avatar_url: Some(DEFAULT_REPO_AVATAR_URL.to_string()),
            access_token: None,
            last_checked_version: None,
            track_package_ids: indexmap::IndexMap::new(),
        })?;
        Ok(())
    }

    async fn reconcile_repo(&self, mut repo: TrackedRepository) -> RepoState {
        debug!("Reconciling {}", repo.full_path());

        // Union of every mapped package id plus the global one, deduplicated.
        let mut package_ids: Vec<String> = Vec::new();
        for id in repo.track_package_ids.values() {
            if !id.trim().is_empty() && !package_ids.contains(id) {
                package_ids.push(id.clone());
            }
        }
        if !repo.package_id.trim().is_empty() && !package_ids.contains(&repo.package_id) {
            package_ids.push(repo.package_id.clone());
        }

        let installed: Vec<InstalledPackageInfo> = package_ids
            .iter()
            .filter_map(|id| self.inventory.query_installed(id))
            .collect();

        let releases = match self
            .source
            .fetch_releases(&repo.owner, &repo.name, repo.access_token.as_deref())
            .await
        {
            Ok(releases) => releases,
            Err(e) => {
                warn!("Fetch failed for {}: {}", repo.full_path(), e);
                return RepoState {
                    repo,
                    installed,
                    tracks: Vec::new(),
                    is_up_to_date: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let mut tracks = Vec::new();
        let mut highest_version: Option<String> = None;

        for track in resolve_tracks(&releases) {
            let package_id = resolve_package_id(
                &repo.track_package_ids,
                &repo.package_id,
                track.kind.as_str(),
            );
            let installed_info = package_id
                .as_deref()
                .and_then(|id| installed.iter().find(|p| p.package_id == id));
            let status = track_status(&track, package_id.as_deref(), installed_info);

            debug!(
                "  {}: version '{}' status {:?} package '{}'",
                track.kind.as_str(),
                track.version,
                status,
                package_id.as_deref().unwrap_or("?")
            );

            if highest_version
                .as_deref()
                .is_none_or(|h| compare_versions(&track.version, h) == Ordering::Greater)
            {
                highest_version = Some(track.version.clone());
            }

            tracks.push(TrackState {
                track,
                package_id,
                status,
            });
        }

        // Advisory only; a persistence failure must not fail the pass. A
        // download may be rewriting this row's package mapping concurrently,
        // so only the one column is written, never the whole row.
        if let Some(highest) = highest_version.as_deref()
            && repo.last_checked_version.as_deref() != Some(highest)
        {
            repo.last_checked_version = Some(highest.to_string());
            if let Err(e) = self.store.set_last_checked_version(repo.id, highest) {
                warn!(
                    "Failed to record last checked version for {}: {}",
                    repo.full_path(),
                    e
                );
            }
        }

        let is_up_to_date = match highest_version.as_deref() {
            Some(highest) if !installed.is_empty() => installed
                .iter()
                .any(|p| compare_versions(&p.version_name, highest) != Ordering::Less),
            _ => false,
        };

        RepoState {
            repo,
            installed,
            tracks,
            is_up_to_date,
            error: None,
        }
    }
}
