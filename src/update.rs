//! Update orchestration
//!
//! Drives one user-triggered download: resolves the asset URL, streams the
//! download, inspects the artifact for its true package identity, persists
//! the corrected mapping and decides between install, raw install and a
//! downgrade-blocking uninstall prompt.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::download::{Downloader, ProgressFn};
use crate::error::UpdateError;
use crate::inventory::{ArtifactInspector, Installer, PackageInventory};
use crate::store::{Store, TrackedRepository};
use crate::track::Track;

/// Decision reached by an update run
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The installer was launched for the downloaded file. Identity fields
    /// are `None` when artifact inspection failed and the raw file was
    /// installed without a mapping correction.
    Installing {
        file: PathBuf,
        package_id: Option<String>,
        version_code: Option<i64>,
    },
    /// The artifact is older than what is installed; an uninstall of the
    /// existing package was requested instead of an install.
    DowngradeBlocked {
        file: PathBuf,
        package_id: String,
        installed_code: i64,
        artifact_code: i64,
    },
}

pub struct UpdateOrchestrator {
    store: Arc<Store>,
    downloader: Arc<dyn Downloader>,
    inventory: Arc<dyn PackageInventory>,
    inspector: Arc<dyn ArtifactInspector>,
    installer: Arc<dyn Installer>,
}

impl UpdateOrchestrator {
    pub fn new(
        store: Arc<Store>,
        downloader: Arc<dyn Downloader>,
        inventory: Arc<dyn PackageInventory>,
        inspector: Arc<dyn ArtifactInspector>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            store,
            downloader,
            inventory,
            inspector,
            installer,
        }
    }

    /// Downloads the chosen track's asset and decides how to proceed.
    ///
    /// The corrected track-to-package mapping is persisted before the
    /// install decision, so the next reconciliation pass sees the true
    /// identity even if the install is aborted.
    pub async fn run(
        &self,
        repo: &TrackedRepository,
        track: &Track,
        on_progress: &ProgressFn,
    ) -> Result<UpdateOutcome, UpdateError> {
        let Some(asset) = track.asset.as_ref() else {
            return Err(UpdateError::MissingAsset(track.kind.as_str().to_string()));
        };

        let token = repo
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty());

        // Authenticated downloads must go through the API asset URL; the
        // browser URL only works for public repositories.
        let url = if token.is_some() {
            &asset.api_url
        } else {
            &asset.browser_download_url
        };

        info!("Downloading {} from {}", asset.name, url);
        let file = self
            .downloader
            .download(url, &asset.name, token, on_progress)
            .await?;

        let Some(artifact) = self.inspector.inspect(&file) else {
            warn!("Could not inspect {:?}, installing as-is", file);
            self.installer.launch_install(&file);
            return Ok(UpdateOutcome::Installing {
                file,
                package_id: None,
                version_code: None,
            });
        };

        debug!(
            "Artifact identity: {} (code {})",
            artifact.package_id, artifact.version_code
        );

        self.store
            .set_track_package(repo.id, track.kind.as_str(), &artifact.package_id)?;
        self.store
            .set_global_package_if_blank(repo.id, &artifact.package_id)?;

        let installed_code = self
            .inventory
            .query_installed(&artifact.package_id)
            .and_then(|p| p.version_code)
            .unwrap_or(0);

        if installed_code > 0 && artifact.version_code < installed_code {
            warn!(
                "Downgrade detected for {}: artifact code {} < installed code {}",
                artifact.package_id, artifact.version_code, installed_code
            );
            self.installer.request_uninstall(&artifact.package_id);
            return Ok(UpdateOutcome::DowngradeBlocked {
                file,
                package_id: artifact.package_id,
                installed_code,
                artifact_code: artifact.version_code,
            });
        }

        self.installer.launch_install(&file);
        Ok(UpdateOutcome::Installing {
            file,
            package_id: Some(artifact.package_id),
            version_code: Some(artifact.version_code),
        })
    }
}
