//! Reconciliation test utilities

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use gitrelease::error::ApiError;
use gitrelease::github::client::ReleaseSource;
use gitrelease::github::models::{Release, ReleaseAsset, RepoDetails, UserProfile};
use gitrelease::inventory::{InstalledPackageInfo, PackageInventory};
use gitrelease::store::{Store, TrackedRepository};

/// Release source scripted per repository. Unscripted repositories resolve
/// to an empty release history, matching a repo with no releases yet.
pub struct FakeReleaseSource {
    scripts: Mutex<HashMap<String, Result<Vec<Release>, String>>>,
}

impl FakeReleaseSource {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_releases(self, owner: &str, name: &str, releases: Vec<Release>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(format!("{owner}/{name}"), Ok(releases));
        self
    }

    pub fn with_error(self, owner: &str, name: &str, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(format!("{owner}/{name}"), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl ReleaseSource for FakeReleaseSource {
    async fn fetch_releases(
        &self,
        owner: &str,
        name: &str,
        _token: Option<&str>,
    ) -> Result<Vec<Release>, ApiError> {
        match self.scripts.lock().unwrap().get(&format!("{owner}/{name}")) {
            Some(Ok(releases)) => Ok(releases.clone()),
            Some(Err(message)) => Err(ApiError::InvalidResponse(message.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_repo_details(
        &self,
        owner: &str,
        name: &str,
        _token: Option<&str>,
    ) -> Result<RepoDetails, ApiError> {
        Err(ApiError::NotFound(format!("{owner}/{name}")))
    }

    async fn fetch_identity(&self, _token: &str) -> Result<UserProfile, ApiError> {
        Err(ApiError::Status(reqwest::StatusCode::UNAUTHORIZED))
    }
}

/// In-memory installed-package inventory
pub struct FakeInventory {
    packages: HashMap<String, InstalledPackageInfo>,
}

impl FakeInventory {
    pub fn empty() -> Self {
        Self {
            packages: HashMap::new(),
        }
    }

    pub fn with_package(mut self, package_id: &str, version: &str, code: Option<i64>) -> Self {
        self.packages.insert(
            package_id.to_string(),
            InstalledPackageInfo {
                package_id: package_id.to_string(),
                version_name: version.to_string(),
                version_code: code,
            },
        );
        self
    }
}

impl PackageInventory for FakeInventory {
    fn query_installed(&self, package_id: &str) -> Option<InstalledPackageInfo> {
        self.packages.get(package_id).cloned()
    }
}

pub fn release(tag: &str, prerelease: bool) -> Release {
    Release {
        tag_name: tag.to_string(),
        name: None,
        body: None,
        prerelease,
        published_at: "2024-01-01T00:00:00Z".to_string(),
        assets: vec![ReleaseAsset {
            id: 1,
            name: "app-release.apk".to_string(),
            api_url: "https://api.example/assets/1".to_string(),
            browser_download_url: "https://dl.example/app-release.apk".to_string(),
            content_type: None,
            size: 1024,
        }],
    }
}

pub fn tracked_repo(store: &Store, owner: &str, name: &str, package_id: &str) -> TrackedRepository {
    let mut repo = TrackedRepository {
        id: 0,
        owner: owner.to_string(),
        name: name.to_string(),
        package_id: package_id.to_string(),
        display_name: name.to_string(),
        owner_avatar_url: None,
        access_token: None,
        last_checked_version: None,
        track_package_ids: indexmap::IndexMap::new(),
    };
    repo.id = store.insert_repository(&repo).unwrap();
    repo
}
