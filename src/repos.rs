//! Tracked-repository and credential management
//!
//! The flows behind the settings surface: adding a repository (with an
//! ordered credential fallback chain), removing one (the default
//! repository is protected), and validating tokens before storing them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::github::client::ReleaseSource;
use crate::github::models::RepoDetails;
use crate::store::{Credential, Store, TrackedRepository};

/// Result of an add-repository attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(TrackedRepository),
    Rejected(String),
}

/// Result of a remove-repository attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The default repository cannot be removed
    Protected,
}

/// Result of an add-credential attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome {
    Added(Credential),
    Rejected(String),
}

pub struct RepoManager {
    store: Arc<Store>,
    source: Arc<dyn ReleaseSource>,
}

impl RepoManager {
    pub fn new(store: Arc<Store>, source: Arc<dyn ReleaseSource>) -> Self {
        Self { store, source }
    }

    /// Resolves a repository against the remote API and starts tracking it.
    ///
    /// Accepts `owner/repo` or a full GitHub URL. Each stored credential is
    /// tried in stored order, then an unauthenticated attempt; the first
    /// success decides which credential the repository is saved with.
    pub async fn add_repository(&self, input: &str) -> Result<AddOutcome, StoreError> {
        let Some((owner, name)) = parse_repo_input(input) else {
            return Ok(AddOutcome::Rejected(
                "invalid repository format, use 'owner/repo' or a GitHub URL".to_string(),
            ));
        };

        if self.store.find_repository(&owner, &name)?.is_some() {
            return Ok(AddOutcome::Rejected(format!(
                "{owner}/{name} is already tracked"
            )));
        }

        let credentials = self.store.all_credentials()?;
        let Some((details, token)) = self.resolve_details(&owner, &name, &credentials).await else {
            return Ok(AddOutcome::Rejected(
                "repository not found or access denied".to_string(),
            ));
        };

        let mut repo = TrackedRepository {
            id: 0,
            owner,
            name,
            package_id: String::new(),
            display_name: details.name,
            owner_avatar_url: Some(details.owner.avatar_url),
            access_token: token,
            last_checked_version: None,
            track_package_ids: indexmap::IndexMap::new(),
        };
        repo.id = self.store.insert_repository(&repo)?;

        info!("Now tracking {}", repo.full_path());
        Ok(AddOutcome::Added(repo))
    }

    /// Ordered fallback chain over the stored credentials, then an
    /// unauthenticated attempt, short-circuiting on the first success.
    async fn resolve_details(
        &self,
        owner: &str,
        name: &str,
        credentials: &[Credential],
    ) -> Option<(RepoDetails, Option<String>)> {
        for credential in credentials {
            match self
                .source
                .fetch_repo_details(owner, name, Some(&credential.access_token))
                .await
            {
                Ok(details) => {
                    debug!("Resolved {}/{} with {}'s token", owner, name, credential.username);
                    return Some((details, Some(credential.access_token.clone())));
                }
                Err(e) => debug!("Credential for {} failed: {}", credential.username, e),
            }
        }

        self.source
            .fetch_repo_details(owner, name, None)
            .await
            .ok()
            .map(|details| (details, None))
    }

    /// Removes a tracked repository unless it is the protected default.
    pub fn remove_repository(&self, repo: &TrackedRepository) -> Result<RemoveOutcome, StoreError> {
        if repo.is_default() {
            warn!("Refusing to remove the default repository");
            return Ok(RemoveOutcome::Protected);
        }

        self.store.delete_repository(repo.id)?;
        info!("Removed {}", repo.full_path());
        Ok(RemoveOutcome::Removed)
    }

    /// Validates a token against the identity endpoint and stores it.
    pub async fn add_credential(&self, token: &str) -> Result<TokenOutcome, StoreError> {
        let profile = match self.source.fetch_identity(token).await {
            Ok(profile) => profile,
            Err(e) => {
                return Ok(TokenOutcome::Rejected(format!("invalid token: {e}")));
            }
        };

        // The identity endpoint hides private emails; fall back to the
        // display name so the credential list still shows something useful.
        let email = profile.email.or(profile.name);
        let credential = self.store.insert_credential(
            token,
            &profile.login,
            Some(profile.avatar_url.as_str()),
            email.as_deref(),
        )?;

        info!("Stored credential for {}", credential.username);
        Ok(TokenOutcome::Added(credential))
    }

    /// Deletes a stored credential, returning whether it existed.
    pub fn remove_credential(&self, token: &str) -> Result<bool, StoreError> {
        self.store.delete_credential(token)
    }
}

/// Parse `owner/repo` shorthand or a full GitHub URL into an (owner, name)
/// pair.
pub fn parse_repo_input(input: &str) -> Option<(String, String)> {
    let input = input.trim();

    if !input.contains("github.com") {
        let mut parts = input.split('/');
        let owner = parts.next()?.trim();
        let name = parts.next()?.trim();
        if parts.next().is_some() || owner.is_empty() || name.is_empty() {
            return None;
        }
        return Some((owner.to_string(), name.to_string()));
    }

    let (_, path) = input.split_once("github.com")?;
    let path = path.trim_start_matches([':', '/']);
    let mut parts = path.split('/');
    let owner = parts.next()?.trim();
    let name = parts.next()?.trim().trim_end_matches(".git");
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}
