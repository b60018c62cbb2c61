//! GitHub API client

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{API_TIMEOUT_SECS, CONNECT_TIMEOUT_SECS, USER_AGENT};
use crate::error::ApiError;
use crate::github::models::{Release, RepoDetails, UserProfile};

/// Default base URL for the GitHub API
const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Remote source of release and repository metadata
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetches all releases for a repository, ordered most-recent-first.
    ///
    /// A repository without releases (including a 404 from the releases
    /// endpoint) is an empty list, not an error, so one missing repository
    /// never aborts a whole reconciliation pass.
    async fn fetch_releases(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<Vec<Release>, ApiError>;

    /// Fetches repository metadata for the initial add.
    async fn fetch_repo_details(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<RepoDetails, ApiError>;

    /// Fetches the identity a token authenticates, validating the token.
    async fn fetch_identity(&self, token: &str) -> Result<UserProfile, ApiError>;
}

/// `reqwest`-backed [`ReleaseSource`] implementation
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Creates a new client with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(API_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
        }
    }

    fn get(&self, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubClient {
    async fn fetch_releases(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<Vec<Release>, ApiError> {
        let path = format!("/repos/{owner}/{name}/releases");
        let response = self.get(&path, token).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("No releases endpoint for {}/{}, treating as empty", owner, name);
            return Ok(Vec::new());
        }

        if !status.is_success() {
            warn!("GitHub API returned status {} for {}", status, path);
            return Err(ApiError::Status(status));
        }

        let releases: Vec<Release> = response.json().await.map_err(|e| {
            warn!("Failed to parse releases response: {}", e);
            ApiError::InvalidResponse(e.to_string())
        })?;

        debug!("Fetched {} releases for {}/{}", releases.len(), owner, name);
        Ok(releases)
    }

    async fn fetch_repo_details(
        &self,
        owner: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<RepoDetails, ApiError> {
        let path = format!("/repos/{owner}/{name}");
        let response = self.get(&path, token).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("{owner}/{name}")));
        }

        if !status.is_success() {
            warn!("GitHub API returned status {} for {}", status, path);
            return Err(ApiError::Status(status));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn fetch_identity(&self, token: &str) -> Result<UserProfile, ApiError> {
        let response = self.get("/user", Some(token)).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Token validation failed with status {}", status);
            return Err(ApiError::Status(status));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn fetch_releases_returns_releases_in_api_order() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/app/releases")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"tag_name": "v2.1-rc", "name": "RC", "body": null, "prerelease": true,
                     "published_at": "2024-02-01T00:00:00Z", "assets": []},
                    {"tag_name": "v2.0", "name": null, "body": "notes", "prerelease": false,
                     "published_at": "2024-01-15T00:00:00Z", "assets": [
                        {"id": 1, "name": "app.apk",
                         "url": "https://api.example/assets/1",
                         "browser_download_url": "https://dl.example/app.apk",
                         "content_type": "application/vnd.android.package-archive",
                         "size": 1024}
                     ]}
                ]"#,
            )
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let releases = client.fetch_releases("octo", "app", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag_name, "v2.1-rc");
        assert!(releases[0].prerelease);
        assert_eq!(releases[1].assets[0].name, "app.apk");
        assert_eq!(releases[1].assets[0].api_url, "https://api.example/assets/1");
    }

    #[tokio::test]
    async fn fetch_releases_treats_404_as_empty() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/gone/releases")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let releases = client.fetch_releases("octo", "gone", None).await.unwrap();

        mock.assert_async().await;
        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn fetch_releases_sends_bearer_token_when_present() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/private/releases")
            .match_header("authorization", "Bearer ghp_secret")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        client
            .fetch_releases("octo", "private", Some("ghp_secret"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_releases_returns_error_for_server_failure() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/app/releases")
            .with_status(500)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let result = client.fetch_releases("octo", "app", None).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::Status(_))));
    }

    #[tokio::test]
    async fn fetch_repo_details_returns_not_found_for_404() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/missing")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let result = client.fetch_repo_details("octo", "missing", None).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_repo_details_parses_owner_avatar() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/octo/app")
            .with_status(200)
            .with_body(
                r#"{"name": "app", "full_name": "octo/app", "private": false,
                    "html_url": "https://github.com/octo/app",
                    "owner": {"login": "octo", "avatar_url": "https://avatars.example/octo"}}"#,
            )
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let details = client.fetch_repo_details("octo", "app", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(details.name, "app");
        assert_eq!(details.owner.avatar_url, "https://avatars.example/octo");
        assert!(!details.is_private);
    }

    #[tokio::test]
    async fn fetch_identity_validates_token() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer ghp_valid")
            .with_status(200)
            .with_body(
                r#"{"login": "octo", "avatar_url": "https://avatars.example/octo",
                    "email": null, "name": "Octo Cat"}"#,
            )
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let profile = client.fetch_identity("ghp_valid").await.unwrap();

        mock.assert_async().await;
        assert_eq!(profile.login, "octo");
        assert_eq!(profile.name.as_deref(), Some("Octo Cat"));
    }

    #[tokio::test]
    async fn fetch_identity_rejects_invalid_token() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/user")
            .with_status(401)
            .with_body(r#"{"message": "Bad credentials"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url());
        let result = client.fetch_identity("ghp_bad").await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(ApiError::Status(reqwest::StatusCode::UNAUTHORIZED))
        ));
    }
}
