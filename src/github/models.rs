//! Response models for the GitHub REST API

use serde::Deserialize;

/// A downloadable release asset.
///
/// `api_url` requires a bearer token and serves the asset bytes when
/// requested with `Accept: application/octet-stream`; `browser_download_url`
/// works unauthenticated for public repositories.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReleaseAsset {
    pub id: i64,
    pub name: String,
    #[serde(rename = "url")]
    pub api_url: String,
    pub browser_download_url: String,
    pub content_type: Option<String>,
    pub size: i64,
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub prerelease: bool,
    pub published_at: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepoOwner {
    pub login: String,
    pub avatar_url: String,
}

/// Repository metadata fetched when a repository is first added.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepoDetails {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "private")]
    pub is_private: bool,
    pub html_url: String,
    pub owner: RepoOwner,
}

/// Identity of the user a token authenticates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub avatar_url: String,
    pub email: Option<String>,
    pub name: Option<String>,
}
