//! Release tracks
//!
//! A track is the most recent release of one classification: stable
//! ("Release") or pre-release ("Pre-Release"). A repository resolves to at
//! most one track per classification, taken from the API order rather than
//! the global version maximum.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::github::models::{Release, ReleaseAsset};

static VERSION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("valid version code regex"));

/// Classification of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Stable,
    Prerelease,
}

impl TrackKind {
    /// Name used as the key in the repository's track-to-package mapping
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Stable => "Release",
            TrackKind::Prerelease => "Pre-Release",
        }
    }
}

impl FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" | "stable" => Ok(TrackKind::Stable),
            "pre-release" | "prerelease" => Ok(TrackKind::Prerelease),
            other => Err(format!("unknown track '{other}', expected 'release' or 'pre-release'")),
        }
    }
}

/// The latest release of one classification
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub kind: TrackKind,
    /// Tag with a leading 'v' stripped, e.g. "1.0.1(23)"
    pub version: String,
    /// Numeric version code extracted from the tag, if present
    pub version_code: Option<i64>,
    pub title: String,
    pub changelog: Option<String>,
    /// The installable asset, if the release carries one
    pub asset: Option<ReleaseAsset>,
    pub published_at: String,
}

impl Track {
    pub fn from_release(kind: TrackKind, release: &Release) -> Self {
        Self {
            kind,
            version: release
                .tag_name
                .strip_prefix('v')
                .unwrap_or(&release.tag_name)
                .to_string(),
            version_code: extract_version_code(&release.tag_name),
            title: release
                .name
                .clone()
                .unwrap_or_else(|| release.tag_name.clone()),
            changelog: release.body.clone(),
            asset: release
                .assets
                .iter()
                .find(|a| a.name.ends_with(".apk"))
                .cloned(),
            published_at: release.published_at.clone(),
        }
    }
}

/// Extract a numeric version code from a tag like "v1.0.1(23)".
pub fn extract_version_code(tag: &str) -> Option<i64> {
    VERSION_CODE_RE
        .captures(tag)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Resolve the latest release per classification from an API-ordered
/// (most-recent-first) release list. Yields 0, 1 or 2 tracks, stable first.
pub fn resolve_tracks(releases: &[Release]) -> Vec<Track> {
    let mut tracks = Vec::with_capacity(2);

    if let Some(stable) = releases.iter().find(|r| !r.prerelease) {
        tracks.push(Track::from_release(TrackKind::Stable, stable));
    }
    if let Some(pre) = releases.iter().find(|r| r.prerelease) {
        tracks.push(Track::from_release(TrackKind::Prerelease, pre));
    }

    tracks
}
