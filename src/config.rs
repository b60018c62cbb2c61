//! Constants and on-disk locations

use std::path::PathBuf;

// =============================================================================
// Default repository
// =============================================================================

/// Owner of the repository that is always tracked and cannot be removed.
pub const DEFAULT_REPO_OWNER: &str = "akashsarkar188";

/// Name of the repository that is always tracked and cannot be removed.
pub const DEFAULT_REPO_NAME: &str = "GitRelease";

/// Package identifier published by the default repository.
pub const DEFAULT_REPO_PACKAGE: &str = "com.akashsarkar188.gitrelease";

/// Avatar shown for the default repository before the first remote fetch.
pub const DEFAULT_REPO_AVATAR_URL: &str = "https://avatars.githubusercontent.com/u/29357444?v=4";

// =============================================================================
// Network
// =============================================================================

/// Connect timeout for API and download requests (60 seconds)
pub const CONNECT_TIMEOUT_SECS: u64 = 60;

/// Overall timeout for a single API request (30 seconds)
pub const API_TIMEOUT_SECS: u64 = 30;

/// User agent sent on every request
pub const USER_AGENT: &str = "gitrelease";

// =============================================================================
// Files
// =============================================================================

/// Log file name, created inside [`data_dir`].
pub const LOG_FILE: &str = "gitrelease.log";

/// Everything this program persists lives under one directory:
/// `$XDG_DATA_HOME/gitrelease`, `~/.local/share/gitrelease`, or
/// `./gitrelease` as a last resort.
pub fn data_dir() -> PathBuf {
    resolve_data_dir(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

pub fn db_path() -> PathBuf {
    data_dir().join("gitrelease.db")
}

/// Where downloaded artifacts land.
pub fn download_dir() -> PathBuf {
    data_dir().join("downloads")
}

/// The user-maintained installed-package manifest.
pub fn manifest_path() -> PathBuf {
    data_dir().join("installed.json")
}

// Split out so the fallback chain is testable without touching the process
// environment.
fn resolve_data_dir(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let base = match (xdg_data_home, home_dir) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => home.join(".local/share"),
        (None, None) => PathBuf::from("."),
    };

    base.join("gitrelease")
}
