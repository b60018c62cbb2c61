//! Collaborator traits for the installed-package inventory, artifact
//! inspection and the installer
//!
//! These sit at the OS boundary. The engine only consumes the traits; the
//! CLI wires in [`ManifestInventory`] and platform stubs, and tests use
//! mocks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;

use serde::Deserialize;
use tracing::{debug, warn};

/// Version metadata of an installed package
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackageInfo {
    pub package_id: String,
    pub version_name: String,
    pub version_code: Option<i64>,
}

/// Identity and version extracted from a downloaded artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub package_id: String,
    pub version_code: i64,
}

/// Query interface over the installed packages on this device
#[cfg_attr(test, automock)]
pub trait PackageInventory: Send + Sync {
    /// Returns `None` if the identifier is blank or the package is not
    /// installed.
    fn query_installed(&self, package_id: &str) -> Option<InstalledPackageInfo>;
}

/// Extracts package identity from a downloaded installable file
#[cfg_attr(test, automock)]
pub trait ArtifactInspector: Send + Sync {
    /// Returns `None` if the file is unreadable or not a recognized package.
    fn inspect(&self, file: &Path) -> Option<ArtifactInfo>;
}

/// Launches installs and uninstall prompts. Fire-and-forget, best effort.
#[cfg_attr(test, automock)]
pub trait Installer: Send + Sync {
    fn launch_install(&self, file: &Path);
    fn request_uninstall(&self, package_id: &str);
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    version_name: String,
    #[serde(default)]
    version_code: Option<i64>,
}

/// [`PackageInventory`] backed by a user-maintained JSON manifest.
///
/// Desktop builds have no package manager to ask, so the CLI reads a
/// manifest mapping package identifiers to installed version info:
///
/// ```json
/// { "com.example.app": { "version_name": "1.2.0", "version_code": 23 } }
/// ```
pub struct ManifestInventory {
    path: PathBuf,
}

impl ManifestInventory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> HashMap<String, ManifestEntry> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No installed-package manifest at {:?}: {}", self.path, e);
                return HashMap::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unparseable manifest {:?}: {}", self.path, e);
                HashMap::new()
            }
        }
    }
}

impl PackageInventory for ManifestInventory {
    fn query_installed(&self, package_id: &str) -> Option<InstalledPackageInfo> {
        if package_id.trim().is_empty() {
            return None;
        }

        let entry = self.load().remove(package_id)?;
        Some(InstalledPackageInfo {
            package_id: package_id.to_string(),
            version_name: entry.version_name,
            version_code: entry.version_code,
        })
    }
}
