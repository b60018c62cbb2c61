//! Artifact download
//!
//! Streams a release asset to the download directory with integer-percent
//! progress callbacks and bearer auth for private repositories. Bytes are
//! staged in a `.part` file and renamed on completion, so a cancelled or
//! failed download never leaves a file that looks like a finished artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::{CONNECT_TIMEOUT_SECS, USER_AGENT};
use crate::error::DownloadError;

/// Progress callback, called with a percentage in 0..=100
pub type ProgressFn = dyn Fn(u64) + Send + Sync;

/// Byte-stream download capability
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` into the download directory as `file_name`,
    /// returning the path of the completed file.
    async fn download(
        &self,
        url: &str,
        file_name: &str,
        token: Option<&str>,
        on_progress: &ProgressFn,
    ) -> Result<PathBuf, DownloadError>;
}

/// `reqwest`-backed [`Downloader`]
pub struct HttpDownloader {
    client: reqwest::Client,
    dir: PathBuf,
}

impl HttpDownloader {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            dir,
        }
    }

    /// Deletes previously downloaded `.apk` files, returning the count.
    pub async fn clear_downloads(&self) -> Result<usize, std::io::Error> {
        let mut deleted = 0;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "apk") {
                debug!("Deleting {:?}", path);
                tokio::fs::remove_file(&path).await?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn write_stream(
        &self,
        response: reqwest::Response,
        part_path: &Path,
        on_progress: &ProgressFn,
    ) -> Result<u64, DownloadError> {
        let total = response.content_length().unwrap_or(0);
        debug!("Content length: {} bytes", total);

        let mut file = tokio::fs::File::create(part_path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut last_percent: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if total > 0 {
                let percent = written * 100 / total;
                if percent != last_percent {
                    last_percent = percent;
                    on_progress(percent);
                }
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        url: &str,
        file_name: &str,
        token: Option<&str>,
        on_progress: &ProgressFn,
    ) -> Result<PathBuf, DownloadError> {
        debug!("Starting download: {}", url);
        debug!("Token present: {}", token.is_some());

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/octet-stream");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Download failed with status {}", status);
            return Err(DownloadError::Status(status));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let dest_path = self.dir.join(file_name);
        let part_path = self.dir.join(format!("{file_name}.part"));

        // Discard leftovers from a previous attempt before writing.
        for stale in [&dest_path, &part_path] {
            match tokio::fs::remove_file(stale).await {
                Ok(()) => debug!("Removed stale file {:?}", stale),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let written = match self.write_stream(response, &part_path, on_progress).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        if written == 0 {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(DownloadError::EmptyBody);
        }

        tokio::fs::rename(&part_path, &dest_path).await?;
        debug!("Download complete: {:?} ({} bytes)", dest_path, written);

        Ok(dest_path)
    }
}
