//! Bounded, streamed feed download.

use crate::error::{CatalogError, Result};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub struct FeedDownloader {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: u64,
}

impl FeedDownloader {
    pub fn new(timeout_secs: u64, max_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
            max_bytes,
        })
    }

    /// Stream `url` to `dest`, enforcing the size cap as bytes arrive.
    /// The download lands in a sibling temp file and is promoted with a
    /// rename, so `dest` is always either the previous feed or a complete
    /// new one. Returns the byte count.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading feed from {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(CatalogError::Download(format!(
                    "feed too large: {} bytes (max {})",
                    length, self.max_bytes
                )));
            }
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = dest.with_extension("download");
        let mut file = tokio::fs::File::create(&tmp_path).await?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            if downloaded > self.max_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(CatalogError::Download(format!(
                    "download exceeded max size of {} bytes",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, dest).await?;
        info!("Downloaded feed: {} bytes to {}", downloaded, dest.display());
        Ok(downloaded)
    }
}
