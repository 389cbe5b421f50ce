//! Archive retrieval

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fias_common::progress::{byte_progress, format_bytes};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{IngestError, Result};

/// Fetches the release archive into a local directory
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url` into `dest_dir`, returning the archive path
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// `ArchiveFetcher` over plain HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpArchiveFetcher {
    pub fn new(timeout: Duration, show_progress: bool) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            show_progress,
        })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Transport(format!(
                "download of {url} returned {status}"
            )));
        }

        let output_path = dest_dir.join(archive_file_name(url));
        let total_size = response.content_length().unwrap_or(0);

        let pb = byte_progress(
            total_size,
            &format!("Downloading {}", output_path.display()),
            self.show_progress,
        )?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let mut file = tokio::fs::File::create(&output_path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;

        pb.finish_and_clear();
        info!(
            path = %output_path.display(),
            size = %format_bytes(downloaded),
            "archive downloaded"
        );

        Ok(output_path)
    }
}

/// Local file name for the archive behind `url`.
///
/// Uses the last path segment, ignoring any query, and falls back to
/// `fias.zip` when the URL has none.
pub fn archive_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);

    path.split_once('/')
        .and_then(|(_, resource)| resource.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map_or_else(|| "fias.zip".to_string(), str::to_string)
}
