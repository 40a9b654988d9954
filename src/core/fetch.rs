use crate::utils::error::{ExeggutorError, Result};
use crate::utils::validation::validate_url;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// Downloads remote files over HTTP(S). `ftp://` URLs are requested over
/// HTTPS from the same host and path, which is how public sequence
/// archives mirror their FTP trees.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch<P: AsRef<Path>>(&self, url: &str, destination: P) -> Result<PathBuf> {
        let url = resolve_url(url)?;
        let destination = destination_path(&url, destination.as_ref());
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!("Requesting {}", url);
        let mut response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ExeggutorError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            "Downloaded {} ({} bytes) to {}",
            url,
            written,
            destination.display()
        );
        Ok(destination)
    }

    /// Fetches `url` into `directory`, creating it first, under the URL's
    /// last path segment.
    pub async fn fetch_into<P: AsRef<Path>>(&self, url: &str, directory: P) -> Result<PathBuf> {
        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory).await?;
        self.fetch(url, directory).await
    }
}

pub async fn download<P: AsRef<Path>>(url: &str, destination: P) -> Result<PathBuf> {
    Downloader::new().fetch(url, destination).await
}

pub async fn download_into<P: AsRef<Path>>(url: &str, directory: P) -> Result<PathBuf> {
    Downloader::new().fetch_into(url, directory).await
}

pub fn resolve_url(url: &str) -> Result<Url> {
    validate_url("url", url)?;
    let mut parsed = Url::parse(url).map_err(|e| ExeggutorError::InvalidConfigValueError {
        field: "url".to_string(),
        value: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() == "ftp" {
        parsed
            .set_scheme("https")
            .map_err(|_| ExeggutorError::InvalidConfigValueError {
                field: "url".to_string(),
                value: url.to_string(),
                reason: "cannot map ftp URL onto https".to_string(),
            })?;
    }
    Ok(parsed)
}

/// An existing directory receives the URL's last path segment as file name.
fn destination_path(url: &Url, destination: &Path) -> PathBuf {
    if !destination.is_dir() {
        return destination.to_path_buf();
    }
    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("download");
    destination.join(file_name)
}
