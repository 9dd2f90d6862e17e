// src/repository/client.rs

//! Media access for repository operations
//!
//! Reads files below a base URI. Remote schemes go through a blocking
//! reqwest client with retry support, local schemes (`file`, `dir`) and
//! changeable media (`cd`, `dvd`, `iso`) are read from the filesystem.

use super::metadata::MetadataError;
use reqwest::blocking::Client;
use std::cell::OnceCell;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Reader for files published below repository and service URIs
pub struct MediaFetcher {
    client: OnceCell<Client>,
    max_retries: u32,
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaFetcher {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
            max_retries: MAX_RETRIES,
        }
    }

    /// Built on first remote access so local-only runs never set up TLS
    fn client(&self) -> Result<&Client, MetadataError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| MetadataError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Read `file` below `base`
    pub fn fetch(&self, base: &Url, file: &str) -> Result<Vec<u8>, MetadataError> {
        match base.scheme() {
            "http" | "https" => self.fetch_remote(base, file),
            "file" | "dir" => fetch_local(base, file, false),
            "cd" | "dvd" | "iso" => fetch_local(base, file, true),
            other => Err(MetadataError::Media(format!(
                "Unsupported URI scheme '{}' in {}",
                other, base
            ))),
        }
    }

    /// Whether `file` can be read below `base`
    pub fn probe(&self, base: &Url, file: &str) -> bool {
        self.fetch(base, file).is_ok()
    }

    fn fetch_remote(&self, base: &Url, file: &str) -> Result<Vec<u8>, MetadataError> {
        let url = join(base, file)?;
        let client = self.client()?;
        info!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.get(url.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(MetadataError::Media(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    let bytes = response.bytes().map_err(|e| {
                        MetadataError::Media(format!("Failed to read response from {}: {e}", url))
                    })?;
                    return Ok(bytes.to_vec());
                }
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "Attempt {}/{} to fetch {} failed: {}",
                        attempt, self.max_retries, url, e
                    );
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
                Err(e) => {
                    return Err(MetadataError::Media(format!(
                        "Failed to fetch {} after {} attempts: {e}",
                        url, self.max_retries
                    )));
                }
            }
        }
    }
}

/// Join a file name onto a directory-style base URI
fn join(base: &Url, file: &str) -> Result<Url, MetadataError> {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    dir.join(file)
        .map_err(|e| MetadataError::Media(format!("Invalid URI {}{}: {e}", base, file)))
}

fn local_path(base: &Url) -> PathBuf {
    base.to_file_path()
        .unwrap_or_else(|_| PathBuf::from(base.path()))
}

fn fetch_local(base: &Url, file: &str, changeable: bool) -> Result<Vec<u8>, MetadataError> {
    let path = local_path(base).join(file);
    debug!("Reading {}", path.display());

    fs::read(&path).map_err(|e| {
        if changeable && e.kind() == std::io::ErrorKind::NotFound {
            MetadataError::MediaChangeRequired(base.to_string())
        } else {
            MetadataError::Media(format!("Failed to read {}: {e}", path.display()))
        }
    })
}
