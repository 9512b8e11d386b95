//! Feed fetcher.
//!
//! Downloads third-party lists into the cache directory and copies local
//! custom lists next to them. A cached copy younger than the check interval
//! is used as is unless the run is forced.

use anyhow::{Context, Result};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::aggregator::CUSTOM_PREFIX;
use crate::freshness::{file_time, is_stale};
use crate::utils::format_bytes;

const TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 2000;

/// Maximum size per list file (10 MB)
const MAX_LIST_SIZE: usize = 10 * 1024 * 1024;

/// Maximum total size for all downloads of one run (100 MB)
const MAX_TOTAL_SIZE: usize = 100 * 1024 * 1024;

/// Maximum concurrent downloads
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Where a feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    Http(String),
    Ftp(String),
    Local(PathBuf),
    Unknown(String),
}

impl FeedLocation {
    pub fn classify(location: &str) -> Self {
        let location = location.trim();
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            FeedLocation::Http(location.to_string())
        } else if lower.starts_with("ftp://") {
            FeedLocation::Ftp(location.to_string())
        } else if Path::new(location).is_file() {
            FeedLocation::Local(PathBuf::from(location))
        } else {
            FeedLocation::Unknown(location.to_string())
        }
    }
}

/// Source name of a user supplied list: `custom_` plus the file stem of its URL or path.
pub fn custom_source_name(location: &str) -> String {
    let trimmed = location.trim().trim_end_matches('/');
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    let file_name = without_query.rsplit('/').next().unwrap_or(without_query);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", CUSTOM_PREFIX, stem)
}

/// One feed to materialize in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub source: String,
    pub location: String,
}

/// What happened to the cached copy of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Downloaded(usize),
    Copied,
    UpToDate,
    /// Location cannot be fetched (FTP, unrecognized)
    Unsupported(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub source: String,
    pub status: FetchStatus,
    pub path: PathBuf,
}

/// Read a cached feed. `None` when it is missing or empty.
pub fn read_cached(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    (!content.trim().is_empty()).then_some(content)
}

/// HTTP client plus cache policy for one run.
pub struct Fetcher {
    client: Client,
    cache_dir: PathBuf,
    max_age: Duration,
    force: bool,
    total_downloaded: AtomicUsize,
}

impl Fetcher {
    pub fn new(cache_dir: &Path, max_age: Duration, force: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("notrack/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
        Ok(Self {
            client,
            cache_dir: cache_dir.to_path_buf(),
            max_age,
            force,
            total_downloaded: AtomicUsize::new(0),
        })
    }

    pub fn cached_path(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.txt", source))
    }

    pub fn total_downloaded(&self) -> usize {
        self.total_downloaded.load(Ordering::Relaxed)
    }

    /// Bring the cached copy of one feed up to date.
    pub async fn fetch(&self, request: &FeedRequest) -> FetchResult {
        let path = self.cached_path(&request.source);
        let status = match FeedLocation::classify(&request.location) {
            FeedLocation::Http(url) => self.fetch_http(&request.source, &url, &path).await,
            FeedLocation::Local(origin) => copy_local(&origin, &path),
            FeedLocation::Ftp(url) => {
                warn!("FTP is not supported, skipping {}: {}", request.source, url);
                FetchStatus::Unsupported(url)
            }
            FeedLocation::Unknown(location) => {
                warn!("Unable to identify what {} is", location);
                FetchStatus::Unsupported(location)
            }
        };
        FetchResult {
            source: request.source.clone(),
            status,
            path,
        }
    }

    /// Fetch every request with limited parallelism, keeping request order.
    pub async fn fetch_all(&self, requests: &[FeedRequest]) -> Vec<FetchResult> {
        use futures::stream::{self, StreamExt};

        stream::iter(requests.iter().map(|request| self.fetch(request)))
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await
    }

    async fn fetch_http(&self, source: &str, url: &str, path: &Path) -> FetchStatus {
        if !self.force && !is_stale(path, self.max_age, SystemTime::now()) {
            info!("{} in date, not downloading", source);
            return FetchStatus::UpToDate;
        }

        info!("Downloading {}", source);
        match self.fetch_with_retry(url).await {
            Ok(body) => match fs::write(path, &body) {
                Ok(()) => {
                    debug!("{}: {}", source, format_bytes(body.len() as u64));
                    FetchStatus::Downloaded(body.len())
                }
                Err(e) => {
                    warn!("Failed to save {}: {}", path.display(), e);
                    FetchStatus::Failed(e.to_string())
                }
            },
            Err(e) => {
                warn!("Failed to download {}: {:#}", source, e);
                FetchStatus::Failed(format!("{:#}", e))
            }
        }
    }

    /// Fetch content with retry logic and size validation
    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_DELAY_MS * (1 << (attempt - 1));
                debug!("Retry {} after {}ms for {}", attempt, delay, url);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        if let Some(content_length) = response.content_length() {
                            if content_length as usize > MAX_LIST_SIZE {
                                return Err(anyhow::anyhow!(
                                    "Response too large: {} bytes (max: {} bytes)",
                                    content_length,
                                    MAX_LIST_SIZE
                                ));
                            }
                        }

                        let body = response
                            .text()
                            .await
                            .context("Failed to read response body")?;

                        if body.len() > MAX_LIST_SIZE {
                            return Err(anyhow::anyhow!(
                                "Downloaded content too large: {} bytes (max: {} bytes)",
                                body.len(),
                                MAX_LIST_SIZE
                            ));
                        }

                        let new_total = self
                            .total_downloaded
                            .fetch_add(body.len(), Ordering::Relaxed)
                            + body.len();
                        if new_total > MAX_TOTAL_SIZE {
                            return Err(anyhow::anyhow!(
                                "Cumulative download limit exceeded: {} bytes (max: {} bytes)",
                                new_total,
                                MAX_TOTAL_SIZE
                            ));
                        }

                        return Ok(body);
                    }
                    last_error = Some(anyhow::anyhow!("HTTP {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }
}

/// Copy a local list into the cache when it is newer than the cached copy.
fn copy_local(origin: &Path, cached: &Path) -> FetchStatus {
    let origin_time = file_time(origin);
    let cached_time = file_time(cached);
    if cached_time.is_some() && origin_time <= cached_time {
        info!("{} in date, not copying", origin.display());
        return FetchStatus::UpToDate;
    }

    info!("Copying {} to {}", origin.display(), cached.display());
    match fs::copy(origin, cached) {
        Ok(_) => FetchStatus::Copied,
        Err(e) => {
            warn!("Failed to copy {}: {}", origin.display(), e);
            FetchStatus::Failed(e.to_string())
        }
    }
}
