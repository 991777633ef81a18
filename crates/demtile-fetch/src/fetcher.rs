//! Disk-cached AWS Terrain Tiles fetcher.
//!
//! ## Thread Safety
//!
//! `TileFetcher` is shared by every download job of a batch:
//! - different tiles download in parallel
//! - threads requesting a tile that is already downloading wait for that download
//!   instead of starting a second one
//! - tiles already on disk are returned without locking

use crate::{download_to, http_client, FetchError, Result, TileCoord, DEFAULT_TIMEOUT};
use parking_lot::{Condvar, Mutex};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Status of a tile download in progress.
#[derive(Clone)]
enum DownloadStatus {
    InProgress,
    Complete,
    Failed(String),
}

/// One in-flight download and the threads waiting on it.
struct InFlight {
    status: DownloadStatus,
    waiters: usize,
}

/// Download statistics for the fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Tiles downloaded this session.
    pub tiles_downloaded: usize,
    /// Bytes downloaded this session.
    pub bytes_downloaded: u64,
    /// Requests answered from the disk cache.
    pub cache_hits: usize,
}

/// Fetches elevation tiles into a local cache directory.
pub struct TileFetcher {
    cache_dir: PathBuf,
    client: Client,
    url_for: Box<dyn Fn(&TileCoord) -> String + Send + Sync>,
    in_flight: Mutex<HashMap<TileCoord, InFlight>>,
    download_complete: Condvar,
    tiles_downloaded: AtomicUsize,
    bytes_downloaded: AtomicU64,
    cache_hits: AtomicUsize,
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("cache_dir", &self.cache_dir)
            .field("stats", &self.download_stats())
            .finish()
    }
}

impl TileFetcher {
    /// Create a fetcher caching under `cache_dir`, which is created if missing.
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        Self::with_client(cache_dir, http_client(DEFAULT_TIMEOUT)?)
    }

    /// Create a fetcher with an existing HTTP client.
    pub fn with_client<P: AsRef<Path>>(cache_dir: P, client: Client) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            cache_dir,
            client,
            url_for: Box::new(TileCoord::aws_url),
            in_flight: Mutex::new(HashMap::new()),
            download_complete: Condvar::new(),
            tiles_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
            cache_hits: AtomicUsize::new(0),
        })
    }

    /// Download tiles from `{base_url}/{z}/{x}/{y}.tif` instead of AWS.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        self.url_for = Box::new(move |c| format!("{}/{}/{}/{}.tif", base_url, c.z, c.x, c.y));
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_cached(&self, coord: &TileCoord) -> bool {
        coord.cache_path(&self.cache_dir).exists()
    }

    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            tiles_downloaded: self.tiles_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Return the local path of a tile, downloading it first if needed.
    ///
    /// If another thread is already downloading the same tile, this waits for it
    /// and shares its outcome.
    pub fn fetch_tile(&self, coord: &TileCoord) -> Result<PathBuf> {
        let cache_path = coord.cache_path(&self.cache_dir);
        if cache_path.exists() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cache_path);
        }

        {
            let mut in_flight = self.in_flight.lock();
            loop {
                match in_flight.get_mut(coord) {
                    Some(entry) => match entry.status.clone() {
                        DownloadStatus::InProgress => {
                            entry.waiters += 1;
                            self.download_complete.wait(&mut in_flight);
                            if let Some(entry) = in_flight.get_mut(coord) {
                                entry.waiters -= 1;
                            }
                        }
                        finished => {
                            if entry.waiters == 0 {
                                in_flight.remove(coord);
                            }
                            return match finished {
                                DownloadStatus::Failed(reason) => Err(FetchError::DownloadFailed {
                                    url: (self.url_for)(coord),
                                    reason,
                                }),
                                _ => Ok(cache_path),
                            };
                        }
                    },
                    None => {
                        if cache_path.exists() {
                            return Ok(cache_path);
                        }
                        in_flight.insert(
                            *coord,
                            InFlight {
                                status: DownloadStatus::InProgress,
                                waiters: 0,
                            },
                        );
                        break;
                    }
                }
            }
        }

        // This thread owns the download; other tiles proceed concurrently.
        let url = (self.url_for)(coord);
        let result = download_to(&self.client, &url, &cache_path);

        {
            let mut in_flight = self.in_flight.lock();
            let waiting = in_flight.get(coord).map_or(0, |e| e.waiters);
            if waiting == 0 {
                in_flight.remove(coord);
            } else {
                let status = match &result {
                    Ok(_) => DownloadStatus::Complete,
                    Err(e) => DownloadStatus::Failed(e.to_string()),
                };
                in_flight.insert(coord.to_owned(), InFlight { status, waiters: waiting });
            }
        }
        self.download_complete.notify_all();

        let bytes = result?;
        self.tiles_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        debug!("Fetched tile {}/{}/{} ({} bytes)", coord.z, coord.x, coord.y, bytes);
        Ok(cache_path)
    }
}
