//! # demtile-fetch
//!
//! Acquisition of source elevation rasters.
//!
//! Two sources are supported:
//! - coverage pages whose `<area href>` links point at downloadable archives
//!   ([`harvest_area_links`]) or plain URL lists ([`read_url_list`])
//! - AWS Terrain Tiles, addressed by Slippy Map [`TileCoord`]s and cached on disk
//!   by a [`TileFetcher`]
//!
//! Downloads are blocking and meant to run inside the batch scheduler, one file per
//! job. Every download streams to a `.part` file that is renamed on completion.

mod download;
mod error;
mod fetcher;
mod links;
mod tiles;

pub use download::{download_to, http_client, DEFAULT_TIMEOUT};
pub use error::FetchError;
pub use fetcher::{DownloadStats, TileFetcher};
pub use links::{fetch_page, harvest_area_links, link_file_name, read_url_list};
pub use tiles::{tiles_for_region, TileCoord, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
