//! Streaming a URL to a file.

use crate::{FetchError, Result};
use demtile_metrics::metric_defs;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout for downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking HTTP client shared by all download jobs.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Download `url` into `dest`, returning the number of bytes written.
///
/// The body is streamed into `{dest}.part`, which is renamed to `dest` only after
/// the whole body arrived. A non-success status is a [`FetchError::DownloadFailed`].
pub fn download_to(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut part_name = dest.as_os_str().to_owned();
    part_name.push(".part");
    let part = Path::new(&part_name);

    let result = stream_to(client, url, part);
    match result {
        Ok(bytes) => {
            fs::rename(part, dest)?;
            metrics::counter!(metric_defs::FILES_DOWNLOADED.name).increment(1);
            metrics::counter!(metric_defs::BYTES_DOWNLOADED.name).increment(bytes);
            debug!("Downloaded {} -> {} ({} bytes)", url, dest.display(), bytes);
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(part);
            Err(e)
        }
    }
}

fn stream_to(client: &Client, url: &str, part: &Path) -> Result<u64> {
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(FetchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mut out = BufWriter::new(File::create(part)?);
    let bytes = response.copy_to(&mut out)?;
    out.flush()?;
    Ok(bytes)
}
