//! Gzip compression of stage outputs.

use crate::Result;
use demtile_metrics::metric_defs;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Compress `src` to `{dest_dir}/{file_name}.gz` and return the written path.
///
/// Data goes to a `.part` file that is renamed once the stream is complete, so an
/// interrupted or failed compression never leaves a truncated `.gz`.
pub fn gzip_file(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("no file name in {}", src.display())))?
        .to_string_lossy();
    let dest = dest_dir.join(format!("{}.gz", name));
    let part = dest_dir.join(format!("{}.gz.part", name));

    fs::create_dir_all(dest_dir)?;
    match write_gzip(src, &part) {
        Ok(bytes) => {
            fs::rename(&part, &dest)?;
            metrics::counter!(metric_defs::BYTES_COMPRESSED.name).increment(bytes);
            debug!("gzip {} -> {} ({} bytes)", src.display(), dest.display(), bytes);
            Ok(dest)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

/// Stream `src` through a gzip encoder into `dest`, returning the bytes written.
fn write_gzip(src: &Path, dest: &Path) -> Result<u64> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(dest)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut out = encoder.finish()?;
    out.flush()?;
    let bytes = out.get_ref().metadata()?.len();
    Ok(bytes)
}
