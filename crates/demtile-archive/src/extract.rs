//! Bounded-depth archive extraction.

use crate::{ArchiveError, ArchiveKind, Result};
use demtile_metrics::metric_defs;
use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Top-level archive plus one nested level.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Unpacks archives into scoped temporary directories.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    max_depth: usize,
    temp_root: Option<PathBuf>,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            temp_root: None,
        }
    }
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of archive levels to unpack. Archives found below this depth are
    /// ignored. A depth of 0 is treated as 1.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Create temporary directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Extract `archive` (and archives inside it, up to the depth limit) and keep
    /// the files accepted by `predicate`.
    ///
    /// Fails with [`ArchiveError::EmptyArchive`] when nothing was extracted and
    /// [`ArchiveError::NoMatchingEntries`] when files were extracted but none
    /// matched. Temporary directories are removed before any error is returned.
    pub fn extract_and_flatten<F>(&self, archive: &Path, predicate: F) -> Result<ExtractedArchive>
    where
        F: Fn(&Path) -> bool,
    {
        let kind = ArchiveKind::detect(archive)
            .ok_or_else(|| ArchiveError::UnsupportedArchive(archive.to_path_buf()))?;

        let mut dirs = Vec::new();
        let mut extracted = Vec::new();
        self.extract_level(archive, kind, 1, &mut dirs, &mut extracted)?;

        let found = extracted.len();
        if found == 0 {
            return Err(ArchiveError::EmptyArchive(archive.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = extracted.into_iter().filter(|p| predicate(p)).collect();
        if files.is_empty() {
            return Err(ArchiveError::NoMatchingEntries {
                archive: archive.to_path_buf(),
                found,
            });
        }
        files.sort();

        debug!(
            "Extracted {}: {} of {} files matched",
            archive.display(),
            files.len(),
            found
        );

        Ok(ExtractedArchive {
            archive: archive.to_path_buf(),
            files,
            found,
            _dirs: dirs,
        })
    }

    fn extract_level(
        &self,
        archive: &Path,
        kind: ArchiveKind,
        depth: usize,
        dirs: &mut Vec<TempDir>,
        files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let dir = self.temp_dir()?;
        let entries = match kind {
            ArchiveKind::Zip => extract_zip(archive, dir.path())?,
            ArchiveKind::Gzip => extract_gzip(archive, dir.path())?,
        };
        dirs.push(dir);
        metrics::counter!(metric_defs::ARCHIVE_ENTRIES_EXTRACTED.name).increment(entries.len() as u64);

        for entry in entries {
            match ArchiveKind::detect(&entry) {
                Some(inner) if depth < self.max_depth => {
                    self.extract_level(&entry, inner, depth + 1, dirs, files)?;
                }
                Some(_) => debug!(
                    "Ignoring {} nested deeper than {} levels",
                    entry.display(),
                    self.max_depth
                ),
                None => files.push(entry),
            }
        }
        Ok(())
    }

    fn temp_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("demtile-extract-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Files pulled out of one archive.
///
/// Owns the temporary directories the files live in; dropping it deletes them.
#[derive(Debug)]
pub struct ExtractedArchive {
    archive: PathBuf,
    files: Vec<PathBuf>,
    found: usize,
    _dirs: Vec<TempDir>,
}

impl ExtractedArchive {
    /// Archive the files came from.
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Matching files, sorted. Valid only while `self` is alive.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files extracted before filtering.
    pub fn found(&self) -> usize {
        self.found
    }

    /// Copy the matching files into `dest_dir` as `{prefix}-{file_name}`.
    ///
    /// A name already taken in `dest_dir` gets a numeric suffix on the prefix so
    /// same-named files from different archive folders do not overwrite each other.
    /// Names are claimed with `create_new`, so concurrent callers sharing a
    /// prefix never write to the same file.
    pub fn persist_into(&self, dest_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest_dir)?;

        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };

            let (dest, out) = create_unique(dest_dir, prefix, &name)?;
            let mut out = BufWriter::new(out);
            io::copy(&mut BufReader::new(File::open(file)?), &mut out)?;
            out.flush()?;
            written.push(dest);
        }
        Ok(written)
    }
}

/// Create `{prefix}-{name}` in `dir`, or `{prefix}-{n}-{name}` for the first free
/// `n` when that exists.
fn create_unique(dir: &Path, prefix: &str, name: &str) -> Result<(PathBuf, File)> {
    let mut n = 0usize;
    loop {
        let candidate = if n == 0 {
            dir.join(format!("{}-{}", prefix, name))
        } else {
            dir.join(format!("{}-{}-{}", prefix, n, name))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let reader = BufReader::new(File::open(archive)?);
    let mut zip = zip::ZipArchive::new(reader)?;

    let mut files = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafeEntryPath {
                archive: archive.to_path_buf(),
                entry: entry.name().to_string(),
            });
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&out_path)?);
        io::copy(&mut entry, &mut out)?;
        out.flush()?;
        files.push(out_path);
    }
    Ok(files)
}

fn extract_gzip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let name = match archive.file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => {
            warn!("{} has no usable name, extracting as 'data'", archive.display());
            "data".to_string()
        }
    };
    let out_path = dest.join(name);

    let mut decoder = GzDecoder::new(BufReader::new(File::open(archive)?));
    let mut out = BufWriter::new(File::create(&out_path)?);
    io::copy(&mut decoder, &mut out)?;
    out.flush()?;

    Ok(vec![out_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn is_tif(p: &Path) -> bool {
        p.extension().and_then(|e| e.to_str()) == Some("tif")
    }

    #[test]
    fn test_unsupported_archive() {
        let err = ArchiveExtractor::new()
            .extract_and_flatten(Path::new("a.rar"), is_tif)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedArchive(_)));
    }

    #[test]
    fn test_empty_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, &[]);

        let err = ArchiveExtractor::new()
            .extract_and_flatten(&path, is_tif)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::EmptyArchive(_)));
    }

    #[test]
    fn test_depth_one_ignores_nested() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner.zip");
        write_zip(&inner, &[("deep.tif", b"deep".as_slice())]);
        let outer = dir.path().join("outer.zip");
        let inner_bytes = fs::read(&inner).unwrap();
        write_zip(
            &outer,
            &[("top.tif", b"top".as_slice()), ("inner.zip", inner_bytes.as_slice())],
        );

        let extracted = ArchiveExtractor::new()
            .with_max_depth(1)
            .extract_and_flatten(&outer, is_tif)
            .unwrap();
        assert_eq!(extracted.files().len(), 1);
        assert_eq!(extracted.found(), 1);
    }

    #[test]
    fn test_gzip_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("N47E008.tif.gz");
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"elevation").unwrap();
        enc.finish().unwrap();

        let extracted = ArchiveExtractor::new()
            .extract_and_flatten(&path, is_tif)
            .unwrap();
        assert_eq!(extracted.files().len(), 1);
        assert!(extracted.files()[0].ends_with("N47E008.tif"));
        assert_eq!(fs::read(&extracted.files()[0]).unwrap(), b"elevation");
    }

    #[test]
    fn test_temp_root_is_used() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("a.zip");
        write_zip(&path, &[("a.tif", b"x".as_slice())]);

        let extracted = ArchiveExtractor::new()
            .with_temp_root(root.path())
            .extract_and_flatten(&path, is_tif)
            .unwrap();
        assert!(extracted.files()[0].starts_with(root.path()));
    }

    #[test]
    fn test_persist_into_disambiguates_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiles.zip");
        write_zip(&path, &[("a/n.tif", b"1".as_slice()), ("b/n.tif", b"2".as_slice())]);
        let out = dir.path().join("out");

        let extracted = ArchiveExtractor::new()
            .extract_and_flatten(&path, is_tif)
            .unwrap();
        let written = extracted.persist_into(&out, "tiles").unwrap();

        assert_eq!(written.len(), 2);
        assert!(out.join("tiles-n.tif").exists());
        assert!(out.join("tiles-1-n.tif").exists());
    }
}
