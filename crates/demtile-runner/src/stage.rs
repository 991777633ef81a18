//! Stage names, stage working directories and input enumeration.

use crate::Result;
use demtile_batch::BatchReport;
use glob::MatchOptions;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub const PLAN: &str = "plan";
pub const SPLIT: &str = "split";
pub const CONVERT: &str = "convert";
pub const COMPRESS: &str = "compress";
pub const EXTRACT: &str = "extract";
pub const FETCH: &str = "fetch";

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub name: String,
    #[serde(flatten)]
    pub report: BatchReport,
}

impl StageReport {
    pub fn new(name: impl Into<String>, report: BatchReport) -> Self {
        Self {
            name: name.into(),
            report,
        }
    }
}

/// Working directory for a stage's intermediate output.
///
/// Removed when dropped, unless created with `keep` set.
#[derive(Debug)]
pub struct StageDir {
    path: PathBuf,
    _temp: Option<TempDir>,
}

impl StageDir {
    /// Create a fresh directory for `stage` under `work_dir` (or the system temp
    /// dir).
    pub fn create(stage: &str, work_dir: Option<&Path>, keep: bool) -> Result<Self> {
        if keep {
            let parent = work_dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
            let path = parent.join(format!("demtile-{}-{}-{}", stage, stamp, std::process::id()));
            fs::create_dir_all(&path)?;
            debug!("Keeping {} output in {}", stage, path.display());
            return Ok(Self { path, _temp: None });
        }

        let mut builder = tempfile::Builder::new();
        let prefix = format!("demtile-{}-", stage);
        builder.prefix(&prefix);
        let temp = match work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            path: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Files directly in `dir` whose extension is one of `extensions`
/// (case-insensitive), sorted by path. An empty `extensions` matches every file.
///
/// A missing directory is an empty listing.
pub fn scan_dir(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!("{} does not exist, nothing to scan", dir.display());
        return Ok(Vec::new());
    }

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let patterns: Vec<String> = if extensions.is_empty() {
        vec![format!("{}/*", base)]
    } else {
        extensions
            .iter()
            .map(|ext| format!("{}/*.{}", base, ext.trim_start_matches('.')))
            .collect()
    };

    let mut files = Vec::new();
    for pattern in patterns {
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Map each output name to the input that produces it.
///
/// When several inputs map to one name, the first in `inputs` order keeps it.
/// Inputs `name_for` rejects are left out.
pub fn claim_outputs<F>(inputs: &[PathBuf], name_for: F) -> HashMap<String, PathBuf>
where
    F: Fn(&Path) -> Option<String>,
{
    let mut owners = HashMap::with_capacity(inputs.len());
    for input in inputs {
        if let Some(name) = name_for(input) {
            owners.entry(name).or_insert_with(|| input.clone());
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_dir_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.tif", "a.TIF", "c.nc", "d.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.tif")).unwrap();

        let tifs = scan_dir(dir.path(), &["tif"]).unwrap();
        assert_eq!(tifs, vec![dir.path().join("a.TIF"), dir.path().join("b.tif")]);

        let all = scan_dir(dir.path(), &[]).unwrap();
        assert_eq!(all.len(), 4);

        let both = scan_dir(dir.path(), &["nc", ".txt"]).unwrap();
        assert_eq!(both, vec![dir.path().join("c.nc"), dir.path().join("d.txt")]);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(scan_dir(&dir.path().join("missing"), &["tif"]).unwrap().is_empty());
    }

    #[test]
    fn test_claim_outputs_first_input_wins() {
        let inputs: Vec<PathBuf> = ["DEM.TIF", "a.tif", "dem.tif", "skip.txt"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let owners = claim_outputs(&inputs, |p| {
            let name = p.to_str()?.to_lowercase();
            name.strip_suffix(".tif").map(|stem| format!("{}.nc", stem))
        });

        assert_eq!(owners.len(), 2);
        assert_eq!(owners["dem.nc"], PathBuf::from("DEM.TIF"));
        assert_eq!(owners["a.nc"], PathBuf::from("a.tif"));
    }

    #[test]
    fn test_stage_dir_removed_on_drop() {
        let work = TempDir::new().unwrap();
        let stage = StageDir::create(SPLIT, Some(work.path()), false).unwrap();
        let path = stage.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path.starts_with(work.path()));
        drop(stage);
        assert!(!path.exists());
    }

    #[test]
    fn test_stage_dir_kept() {
        let work = TempDir::new().unwrap();
        let stage = StageDir::create(CONVERT, Some(work.path()), true).unwrap();
        let path = stage.path().to_path_buf();
        drop(stage);
        assert!(path.is_dir());
    }
}
