//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built from defaults, optionally overlaid with a YAML
//! file, and finally with command-line flags. It is validated once, before any
//! stage starts.
//!
//! ```yaml
//! step_size: 5
//! worker_count: 10
//! archive_extensions: [tif, hgt]
//! tools:
//!   gdal_translate: /opt/gdal/bin/gdal_translate
//! stages:
//!   extract:
//!     fail_fast: true
//!   compress:
//!     worker_count: 4
//! ```

use crate::{Result, RunnerError};
use demtile_batch::BatchConfig;
use demtile_tools::Gdal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Grid step in degrees.
pub const DEFAULT_STEP_SIZE: u32 = 5;
/// Workers per stage.
pub const DEFAULT_WORKER_COUNT: usize = 10;
/// Workers for downloads.
pub const DEFAULT_FETCH_WORKERS: usize = 5;

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the input rasters or archives.
    pub source_dir: PathBuf,
    /// Directory receiving final outputs; created if absent.
    pub dest_dir: PathBuf,
    /// Grid step for the split stage.
    pub step_size: u32,
    /// Workers per stage unless a stage overrides it.
    pub worker_count: usize,
    /// Stop a stage after its first failure unless a stage overrides it.
    pub fail_fast: bool,
    /// Parent directory for stage temp directories (system temp dir if unset).
    pub work_dir: Option<PathBuf>,
    /// Keep stage directories after the run.
    pub keep_intermediate: bool,
    /// Extensions kept from extracted archives (case-insensitive, no dot).
    pub archive_extensions: Vec<String>,
    /// Write `summary.json` after the process pipeline.
    pub write_summary: bool,
    pub tools: ToolSettings,
    pub fetch: FetchSettings,
    /// Per-stage overrides keyed by stage name.
    pub stages: BTreeMap<String, StageSettings>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            step_size: DEFAULT_STEP_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            fail_fast: false,
            work_dir: None,
            keep_intermediate: false,
            archive_extensions: vec!["tif".into(), "tiff".into(), "hgt".into()],
            write_summary: true,
            tools: ToolSettings::default(),
            fetch: FetchSettings::default(),
            stages: BTreeMap::new(),
        }
    }
}

/// Overrides for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageSettings {
    pub worker_count: Option<usize>,
    pub fail_fast: Option<bool>,
}

/// External programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// `gdalinfo` name or path.
    pub gdalinfo: PathBuf,
    /// `gdal_translate` name or path.
    pub gdal_translate: PathBuf,
    /// netCDF creation option.
    pub netcdf_format: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        let gdal = Gdal::default();
        Self {
            gdalinfo: gdal.info_program,
            gdal_translate: gdal.translate_program,
            netcdf_format: gdal.netcdf_format,
        }
    }
}

impl ToolSettings {
    pub fn to_gdal(&self) -> Gdal {
        Gdal {
            info_program: self.gdalinfo.clone(),
            translate_program: self.gdal_translate.clone(),
            netcdf_format: self.netcdf_format.clone(),
        }
    }
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Workers for the fetch stage unless `stages.fetch` overrides it.
    pub worker_count: usize,
    /// Slippy Map zoom for region downloads.
    pub zoom: u8,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Tile server replacing the AWS bucket, `{base_url}/{z}/{x}/{y}.tif`.
    pub base_url: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_FETCH_WORKERS,
            zoom: demtile_fetch::DEFAULT_ZOOM,
            timeout_secs: demtile_fetch::DEFAULT_TIMEOUT.as_secs(),
            base_url: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Reject values no stage can run with.
    ///
    /// `source_dir` is only checked when set, since fetch and summary runs do not
    /// read one.
    pub fn validate(&self) -> Result<()> {
        if self.step_size == 0 {
            return Err(RunnerError::Config("step_size must be at least 1".into()));
        }
        if self.worker_count == 0 {
            return Err(RunnerError::Config("worker_count must be at least 1".into()));
        }
        if self.fetch.worker_count == 0 {
            return Err(RunnerError::Config("fetch.worker_count must be at least 1".into()));
        }
        for (name, stage) in &self.stages {
            if stage.worker_count == Some(0) {
                return Err(RunnerError::Config(format!(
                    "stages.{}.worker_count must be at least 1",
                    name
                )));
            }
        }
        if self.archive_extensions.is_empty() {
            return Err(RunnerError::Config("archive_extensions must not be empty".into()));
        }
        if !self.source_dir.as_os_str().is_empty() && !self.source_dir.is_dir() {
            return Err(RunnerError::Config(format!(
                "source directory {} does not exist",
                self.source_dir.display()
            )));
        }
        Ok(())
    }

    /// Scheduler settings for a stage, applying its overrides.
    pub fn batch_config(&self, stage: &str) -> BatchConfig {
        let settings = self.stages.get(stage).copied().unwrap_or_default();
        let default_workers = if stage == crate::stage::FETCH {
            self.fetch.worker_count
        } else {
            self.worker_count
        };
        BatchConfig {
            worker_count: settings.worker_count.unwrap_or(default_workers),
            fail_fast: settings.fail_fast.unwrap_or(self.fail_fast),
        }
    }

    /// True when `path` has one of the archive extensions.
    pub fn is_wanted_extract(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.archive_extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
