//! Pipeline driver.
//!
//! Stages run strictly one after another. Each stage is one scheduler batch; the
//! next stage re-enumerates the directory the previous one wrote to, so a stage
//! only ever sees complete files. Stage directories are [`StageDir`]s owned by the
//! pipeline method that created them, so they are cleaned up on every return
//! path, including errors and fail-fast aborts.

use crate::config::PipelineConfig;
use crate::progress::ProgressLine;
use crate::report::PipelineReport;
use crate::stage::{self, scan_dir, StageDir, StageReport};
use crate::{Result, RunnerError};
use demtile_archive::{gzip_file, ArchiveExtractor};
use demtile_batch::{Job, JobLabel, Scheduler};
use demtile_fetch::{
    download_to, fetch_page, harvest_area_links, http_client, link_file_name, tiles_for_region,
    TileCoord, TileFetcher,
};
use demtile_grid::{plan_tiles_for_file, BoundingBox, CoverageIndex, Tile};
use demtile_tools::{netcdf_name, Gdal, ToolError, ToolRunner};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raster inputs of the process and convert pipelines.
const RASTER_INPUTS: &[&str] = &["tif"];
/// Outputs of the split stage.
const SPLIT_OUTPUTS: &[&str] = &["tif", "tiff"];
/// Outputs of the convert stage.
const NETCDF_OUTPUTS: &[&str] = &["nc"];
/// Inputs of the extract pipeline.
const ARCHIVE_INPUTS: &[&str] = &["zip", "gz"];

/// Runs stages and accumulates their reports.
pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn ToolRunner>,
    gdal: Gdal,
    progress: Option<ProgressLine>,
    report: PipelineReport,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("gdal", &self.gdal)
            .field("stages_run", &self.report.stages.len())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline. The configuration is validated here, before any stage.
    pub fn new(config: PipelineConfig, runner: Arc<dyn ToolRunner>) -> Result<Self> {
        config.validate()?;
        let gdal = config.tools.to_gdal();
        Ok(Self {
            config,
            runner,
            gdal,
            progress: None,
            report: PipelineReport::new(),
        })
    }

    /// Show a progress line for every stage.
    pub fn with_progress(mut self, progress: ProgressLine) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn into_report(mut self) -> PipelineReport {
        self.report.finish();
        self.report
    }

    /// Check that the GDAL programs can be found.
    pub fn check_tools(&self) -> Result<()> {
        self.gdal.check_available()?;
        Ok(())
    }

    /// Run `handler` over `inputs` as stage `name`.
    ///
    /// Zero inputs give an empty report. Returns [`RunnerError::StageAborted`] when
    /// the stage runs fail-fast and something failed; the report is recorded
    /// either way.
    pub fn run_stage<I, O, E, F>(&mut self, name: &str, inputs: Vec<I>, handler: F) -> Result<StageReport>
    where
        I: JobLabel + Send,
        O: Send,
        E: Display,
        F: Fn(I) -> std::result::Result<O, E> + Sync,
    {
        let (report, _) = self.run_jobs(name, Job::from_items(inputs), handler)?;
        Ok(report)
    }

    /// Like [`run_stage`](Self::run_stage) with explicit jobs, also returning the
    /// successful outputs in job order.
    pub fn run_jobs<T, O, E, F>(
        &mut self,
        name: &str,
        jobs: Vec<Job<T>>,
        handler: F,
    ) -> Result<(StageReport, Vec<O>)>
    where
        T: Send,
        O: Send,
        E: Display,
        F: Fn(T) -> std::result::Result<O, E> + Sync,
    {
        let batch = self.config.batch_config(name);
        info!(
            "Stage {}: {} items, {} workers{}",
            name,
            jobs.len(),
            batch.worker_count,
            if batch.fail_fast { ", fail-fast" } else { "" }
        );

        let mut scheduler = Scheduler::new(batch).with_name(name);
        let show_progress = !jobs.is_empty();
        if let Some(progress) = &self.progress {
            scheduler = scheduler.with_progress(progress.callback());
        }

        let run = scheduler.run(jobs, handler)?;
        match &self.progress {
            Some(progress) if show_progress => progress.finish(),
            _ => {}
        }

        let stage_report = StageReport::new(name, run.report);
        self.report.push(stage_report.clone());

        if batch.fail_fast && !stage_report.report.is_clean() {
            self.report.aborted = Some(name.to_string());
            return Err(RunnerError::StageAborted {
                stage: name.to_string(),
                failed: stage_report.report.failed.len(),
            });
        }

        let outputs = run.outputs.into_iter().map(|(_, o)| o).collect();
        Ok((stage_report, outputs))
    }

    fn stage_dir(&self, name: &str) -> Result<StageDir> {
        StageDir::create(name, self.config.work_dir.as_deref(), self.config.keep_intermediate)
    }

    fn ensure_dest(&self) -> Result<&Path> {
        let dest = self.config.dest_dir.as_path();
        if dest.as_os_str().is_empty() {
            return Err(RunnerError::Config("destination directory is not set".into()));
        }
        fs::create_dir_all(dest)?;
        Ok(dest)
    }

    /// plan → split → convert → compress, then the coverage summary.
    pub fn process(&mut self) -> Result<()> {
        let dest = self.ensure_dest()?.to_path_buf();
        let sources = scan_dir(&self.config.source_dir, RASTER_INPUTS)?;
        let split_dir = self.stage_dir(stage::SPLIT)?;
        let netcdf_dir = self.stage_dir(stage::CONVERT)?;

        let runner = Arc::clone(&self.runner);
        let gdal = self.gdal.clone();
        let step = self.config.step_size;

        let (_, plans) = self.run_jobs(stage::PLAN, Job::from_items(sources), |source: PathBuf| {
            let bbox = gdal.probe_bounds(&*runner, &source)?;
            let tiles = plan_tiles_for_file(&bbox, step, &source, split_dir.path())?;
            if tiles.is_empty() {
                info!("{} is smaller than one {}° tile, skipping", source.display(), step);
            }
            Ok::<_, ToolError>(tiles)
        })?;

        let tiles: Vec<Tile> = plans.into_iter().flatten().collect();
        let jobs = Job::from_items_with(tiles, tile_label);
        self.run_jobs(stage::SPLIT, jobs, |tile: Tile| gdal.split_tile(&*runner, &tile))?;

        let split_outputs = scan_dir(split_dir.path(), SPLIT_OUTPUTS)?;
        self.convert_stage(split_outputs, netcdf_dir.path())?;

        let netcdf_outputs = scan_dir(netcdf_dir.path(), NETCDF_OUTPUTS)?;
        self.run_stage(stage::COMPRESS, netcdf_outputs, |path: PathBuf| gzip_file(&path, &dest))?;

        if self.config.write_summary {
            self.write_summary(&dest)?;
        }
        Ok(())
    }

    /// Convert every raster in the source directory straight into the destination.
    pub fn convert(&mut self) -> Result<()> {
        let dest = self.ensure_dest()?.to_path_buf();
        let sources = scan_dir(&self.config.source_dir, RASTER_INPUTS)?;
        self.convert_stage(sources, &dest)
    }

    /// Extract rasters from every archive in the source directory, then convert
    /// them into the destination.
    pub fn extract(&mut self) -> Result<()> {
        let dest = self.ensure_dest()?.to_path_buf();
        let archives = scan_dir(&self.config.source_dir, ARCHIVE_INPUTS)?;
        let staging = self.stage_dir(stage::EXTRACT)?;

        let mut extractor = ArchiveExtractor::new();
        if let Some(work_dir) = &self.config.work_dir {
            extractor = extractor.with_temp_root(work_dir.clone());
        }
        let config = self.config.clone();

        self.run_stage(stage::EXTRACT, archives, |archive: PathBuf| {
            let extracted = extractor.extract_and_flatten(&archive, |p| config.is_wanted_extract(p))?;
            let prefix = archive
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "archive".to_string());
            extracted.persist_into(staging.path(), &prefix)
        })?;

        let extensions: Vec<&str> = config.archive_extensions.iter().map(String::as_str).collect();
        let rasters = scan_dir(staging.path(), &extensions)?;
        self.convert_stage(rasters, &dest)
    }

    /// Convert `inputs` to netCDF in `dest`.
    ///
    /// Output names are lower-cased, so `dem.tif` and `DEM.TIF` (or `x.hgt` and
    /// `x.tif`) map to one file. Only the first such input in sorted order is
    /// converted; the others fail with [`RunnerError::OutputCollision`].
    fn convert_stage(&mut self, inputs: Vec<PathBuf>, dest: &Path) -> Result<()> {
        let owners = stage::claim_outputs(&inputs, |p| netcdf_name(p).ok());
        let runner = Arc::clone(&self.runner);
        let gdal = self.gdal.clone();

        self.run_stage(stage::CONVERT, inputs, |path: PathBuf| -> Result<PathBuf> {
            let name = netcdf_name(&path)?;
            match owners.get(&name) {
                Some(owner) if *owner != path => Err(RunnerError::OutputCollision {
                    output: dest.join(&name),
                    owner: owner.clone(),
                    input: path,
                }),
                _ => Ok(gdal.convert_to_netcdf(&*runner, &path, dest)?),
            }
        })?;
        Ok(())
    }

    /// Download the `<area>` links of a coverage page into the destination.
    pub fn fetch_page(&mut self, page_url: &str) -> Result<()> {
        let client = http_client(self.fetch_timeout())?;
        let html = fetch_page(&client, page_url)?;
        let urls = harvest_area_links(&html, page_url)?;
        info!("Found {} links on {}", urls.len(), page_url);
        self.fetch_urls(urls)
    }

    /// Download every URL into the destination as `{index}-{name}`, skipping files
    /// already present.
    pub fn fetch_urls(&mut self, urls: Vec<String>) -> Result<()> {
        let dest = self.ensure_dest()?.to_path_buf();
        let client = http_client(self.fetch_timeout())?;

        let jobs = Job::from_items_with(urls.into_iter().enumerate(), |(_, url): &(usize, String)| {
            url.clone()
        });
        self.run_jobs(stage::FETCH, jobs, |(index, url): (usize, String)| {
            let target = dest.join(link_file_name(index, &url));
            if target.exists() {
                debug!("{} already present, skipping", target.display());
                return Ok(target);
            }
            download_to(&client, &url, &target).map(|_| target)
        })?;
        Ok(())
    }

    /// Download the terrain tiles covering `region` into `{dest}/{z}/{x}/{y}.tif`.
    pub fn fetch_region(&mut self, region: &BoundingBox, zoom: Option<u8>) -> Result<()> {
        let dest = self.ensure_dest()?.to_path_buf();
        let zoom = zoom.unwrap_or(self.config.fetch.zoom);
        let client = http_client(self.fetch_timeout())?;

        let mut fetcher = TileFetcher::with_client(&dest, client)?;
        if let Some(base_url) = &self.config.fetch.base_url {
            fetcher = fetcher.with_base_url(base_url);
        }

        let coords = tiles_for_region(region, zoom)?;
        let jobs = Job::from_items_with(coords, |c: &TileCoord| format!("{}/{}/{}", c.z, c.x, c.y));
        self.run_jobs(stage::FETCH, jobs, |coord: TileCoord| fetcher.fetch_tile(&coord))?;

        let stats = fetcher.download_stats();
        info!(
            "Fetched {} tiles ({} bytes), {} already cached",
            stats.tiles_downloaded, stats.bytes_downloaded, stats.cache_hits
        );
        Ok(())
    }

    /// Write `summary.json` for the tile outputs in `dir`.
    pub fn write_summary(&self, dir: &Path) -> Result<PathBuf> {
        let index = CoverageIndex::from_dir(dir)?;
        if index.is_empty() {
            warn!("No tile outputs in {}, writing an empty summary", dir.display());
        }
        let path = index.write_json(dir)?;
        info!("Wrote {} entries to {}", index.len(), path.display());
        Ok(path)
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.fetch.timeout_secs)
    }
}

fn tile_label(tile: &Tile) -> String {
    tile.dest_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| tile.dest_path.display().to_string())
}
