//! GDAL command builders.
//!
//! Output files written by `gdal_translate` are not trusted on exit status alone:
//! after a run the output must exist and be non-empty, and any failed run has its
//! partial output removed.

use crate::{invoke, locate, Result, ToolCommand, ToolError, ToolRunner};
use demtile_grid::{parse_corner_metadata, BoundingBox, Tile};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions replaced by `.nc` when naming converted files.
const RASTER_EXTENSIONS: &[&str] = &[".tiff", ".tif", ".hgt"];

/// Programs and options used to drive GDAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gdal {
    /// Metadata probe, `gdalinfo` by default.
    pub info_program: PathBuf,
    /// Raster translator, `gdal_translate` by default.
    pub translate_program: PathBuf,
    /// Creation option passed to the netCDF driver.
    pub netcdf_format: String,
}

impl Default for Gdal {
    fn default() -> Self {
        Self {
            info_program: PathBuf::from("gdalinfo"),
            translate_program: PathBuf::from("gdal_translate"),
            netcdf_format: "FORMAT=NC4".to_string(),
        }
    }
}

impl Gdal {
    /// Resolve both programs, failing if either is unavailable.
    pub fn check_available(&self) -> Result<()> {
        for program in [&self.info_program, &self.translate_program] {
            let path = locate(program)?;
            debug!("Using {} at {}", program.display(), path.display());
        }
        Ok(())
    }

    /// `gdalinfo {source}`
    pub fn info_command(&self, source: &Path) -> ToolCommand {
        ToolCommand::new(&self.info_program).arg(source)
    }

    /// `gdal_translate -projwin {ulx} {uly} {lrx} {lry} {source} {dest}`
    pub fn projwin_command(&self, tile: &Tile) -> ToolCommand {
        ToolCommand::new(&self.translate_program)
            .arg("-projwin")
            .args(tile.projwin())
            .arg(&tile.source_file)
            .arg(&tile.dest_path)
    }

    /// `gdal_translate -of netCDF -co {format} {input} {output}`
    pub fn netcdf_command(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.translate_program)
            .args(["-of", "netCDF", "-co"])
            .arg(&self.netcdf_format)
            .arg(input)
            .arg(output)
    }

    /// Read a raster's corner coordinates.
    pub fn probe_bounds(&self, runner: &dyn ToolRunner, source: &Path) -> Result<BoundingBox> {
        let output = invoke(runner, &self.info_command(source))?;
        Ok(parse_corner_metadata(&output.stdout)?)
    }

    /// Cut one tile out of its source raster.
    pub fn split_tile(&self, runner: &dyn ToolRunner, tile: &Tile) -> Result<PathBuf> {
        produce(runner, &self.projwin_command(tile), &tile.dest_path)
    }

    /// Convert `input` to netCDF in `dest_dir`, returning the written path.
    pub fn convert_to_netcdf(
        &self,
        runner: &dyn ToolRunner,
        input: &Path,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let output = dest_dir.join(netcdf_name(input)?);
        produce(runner, &self.netcdf_command(input, &output), &output)
    }
}

/// File name a converted raster gets: lower-cased, with the raster extension
/// replaced by `.nc`.
pub fn netcdf_name(input: &Path) -> Result<String> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ToolError::InvalidPath(input.to_path_buf()))?
        .to_lowercase();

    let stem = RASTER_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name.as_str());

    Ok(format!("{}.nc", stem))
}

/// Run a command that must leave a non-empty file at `output`.
fn produce(runner: &dyn ToolRunner, command: &ToolCommand, output: &Path) -> Result<PathBuf> {
    let result = invoke(runner, command).and_then(|_| verify_output(output));
    if result.is_err() {
        remove_partial(output);
    }
    result
}

fn verify_output(path: &Path) -> Result<PathBuf> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path.to_path_buf()),
        _ => Err(ToolError::MissingOutput(path.to_path_buf())),
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
