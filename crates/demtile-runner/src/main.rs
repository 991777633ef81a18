//! `demtile` command-line interface.

use clap::{Args, Parser, Subcommand};
use demtile_fetch::read_url_list;
use demtile_grid::{BoundingBox, Point};
use demtile_runner::{Pipeline, PipelineConfig, PipelineReport, ProgressLine, RunnerError};
use demtile_tools::SystemRunner;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status when `--strict` is set and any item failed.
const EXIT_ITEM_FAILURES: u8 = 2;

/// Split, convert and compress elevation rasters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalOptions {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workers per stage
    #[arg(short = 'j', long, global = true)]
    workers: Option<usize>,

    /// Grid step in degrees
    #[arg(long, global = true)]
    step: Option<u32>,

    /// Stop a stage after its first failed item
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Keep stage working directories
    #[arg(long, global = true)]
    keep_intermediate: bool,

    /// Parent directory for stage working directories
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Do not draw the progress line
    #[arg(long, global = true)]
    no_progress: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit with status 2 if any item failed
    #[arg(long, global = true)]
    strict: bool,

    /// Also write the run report as JSON
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split rasters into grid tiles, convert them to netCDF and gzip them
    Process {
        /// Directory with the source `.tif` rasters
        source: PathBuf,
        /// Output directory
        dest: PathBuf,
    },

    /// Convert rasters to netCDF
    Convert {
        /// Directory with the source `.tif` rasters
        source: PathBuf,
        /// Output directory
        dest: PathBuf,
    },

    /// Extract rasters from `.zip`/`.gz` archives and convert them to netCDF
    Extract {
        /// Directory with the archives
        source: PathBuf,
        /// Output directory
        dest: PathBuf,
    },

    /// Download source data
    Fetch {
        #[command(flatten)]
        source: FetchSource,

        /// Slippy Map zoom for --region
        #[arg(long)]
        zoom: Option<u8>,

        /// Tile server to use instead of the AWS bucket
        #[arg(long)]
        base_url: Option<String>,

        /// Output directory
        dest: PathBuf,
    },

    /// Rebuild `summary.json` for a directory of tile outputs
    Summary {
        /// Directory with the tile outputs
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct FetchSource {
    /// Coverage page whose `<area>` links are downloaded
    #[arg(long)]
    page: Option<String>,

    /// File with one URL per line
    #[arg(long)]
    urls: Option<PathBuf>,

    /// Terrain Tiles region as "ulx,uly,lrx,lry"
    #[arg(long, allow_hyphen_values = true)]
    region: Option<Region>,
}

/// `ulx,uly,lrx,lry` in degrees.
#[derive(Debug, Clone, Copy)]
struct Region(BoundingBox);

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{}': {}", p.trim(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let [ulx, uly, lrx, lry] = values[..] else {
            return Err("expected 'ulx,uly,lrx,lry'".into());
        };
        BoundingBox::new(Point::new(ulx, uly), Point::new(lrx, lry))
            .map(Region)
            .map_err(|e| e.to_string())
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// File config first, then command-line overrides.
fn build_config(options: &GlobalOptions, command: &Command) -> Result<PipelineConfig, RunnerError> {
    let mut config = match &options.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(workers) = options.workers {
        config.worker_count = workers;
        config.fetch.worker_count = workers;
    }
    if let Some(step) = options.step {
        config.step_size = step;
    }
    if options.fail_fast {
        config.fail_fast = true;
    }
    if options.keep_intermediate {
        config.keep_intermediate = true;
    }
    if let Some(work_dir) = &options.work_dir {
        config.work_dir = Some(work_dir.clone());
    }

    match command {
        Command::Process { source, dest }
        | Command::Convert { source, dest }
        | Command::Extract { source, dest } => {
            config.source_dir = source.clone();
            config.dest_dir = dest.clone();
        }
        Command::Fetch { dest, base_url, .. } => {
            config.dest_dir = dest.clone();
            if let Some(base_url) = base_url {
                config.fetch.base_url = Some(base_url.clone());
            }
        }
        Command::Summary { dir } => {
            config.dest_dir = dir.clone();
        }
    }
    Ok(config)
}

fn execute(pipeline: &mut Pipeline, command: Command) -> Result<(), RunnerError> {
    match command {
        Command::Process { .. } => {
            pipeline.check_tools()?;
            pipeline.process()
        }
        Command::Convert { .. } => {
            pipeline.check_tools()?;
            pipeline.convert()
        }
        Command::Extract { .. } => {
            pipeline.check_tools()?;
            pipeline.extract()
        }
        Command::Fetch { source, zoom, .. } => match (source.page, source.urls, source.region) {
            (Some(page), _, _) => pipeline.fetch_page(&page),
            (_, Some(list), _) => {
                let urls = read_url_list(&list)?;
                pipeline.fetch_urls(urls)
            }
            (_, _, Some(Region(bbox))) => pipeline.fetch_region(&bbox, zoom),
            (None, None, None) => Err(RunnerError::Config(
                "one of --page, --urls or --region is required".into(),
            )),
        },
        Command::Summary { dir } => pipeline.write_summary(&dir).map(|_| ()),
    }
}

fn print_report(report: &PipelineReport, path: Option<&PathBuf>) {
    if !report.stages.is_empty() {
        let mut out = io::stdout().lock();
        if let Err(e) = report.write_summary(&mut out) {
            error!("Failed to print summary: {}", e);
        }
    }
    if let Some(path) = path {
        match report.write_json(path) {
            Ok(()) => info!("Wrote report to {}", path.display()),
            Err(e) => error!("{}", e),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.options.verbose);

    let config = match build_config(&cli.options, &cli.command) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let mut pipeline = match Pipeline::new(config, Arc::new(SystemRunner)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };
    if !cli.options.no_progress {
        pipeline = pipeline.with_progress(ProgressLine::stdout());
    }

    let outcome = execute(&mut pipeline, cli.command);
    let report = pipeline.into_report();
    print_report(&report, cli.options.report.as_ref());

    match outcome {
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
        Ok(()) if cli.options.strict && report.has_failures() => ExitCode::from(EXIT_ITEM_FAILURES),
        Ok(()) => ExitCode::SUCCESS,
    }
}
