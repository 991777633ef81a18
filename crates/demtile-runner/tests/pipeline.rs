//! End-to-end pipeline runs against a fake GDAL.

use demtile_batch::SKIPPED_REASON;
use demtile_grid::{CoverageIndex, SUMMARY_FILE_NAME};
use demtile_runner::{stage, Pipeline, PipelineConfig, RunnerError, StageSettings};
use demtile_tools::{Result as ToolResult, ToolCommand, ToolError, ToolOutput, ToolRunner};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn corners(ulx: f64, uly: f64, lrx: f64, lry: f64) -> String {
    format!(
        "Driver: GTiff/GeoTIFF\n\
         Corner Coordinates:\n\
         Upper Left  ({:12.7}, {:12.7}) \n\
         Lower Right ({:12.7}, {:12.7}) \n",
        ulx, uly, lrx, lry
    )
}

/// `gdalinfo` answers by source file name; `gdal_translate` writes its last
/// argument. Split windows whose ulx is in `fail_ulx` and conversions of files
/// containing `fail_convert` exit non-zero.
#[derive(Default)]
struct FakeGdal {
    fail_ulx: Vec<&'static str>,
    fail_convert: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeGdal {
    fn count(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(needle)).count()
    }
}

impl ToolRunner for FakeGdal {
    fn run(&self, command: &ToolCommand) -> ToolResult<ToolOutput> {
        self.calls.lock().push(command.to_string());
        let args: Vec<String> = command
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        if command.program_name() == "gdalinfo" {
            let source = args.first().map(String::as_str).unwrap_or_default();
            return Ok(match Path::new(source).file_name().and_then(|n| n.to_str()) {
                Some("tiny.tif") => ToolOutput::success(corners(10.2, 50.9, 10.8, 50.1)),
                Some("broken.tif") => ToolOutput::success("Driver: GTiff/GeoTIFF\n"),
                _ => ToolOutput::success(corners(10.0, 60.0, 20.0, 50.0)),
            });
        }

        if args.first().map(String::as_str) == Some("-projwin")
            && self.fail_ulx.contains(&args[1].as_str())
        {
            return Ok(ToolOutput::failure(1, "ERROR 1: Computed -srcwin falls outside raster"));
        }
        if args.first().map(String::as_str) == Some("-of") {
            if let Some(marker) = self.fail_convert {
                if args.iter().any(|a| a.contains(marker)) {
                    return Ok(ToolOutput::failure(1, "ERROR 4: not recognized as a supported file format"));
                }
            }
        }

        let out = args.last().ok_or_else(|| ToolError::InvalidPath(".".into()))?;
        fs::write(out, format!("output of {}", command))?;
        Ok(ToolOutput::success(""))
    }
}

struct Fixture {
    _root: TempDir,
    source: PathBuf,
    dest: PathBuf,
    work: PathBuf,
}

impl Fixture {
    fn new(sources: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        let dest = root.path().join("dest");
        let work = root.path().join("work");
        fs::create_dir_all(&source).unwrap();
        for name in sources {
            fs::write(source.join(name), b"GeoTIFF").unwrap();
        }
        Self {
            _root: root,
            source,
            dest,
            work,
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            source_dir: self.source.clone(),
            dest_dir: self.dest.clone(),
            work_dir: Some(self.work.clone()),
            worker_count: 3,
            ..PipelineConfig::default()
        }
    }

    fn dest_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn work_is_empty(&self) -> bool {
        fs::read_dir(&self.work).map(|mut d| d.next().is_none()).unwrap_or(true)
    }
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_process_end_to_end() {
    let fx = Fixture::new(&["SRTM.tif", "notes.txt"]);
    let gdal = Arc::new(FakeGdal::default());
    let mut pipeline = Pipeline::new(fx.config(), gdal.clone()).unwrap();

    pipeline.process().unwrap();
    let report = pipeline.into_report();

    assert_eq!(report.stage(stage::PLAN).unwrap().report.total, 1);
    for name in [stage::SPLIT, stage::CONVERT, stage::COMPRESS] {
        let stage = report.stage(name).unwrap();
        assert_eq!(stage.report.total, 4, "{}", name);
        assert_eq!(stage.report.succeeded, 4, "{}", name);
    }
    assert!(!report.has_failures());
    assert!(report.finished_at.is_some());
    assert_eq!(gdal.count("-projwin"), 4);

    assert_eq!(
        fx.dest_files(),
        vec![
            "10_50_15_45_srtm.nc.gz",
            "10_55_15_50_srtm.nc.gz",
            "15_50_20_45_srtm.nc.gz",
            "15_55_20_50_srtm.nc.gz",
            SUMMARY_FILE_NAME,
        ]
    );

    let mut text = String::new();
    GzDecoder::new(File::open(fx.dest.join("10_55_15_50_srtm.nc.gz")).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    assert!(text.contains("netCDF"));

    let index = CoverageIndex::read_json(fx.dest.join(SUMMARY_FILE_NAME)).unwrap();
    assert_eq!(index.len(), 4);
    assert_eq!(index.find(52.0, 12.0).unwrap().file, "10_55_15_50_srtm.nc.gz");

    assert!(fx.work_is_empty(), "stage directories were not removed");
}

#[test]
fn test_empty_source_runs_empty_stages() {
    let fx = Fixture::new(&[]);
    let mut pipeline = Pipeline::new(fx.config(), Arc::new(FakeGdal::default())).unwrap();

    pipeline.process().unwrap();
    let report = pipeline.into_report();

    assert_eq!(report.stages.len(), 4);
    for stage in &report.stages {
        assert_eq!(stage.report.total, 0);
        assert_eq!(stage.report.succeeded, 0);
        assert!(stage.report.failed.is_empty());
    }
    assert_eq!(fx.dest_files(), vec![SUMMARY_FILE_NAME]);
}

#[test]
fn test_failures_are_collected_across_stages() {
    let fx = Fixture::new(&["broken.tif", "srtm.tif", "tiny.tif"]);
    let gdal = Arc::new(FakeGdal {
        fail_ulx: vec!["15"],
        fail_convert: Some("10_50_15_45"),
        ..FakeGdal::default()
    });
    let mut pipeline = Pipeline::new(fx.config(), gdal).unwrap();

    pipeline.process().unwrap();
    let report = pipeline.into_report();

    let plan = &report.stage(stage::PLAN).unwrap().report;
    assert_eq!(plan.total, 3);
    assert_eq!(plan.failed.len(), 1);
    assert!(plan.failed[0].input.ends_with("broken.tif"));

    // tiny.tif is smaller than one step and contributes no tiles.
    let split = &report.stage(stage::SPLIT).unwrap().report;
    assert_eq!(split.total, 4);
    assert_eq!(split.failed.len(), 2);
    assert!(split.failed.iter().all(|f| f.reason.contains("falls outside raster")));

    let convert = &report.stage(stage::CONVERT).unwrap().report;
    assert_eq!((convert.total, convert.succeeded), (2, 1));

    let compress = &report.stage(stage::COMPRESS).unwrap().report;
    assert_eq!((compress.total, compress.succeeded), (1, 1));

    assert_eq!(report.failures().len(), 4);
    assert!(report.aborted.is_none());
    assert_eq!(fx.dest_files(), vec!["10_55_15_50_srtm.nc.gz", SUMMARY_FILE_NAME]);
}

#[test]
fn test_fail_fast_stage_aborts_run() {
    let fx = Fixture::new(&["srtm.tif"]);
    let mut config = fx.config();
    config.worker_count = 1;
    config.stages.insert(
        stage::SPLIT.to_string(),
        StageSettings {
            worker_count: None,
            fail_fast: Some(true),
        },
    );
    let gdal = Arc::new(FakeGdal {
        fail_ulx: vec!["10"],
        ..FakeGdal::default()
    });
    let mut pipeline = Pipeline::new(config, gdal.clone()).unwrap();

    let err = pipeline.process().unwrap_err();
    match err {
        RunnerError::StageAborted { stage, failed } => {
            assert_eq!(stage, "split");
            assert_eq!(failed, 4);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let report = pipeline.into_report();
    assert_eq!(report.aborted.as_deref(), Some("split"));
    assert!(report.stage(stage::CONVERT).is_none());

    let split = &report.stage(stage::SPLIT).unwrap().report;
    assert_eq!(split.skipped, 3);
    assert_eq!(split.succeeded + split.failed.len(), split.total);
    assert!(split.failed.iter().skip(1).all(|f| f.reason == SKIPPED_REASON));
    assert_eq!(gdal.count("-projwin"), 1);

    assert!(!fx.dest.join(SUMMARY_FILE_NAME).exists());
    assert!(fx.work_is_empty());
}

#[test]
fn test_convert_only() {
    let fx = Fixture::new(&["a.tif", "B.TIF", "c.hgt"]);
    let mut pipeline = Pipeline::new(fx.config(), Arc::new(FakeGdal::default())).unwrap();

    pipeline.convert().unwrap();
    let report = pipeline.into_report();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stage(stage::CONVERT).unwrap().report.succeeded, 2);
    assert_eq!(fx.dest_files(), vec!["a.nc", "b.nc"]);
}

#[test]
fn test_extract_then_convert() {
    let fx = Fixture::new(&[]);
    fs::write(
        fx.source.join("srtm_38_01.zip"),
        zip_bytes(&[
            ("srtm_38_01/srtm_38_01.tif", b"raster".as_slice()),
            ("srtm_38_01/readme.txt", b"notes".as_slice()),
        ]),
    )
    .unwrap();
    fs::write(
        fx.source.join("docs.zip"),
        zip_bytes(&[("license.txt", b"text".as_slice())]),
    )
    .unwrap();
    let mut gz = GzEncoder::new(File::create(fx.source.join("N47E008.hgt.gz")).unwrap(), Compression::fast());
    gz.write_all(b"hgt samples").unwrap();
    gz.finish().unwrap();

    let mut pipeline = Pipeline::new(fx.config(), Arc::new(FakeGdal::default())).unwrap();
    pipeline.extract().unwrap();
    let report = pipeline.into_report();

    let extract = &report.stage(stage::EXTRACT).unwrap().report;
    assert_eq!(extract.total, 3);
    assert_eq!(extract.succeeded, 2);
    assert_eq!(extract.failed.len(), 1);
    assert!(extract.failed[0].input.ends_with("docs.zip"));

    let convert = &report.stage(stage::CONVERT).unwrap().report;
    assert_eq!((convert.total, convert.succeeded), (2, 2));
    assert_eq!(
        fx.dest_files(),
        vec!["n47e008.hgt-n47e008.nc", "srtm_38_01-srtm_38_01.nc"]
    );
    assert!(fx.work_is_empty());
}

#[test]
fn test_case_variants_do_not_overwrite() {
    let fx = Fixture::new(&["dem.tif", "DEM.TIF"]);
    let gdal = Arc::new(FakeGdal::default());
    let mut pipeline = Pipeline::new(fx.config(), gdal.clone()).unwrap();

    pipeline.convert().unwrap();
    let report = pipeline.into_report();

    let convert = &report.stage(stage::CONVERT).unwrap().report;
    assert_eq!((convert.total, convert.succeeded), (2, 1));
    assert_eq!(convert.failed.len(), 1);
    assert!(convert.failed[0].input.ends_with("dem.tif"));
    assert!(convert.failed[0].reason.contains("would overwrite"));
    assert!(convert.failed[0].reason.contains("DEM.TIF"));
    assert_eq!(gdal.count("-of"), 1);
    assert_eq!(fx.dest_files(), vec!["dem.nc"]);
}

#[test]
fn test_extracted_name_clashes() {
    let fx = Fixture::new(&[]);
    // Same stem, different raster formats.
    fs::write(
        fx.source.join("n47.zip"),
        zip_bytes(&[
            ("N47E008.hgt", b"hgt samples".as_slice()),
            ("N47E008.tif", b"raster".as_slice()),
        ]),
    )
    .unwrap();
    // Same archive stem, so both persist under the "t.tif" prefix.
    fs::write(
        fx.source.join("t.tif.zip"),
        zip_bytes(&[("t.tif", b"zipped".as_slice())]),
    )
    .unwrap();
    let mut gz = GzEncoder::new(File::create(fx.source.join("t.tif.gz")).unwrap(), Compression::fast());
    gz.write_all(b"gzipped").unwrap();
    gz.finish().unwrap();

    let mut pipeline = Pipeline::new(fx.config(), Arc::new(FakeGdal::default())).unwrap();
    pipeline.extract().unwrap();
    let report = pipeline.into_report();

    let extract = &report.stage(stage::EXTRACT).unwrap().report;
    assert_eq!((extract.total, extract.succeeded), (3, 3));

    let convert = &report.stage(stage::CONVERT).unwrap().report;
    assert_eq!((convert.total, convert.succeeded), (4, 3));
    assert_eq!(convert.failed.len(), 1);
    assert!(convert.failed[0].input.ends_with("n47-N47E008.tif"));
    assert!(convert.failed[0].reason.contains("n47-N47E008.hgt"));
    assert_eq!(
        fx.dest_files(),
        vec!["n47-n47e008.nc", "t.tif-1-t.nc", "t.tif-t.nc"]
    );
}

#[test]
fn test_keep_intermediate() {
    let fx = Fixture::new(&["srtm.tif"]);
    let mut config = fx.config();
    config.keep_intermediate = true;
    config.write_summary = false;
    let mut pipeline = Pipeline::new(config, Arc::new(FakeGdal::default())).unwrap();

    pipeline.process().unwrap();

    let kept: Vec<_> = fs::read_dir(&fx.work).unwrap().collect();
    assert_eq!(kept.len(), 2);
    assert!(!fx.dest.join(SUMMARY_FILE_NAME).exists());
}

#[test]
fn test_invalid_config_rejected_before_any_stage() {
    let fx = Fixture::new(&["srtm.tif"]);
    let mut config = fx.config();
    config.worker_count = 0;
    let gdal = Arc::new(FakeGdal::default());

    let err = Pipeline::new(config, gdal.clone()).unwrap_err();
    assert!(matches!(err, RunnerError::Config(_)));
    assert!(gdal.calls.lock().is_empty());
}
