//! Whole-run report across stages.

use crate::stage::StageReport;
use crate::Result;
use chrono::{DateTime, Utc};
use demtile_batch::FailedItem;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Stage reports of one pipeline run, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
    /// Name of the stage that aborted the run under fail-fast.
    pub aborted: Option<String>,
}

impl Default for PipelineReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            aborted: None,
        }
    }
}

impl PipelineReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Items attempted across all stages.
    pub fn total(&self) -> usize {
        self.stages.iter().map(|s| s.report.total).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.stages.iter().map(|s| s.report.succeeded).sum()
    }

    /// Every failure as `(stage, item)`.
    pub fn failures(&self) -> Vec<(&str, &FailedItem)> {
        self.stages
            .iter()
            .flat_map(|s| s.report.failed.iter().map(move |f| (s.name.as_str(), f)))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| !s.report.is_clean())
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Human-readable summary: one line per stage, then every failure.
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for stage in &self.stages {
            let r = &stage.report;
            writeln!(
                out,
                "{:<9} {:>6} total {:>6} succeeded {:>6} failed  ({:.1}s)",
                stage.name,
                r.total,
                r.succeeded,
                r.failed.len(),
                r.elapsed.as_secs_f64()
            )?;
        }
        writeln!(
            out,
            "{:<9} {:>6} total {:>6} succeeded {:>6} failed",
            "all",
            self.total(),
            self.succeeded(),
            self.total() - self.succeeded()
        )?;

        let failures = self.failures();
        if !failures.is_empty() {
            writeln!(out, "\nFailures:")?;
            for (stage, item) in failures {
                writeln!(out, "  [{}] {}: {}", stage, item.input, item.reason)?;
            }
        }
        if let Some(stage) = &self.aborted {
            writeln!(out, "\nRun aborted in stage '{}' (fail-fast)", stage)?;
        }
        Ok(())
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
