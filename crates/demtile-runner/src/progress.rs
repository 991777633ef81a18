//! Carriage-return progress line.

use demtile_batch::{ProgressCallback, ProgressSnapshot};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Rewrites one terminal line per completed item, e.g. `split:  42.5% (17/40)`.
#[derive(Clone)]
pub struct ProgressLine {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for ProgressLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressLine").finish_non_exhaustive()
    }
}

impl ProgressLine {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Scheduler callback writing one update per completed item.
    pub fn callback(&self) -> ProgressCallback {
        let line = self.clone();
        Box::new(move |stage, snapshot| line.update(stage, snapshot))
    }

    pub fn update(&self, stage: &str, snapshot: &ProgressSnapshot) {
        let mut out = self.out.lock();
        // Progress output is cosmetic; a closed terminal must not fail the stage.
        let _ = write!(out, "{}", format_progress(stage, snapshot));
        let _ = out.flush();
    }

    /// End the line after a stage.
    pub fn finish(&self) {
        let mut out = self.out.lock();
        let _ = writeln!(out);
        let _ = out.flush();
    }
}

/// `\r{stage}: {percent:5.1}% ({completed}/{total})`
pub fn format_progress(stage: &str, snapshot: &ProgressSnapshot) -> String {
    format!(
        "\r{}: {:5.1}% ({}/{})",
        stage,
        snapshot.percent(),
        snapshot.completed,
        snapshot.total
    )
}
