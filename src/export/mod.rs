pub mod axis;
pub mod diagnostics;
pub mod histogram;
pub mod report;
pub mod tables;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use self::axis::QuarterAxis;
use self::report::Report;
use crate::analyzer::Analysis;
use crate::config::Config;

/// Paths of every file written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub report: PathBuf,
    pub quarterly: PathBuf,
    pub monthly: PathBuf,
    pub unresolved_starts: PathBuf,
    pub duplicate_entries: PathBuf,
}

impl OutputPaths {
    /// Resolves the configured file names against `output_dir`.
    pub fn from_config(cfg: &Config) -> Self {
        let files = &cfg.report.files;
        Self {
            report: cfg.output_path(&files.report),
            quarterly: cfg.output_path(&files.quarterly),
            monthly: cfg.output_path(&files.monthly),
            unresolved_starts: cfg.output_path(&files.unresolved_starts),
            duplicate_entries: cfg.output_path(&files.duplicate_entries),
        }
    }
}

/// Writes the report, the quarterly and monthly tables and both
/// diagnostic files.
pub fn write_outputs(analysis: &Analysis, cfg: &Config) -> Result<OutputPaths> {
    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating output dir {}", cfg.output_dir.display()))?;

    let window = cfg.quarter_window()?;
    let axis = QuarterAxis::build(&analysis.fleet, &window);
    let paths = OutputPaths::from_config(cfg);

    Report::build(analysis, cfg, &axis).write(&paths.report)?;
    tables::write_csv(&paths.quarterly, &tables::quarterly_rows(&analysis.fleet, &axis))?;
    tables::write_csv(&paths.monthly, &tables::monthly_rows(&analysis.fleet, &axis))?;
    diagnostics::write_unresolved_starts(&paths.unresolved_starts, &analysis.unresolved)?;
    diagnostics::write_duplicate_entries(&paths.duplicate_entries, &analysis.duplicates)?;

    info!(
        output_dir = %cfg.output_dir.display(),
        quarters = axis.len(),
        unresolved_starts = analysis.unresolved.len(),
        duplicate_entries = analysis.duplicates.len(),
        "report written",
    );

    Ok(paths)
}
