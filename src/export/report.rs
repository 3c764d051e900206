use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::axis::QuarterAxis;
use super::histogram::LinearHistogram;
use crate::analyzer::{Analysis, Partition};
use crate::clock::seconds_to_hours;
use crate::cohort::Cohort;
use crate::config::Config;
use crate::record::event::{EventType, FailureType};
use crate::tbf::FailureKind;

/// Machine-readable summary of one run. Infinite MTBF values are written
/// as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generator: String,
    pub input: String,
    pub cutoff_epoch: i64,
    pub capacity: u64,
    pub ingest: IngestSummary,
    pub cohorts: CohortSummary,
    pub device_mtbf: Vec<DeviceDistribution>,
    pub quarters: Vec<String>,
    pub fleet: Vec<FleetReport>,
    pub new_cohort_growth: Vec<GrowthPoint>,
    pub diagnostics: DiagnosticsSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub dbe: u64,
    pub otb: u64,
    pub clean: u64,
    pub malformed: u64,
    pub missing_timestamp: u64,
    pub clean_without_install: u64,
    pub unresolved_start: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortSummary {
    pub old: usize,
    pub new: usize,
    pub excluded: usize,
}

/// Per-device lifetime MTBF distribution in years.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDistribution {
    pub failure: &'static str,
    pub partition: Partition,
    pub devices: usize,
    pub mean_years: Option<f64>,
    pub values_years: Vec<f64>,
    /// Bin edges of `histogram`, `bins + 1` values.
    pub bin_edges_years: Vec<f64>,
    pub histogram: LinearHistogram,
}

/// One fleet series projected onto the report quarter axis.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub failure: FailureKind,
    pub partition: Partition,
    pub events: usize,
    pub failures: Vec<u64>,
    pub mtbf_hours: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthPoint {
    pub quarter: String,
    pub added: u64,
    pub cumulative: u64,
    pub percent_of_capacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSummary {
    pub malformed_rows: usize,
    pub missing_timestamps: usize,
    pub unresolved_starts: usize,
    pub duplicate_entries: usize,
}

/// `None` for non-finite values.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl Report {
    /// Assembles the report from a finished analysis.
    pub fn build(analysis: &Analysis, cfg: &Config, axis: &QuarterAxis) -> Self {
        let stats = &analysis.stats;
        let histogram = &cfg.report.histogram;

        let mut device_mtbf = Vec::new();
        for &failure in FailureType::all() {
            for &partition in Partition::all() {
                let values = analysis.device_mtbf_years(failure, partition);
                let mean_years = if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                };
                let binned =
                    LinearHistogram::from_values(histogram.bins, histogram.max_years, &values);
                device_mtbf.push(DeviceDistribution {
                    failure: failure.as_str(),
                    partition,
                    devices: values.len(),
                    mean_years,
                    values_years: values,
                    bin_edges_years: binned.edges(),
                    histogram: binned,
                });
            }
        }

        let fleet = analysis
            .fleet
            .iter()
            .map(|(&(failure, partition), series)| {
                let values = axis.project(series);
                FleetReport {
                    failure,
                    partition,
                    events: series.events,
                    failures: values.iter().map(|v| v.failures).collect(),
                    mtbf_hours: values
                        .iter()
                        .map(|v| finite(seconds_to_hours(v.mtbf_seconds)))
                        .collect(),
                }
            })
            .collect();

        let new_cohort_growth = axis
            .quarters()
            .iter()
            .map(|q| GrowthPoint {
                quarter: q.to_string(),
                added: analysis.growth.added_in(q),
                cumulative: analysis.growth.cumulative_at(q),
                percent_of_capacity: analysis.growth.percent_at(q),
            })
            .collect();

        Self {
            generator: format!("fleet-tbf {}", env!("CARGO_PKG_VERSION")),
            input: cfg.input.display().to_string(),
            cutoff_epoch: analysis.cohorts.cutoff_epoch(),
            capacity: analysis.growth.capacity(),
            ingest: IngestSummary {
                dbe: stats.count(EventType::Dbe),
                otb: stats.count(EventType::Otb),
                clean: stats.count(EventType::Clean),
                malformed: stats.malformed,
                missing_timestamp: stats.missing_timestamp,
                clean_without_install: stats.clean_without_install,
                unresolved_start: stats.unresolved_start,
            },
            cohorts: CohortSummary {
                old: analysis.cohorts.count(Cohort::Old),
                new: analysis.cohorts.count(Cohort::New),
                excluded: analysis.excluded.len(),
            },
            device_mtbf,
            quarters: axis.quarters().iter().map(ToString::to_string).collect(),
            fleet,
            new_cohort_growth,
            diagnostics: DiagnosticsSummary {
                malformed_rows: analysis.malformed.len(),
                missing_timestamps: analysis.missing_timestamps.len(),
                unresolved_starts: analysis.unresolved.len(),
                duplicate_entries: analysis.duplicates.len(),
            },
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("creating report {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)
            .with_context(|| format!("writing report {}", path.display()))?;
        out.write_all(b"\n")?;
        out.flush()
            .with_context(|| format!("flushing report {}", path.display()))?;
        Ok(())
    }
}
