use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::axis::{quarter_of_month_label, QuarterAxis};
use super::report::finite;
use crate::analyzer::FleetTable;
use crate::clock::seconds_to_hours;

/// One row of `quarterly.csv`. An empty `mtbf_hours` means +inf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterlyRow {
    pub quarter: String,
    pub failure: &'static str,
    pub partition: &'static str,
    pub failures: u64,
    pub mtbf_hours: Option<f64>,
}

/// One row of `monthly.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRow {
    pub month: String,
    pub quarter: String,
    pub failure: &'static str,
    pub partition: &'static str,
    pub failures: u64,
}

/// Long-format quarterly rows, series by series.
pub fn quarterly_rows(fleet: &FleetTable, axis: &QuarterAxis) -> Vec<QuarterlyRow> {
    fleet
        .iter()
        .flat_map(|(&(failure, partition), series)| {
            axis.project(series).into_iter().map(move |v| QuarterlyRow {
                quarter: v.quarter.to_string(),
                failure: failure.as_str(),
                partition: partition.as_str(),
                failures: v.failures,
                mtbf_hours: finite(seconds_to_hours(v.mtbf_seconds)),
            })
        })
        .collect()
}

/// Long-format monthly rows, series by series.
pub fn monthly_rows(fleet: &FleetTable, axis: &QuarterAxis) -> Vec<MonthlyRow> {
    fleet
        .iter()
        .flat_map(|(&(failure, partition), series)| {
            axis.project_months(series)
                .into_iter()
                .map(move |(month, failures)| MonthlyRow {
                    month: month.to_string(),
                    quarter: quarter_of_month_label(&month).to_string(),
                    failure: failure.as_str(),
                    partition: partition.as_str(),
                    failures,
                })
        })
        .collect()
}

/// Writes rows as CSV with a header line.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
