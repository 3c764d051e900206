//! Common chronological axes that every series is projected onto.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyzer::FleetTable;
use crate::bucket::{BucketLabel, OrderGranularity};
use crate::clock::quarter_of_month;
use crate::config::QuarterWindow;
use crate::tbf::fleet::FleetSeries;

/// One quarter of a projected series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarterValue {
    pub quarter: BucketLabel,
    pub failures: u64,
    /// +inf when the quarter holds fewer than two failures or was never
    /// observed by the series.
    pub mtbf_seconds: f64,
}

/// Contiguous quarter axis from the first to the last observed year,
/// trimmed to the configured window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarterAxis {
    quarters: Vec<BucketLabel>,
}

impl QuarterAxis {
    /// Builds the axis from the years observed by any fleet series.
    pub fn build(fleet: &FleetTable, window: &QuarterWindow) -> Self {
        let years: BTreeSet<i32> = fleet
            .values()
            .flat_map(|s| s.quarters.years.iter().copied())
            .collect();
        let (Some(&first), Some(&last)) = (years.first(), years.last()) else {
            return Self::default();
        };

        let quarters = (first..=last)
            .flat_map(|year| (1..=4).map(move |q| BucketLabel::quarter(year, q)))
            .filter(|label| window.contains(label))
            .collect();
        Self { quarters }
    }

    pub fn quarters(&self) -> &[BucketLabel] {
        &self.quarters
    }

    pub fn len(&self) -> usize {
        self.quarters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quarters.is_empty()
    }

    /// Month labels covered by the axis quarters.
    pub fn months(&self) -> Vec<BucketLabel> {
        self.quarters
            .iter()
            .flat_map(|q| {
                let first = (q.period - 1) * 3 + 1;
                (first..first + 3).map(move |month| BucketLabel {
                    granularity: OrderGranularity::Month,
                    year: q.year,
                    period: month,
                })
            })
            .collect()
    }

    /// Projects a series' quarterly counts and MTBF onto the axis.
    pub fn project(&self, series: &FleetSeries) -> Vec<QuarterValue> {
        let observed: BTreeMap<BucketLabel, (u64, f64)> = series
            .quarters
            .labelled()
            .into_iter()
            .zip(series.quarterly_mtbf.mtbf_seconds.iter().copied())
            .map(|((label, count), mtbf)| (label, (count, mtbf)))
            .collect();

        self.quarters
            .iter()
            .map(|&quarter| {
                let (failures, mtbf_seconds) =
                    observed.get(&quarter).copied().unwrap_or((0, f64::INFINITY));
                QuarterValue {
                    quarter,
                    failures,
                    mtbf_seconds,
                }
            })
            .collect()
    }

    /// Projects a series' monthly counts onto the axis months.
    pub fn project_months(&self, series: &FleetSeries) -> Vec<(BucketLabel, u64)> {
        let observed: BTreeMap<BucketLabel, u64> = series.months.labelled().into_iter().collect();
        self.months()
            .into_iter()
            .map(|month| (month, observed.get(&month).copied().unwrap_or(0)))
            .collect()
    }
}

/// Quarter containing a month label.
pub fn quarter_of_month_label(month: &BucketLabel) -> BucketLabel {
    BucketLabel::quarter(month.year, quarter_of_month(month.period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Partition;
    use crate::clock::Timestamp;
    use crate::tbf::FailureKind;

    fn series(raw: &[&str]) -> FleetSeries {
        let set: BTreeSet<Timestamp> = raw
            .iter()
            .map(|r| Timestamp::parse(r).expect("valid"))
            .collect();
        FleetSeries::build(&set).expect("series")
    }

    fn table() -> FleetTable {
        let mut t = FleetTable::new();
        t.insert(
            (FailureKind::Dbe, Partition::All),
            series(&["2014-01-05 00:00:00", "2014-02-05 00:00:00"]),
        );
        t.insert(
            (FailureKind::Otb, Partition::All),
            series(&["2016-07-01 00:00:00"]),
        );
        t
    }

    #[test]
    fn test_axis_spans_observed_years_contiguously() {
        let axis = QuarterAxis::build(&table(), &QuarterWindow::default());
        assert_eq!(axis.len(), 12);
        assert_eq!(axis.quarters()[0].to_string(), "2014-Q1");
        assert_eq!(axis.quarters()[11].to_string(), "2016-Q4");
    }

    #[test]
    fn test_axis_window_trims() {
        let window = QuarterWindow {
            start: Some(BucketLabel::quarter(2014, 2)),
            end: Some(BucketLabel::quarter(2015, 1)),
        };
        let axis = QuarterAxis::build(&table(), &window);
        let labels: Vec<String> = axis.quarters().iter().map(|q| q.to_string()).collect();
        assert_eq!(labels, vec!["2014-Q2", "2014-Q3", "2014-Q4", "2015-Q1"]);
        assert_eq!(axis.months().len(), 12);
    }

    #[test]
    fn test_project_fills_unobserved_quarters() {
        let t = table();
        let axis = QuarterAxis::build(&t, &QuarterWindow::default());
        let otb = t
            .get(&(FailureKind::Otb, Partition::All))
            .expect("otb series");
        let values = axis.project(otb);

        assert_eq!(values.len(), 12);
        // 2014 and 2015 were never observed by the OTB series.
        assert_eq!(values[0].failures, 0);
        assert!(values[0].mtbf_seconds.is_infinite());
        assert_eq!(values[10].failures, 1);
        assert!(values[10].mtbf_seconds.is_infinite());

        let dbe = t
            .get(&(FailureKind::Dbe, Partition::All))
            .expect("dbe series");
        let values = axis.project(dbe);
        assert_eq!(values[0].failures, 2);
        assert_eq!(values[0].mtbf_seconds, 31.0 * 86_400.0);
    }

    #[test]
    fn test_project_months() {
        let t = table();
        let axis = QuarterAxis::build(&t, &QuarterWindow::default());
        let dbe = t
            .get(&(FailureKind::Dbe, Partition::All))
            .expect("dbe series");
        let months = axis.project_months(dbe);
        assert_eq!(months.len(), 36);
        assert_eq!(months[1].0.to_string(), "2014-02");
        assert_eq!(months[1].1, 1);
        assert_eq!(quarter_of_month_label(&months[4].0).to_string(), "2014-Q2");
    }

    #[test]
    fn test_empty_table_gives_empty_axis() {
        let axis = QuarterAxis::build(&FleetTable::new(), &QuarterWindow::default());
        assert!(axis.is_empty());
    }
}
