pub mod growth;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use self::growth::CohortGrowth;
use crate::clock::seconds_to_years;
use crate::cohort::{Cohort, CohortAssignment, CohortError, MissingCohortPolicy};
use crate::config::Config;
use crate::ingest::collector::TimestampCollector;
use crate::ingest::interval::UnresolvedStart;
use crate::ingest::{self, MalformedRow, MissingTimestamp};
use crate::record::event::FailureType;
use crate::record::open_log;
use crate::record::parse::ParsedRow;
use crate::record::stats::IngestStats;
use crate::tbf::device::{device_mtbfs, DeviceMtbfTable};
use crate::tbf::fleet::FleetSeries;
use crate::tbf::FailureKind;

/// Device population a fleet series is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    All,
    Old,
    New,
}

impl Partition {
    /// Returns the canonical report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Old => "old",
            Self::New => "new",
        }
    }

    /// Cohort this partition is restricted to, if any.
    pub const fn cohort(self) -> Option<Cohort> {
        match self {
            Self::All => None,
            Self::Old => Some(Cohort::Old),
            Self::New => Some(Cohort::New),
        }
    }

    /// Return all partitions in report order.
    pub fn all() -> &'static [Self] {
        &[Self::All, Self::Old, Self::New]
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device with at least one zero or negative delta in one failure stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DuplicateEntry {
    pub serial: String,
    pub failure: FailureType,
}

/// Fleet series keyed by failure kind and partition.
pub type FleetTable = BTreeMap<(FailureKind, Partition), FleetSeries>;

/// Everything one run produces, ready for reporting.
#[derive(Debug)]
pub struct Analysis {
    pub stats: IngestStats,
    pub malformed: Vec<MalformedRow>,
    pub missing_timestamps: Vec<MissingTimestamp>,
    pub unresolved: BTreeSet<UnresolvedStart>,
    pub cohorts: CohortAssignment,
    /// Devices left out of cohort partitions under the `exclude` policy.
    pub excluded: BTreeSet<String>,
    pub devices: DeviceMtbfTable,
    pub duplicates: BTreeSet<DuplicateEntry>,
    pub fleet: FleetTable,
    pub growth: CohortGrowth,
}

impl Analysis {
    /// Per-device lifetime MTBF in years for one failure type, restricted
    /// to `partition`. Devices without a positive delta are left out.
    pub fn device_mtbf_years(&self, failure: FailureType, partition: Partition) -> Vec<f64> {
        self.devices
            .get(&failure)
            .into_iter()
            .flatten()
            .filter(|d| match partition.cohort() {
                None => true,
                Some(cohort) => self.cohorts.is(&d.serial, cohort),
            })
            .filter_map(|d| d.mtbf_seconds)
            .map(seconds_to_years)
            .collect()
    }

    /// Fleet series of one failure kind and partition.
    pub fn series(&self, kind: FailureKind, partition: Partition) -> Option<&FleetSeries> {
        self.fleet.get(&(kind, partition))
    }
}

/// Runs the batch phases in order: ingest, cohort resolution, per-device
/// MTBF, fleet series and cohort growth.
#[derive(Debug, Clone)]
pub struct Analyzer {
    cutoff_epoch: i64,
    on_missing: MissingCohortPolicy,
    capacity: u64,
}

impl Analyzer {
    /// Creates an analyzer with explicit parameters.
    pub fn new(cutoff_epoch: i64, on_missing: MissingCohortPolicy, capacity: u64) -> Self {
        Self {
            cutoff_epoch,
            on_missing,
            capacity,
        }
    }

    /// Creates an analyzer from the loaded configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.cohort.cutoff_epoch,
            cfg.cohort.on_missing,
            cfg.fleet.capacity,
        )
    }

    /// Analyze the event log at `path`.
    pub fn run_file(&self, path: &Path) -> Result<Analysis> {
        let rows = open_log(path)?;
        info!(path = %path.display(), "reading event log");
        self.run(rows)
            .with_context(|| format!("analyzing {}", path.display()))
    }

    /// Analyze already-parsed rows.
    pub fn run<I>(&self, rows: I) -> Result<Analysis>
    where
        I: IntoIterator<Item = ParsedRow>,
    {
        // 1. Single forward pass.
        let state = ingest::ingest(rows);

        // 2. Cohorts.
        let cohorts = CohortAssignment::resolve(&state.cohort_epochs, self.cutoff_epoch);
        let excluded = self.check_cohorts(&cohorts, &state.serials)?;
        info!(
            cutoff_epoch = self.cutoff_epoch,
            old = cohorts.count(Cohort::Old),
            new = cohorts.count(Cohort::New),
            excluded = excluded.len(),
            "cohorts resolved",
        );

        // 3. Per-device MTBF.
        let mut devices = DeviceMtbfTable::new();
        let mut duplicates = BTreeSet::new();
        for &failure in FailureType::all() {
            let results = device_mtbfs(state.intervals.stream(failure), failure);
            for d in results.iter().filter(|d| d.has_duplicates()) {
                warn!(
                    serial = %d.serial,
                    failure = failure.as_str(),
                    non_positive = d.non_positive,
                    "duplicate or out-of-order entries excluded from mean",
                );
                duplicates.insert(DuplicateEntry {
                    serial: d.serial.clone(),
                    failure,
                });
            }
            info!(
                failure = failure.as_str(),
                devices = results.len(),
                with_mtbf = results.iter().filter(|d| d.mtbf_seconds.is_some()).count(),
                "per-device mtbf computed",
            );
            devices.insert(failure, results);
        }

        // 4. Fleet series.
        let fleet = build_fleet_table(&state.timestamps, &cohorts)?;
        info!(series = fleet.len(), "fleet series built");

        // 5. New-cohort growth.
        let growth = CohortGrowth::build(&cohorts, self.capacity)?;
        info!(
            quarters = growth.len(),
            new_devices = growth.total(),
            capacity = self.capacity,
            "new-cohort growth computed",
        );

        Ok(Analysis {
            stats: state.stats,
            malformed: state.malformed,
            missing_timestamps: state.missing_timestamps,
            unresolved: state.intervals.unresolved().clone(),
            cohorts,
            excluded,
            devices,
            duplicates,
            fleet,
            growth,
        })
    }

    /// Every device with a timed failure or a reconstructed history must
    /// have a cohort. Returns the devices excluded under the `exclude`
    /// policy; under `abort` the first missing device is an error.
    fn check_cohorts(
        &self,
        cohorts: &CohortAssignment,
        serials: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>> {
        let mut excluded = BTreeSet::new();
        for serial in serials.iter().map(String::as_str) {
            let Err(err) = cohorts.cohort_of(serial) else {
                continue;
            };
            match self.on_missing {
                MissingCohortPolicy::Abort => {
                    error!(serial, "device has no install epoch; aborting");
                    return Err(err).context("resolving device cohorts");
                }
                MissingCohortPolicy::Exclude => {
                    error!(
                        serial,
                        "device has no install epoch; excluded from cohort partitions",
                    );
                    excluded.insert(serial.to_string());
                }
            }
        }
        Ok(excluded)
    }
}

/// Builds the fleet series of every failure kind and partition. The
/// either-kind series uses the union of both timestamp sets.
fn build_fleet_table(
    timestamps: &TimestampCollector,
    cohorts: &CohortAssignment,
) -> Result<FleetTable> {
    let mut table = FleetTable::new();
    for &kind in FailureKind::all() {
        for &partition in Partition::all() {
            let mut set = BTreeSet::new();
            for &failure in kind.failure_types() {
                let timeline = timestamps.timeline(failure);
                match partition.cohort() {
                    None => set.extend(timeline.distinct()),
                    Some(cohort) => {
                        set.extend(timeline.distinct_where(|serial| cohorts.is(serial, cohort)))
                    }
                }
            }
            let series = FleetSeries::build(&set)
                .with_context(|| format!("building {kind} fleet series for {partition} devices"))?;
            table.insert((kind, partition), series);
        }
    }
    Ok(table)
}

/// The missing-cohort error that stopped a run under the abort policy.
pub fn missing_cohort(err: &anyhow::Error) -> Option<&CohortError> {
    err.downcast_ref::<CohortError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse::LogRows;

    const CUTOFF: i64 = 1_451_620_140;

    fn analyze(body: &str, policy: MissingCohortPolicy) -> Result<Analysis> {
        let data = format!("serial,location,insert,remove,duration,seen,event\n{body}");
        Analyzer::new(CUTOFF, policy, 100).run(LogRows::new(data.as_bytes()))
    }

    // D1 is old (2014), D2 is new (2016).
    const LOG: &str = "\
D1,L1,2014-01-01 00:00:00,,,,\n\
D1,L1,,2014-02-01 00:00:00,,,DBE\n\
D1,L1,,2014-03-01 00:00:00,,,DBE\n\
D1,L1,,2014-03-01 00:00:00,,,OTB\n\
D2,L2,2016-03-01 00:00:00,2016-04-01 00:00:00,,,OTB\n\
D2,L2,,2016-05-01 00:00:00,,,OTB\n";

    #[test]
    fn test_run_partitions_by_cohort() {
        let a = analyze(LOG, MissingCohortPolicy::Abort).expect("analysis");

        assert_eq!(a.cohorts.cohort_of("D1"), Ok(Cohort::Old));
        assert_eq!(a.cohorts.cohort_of("D2"), Ok(Cohort::New));
        assert!(a.excluded.is_empty());

        let otb_all = a.series(FailureKind::Otb, Partition::All).expect("otb all");
        assert_eq!(otb_all.events, 3);
        let otb_old = a.series(FailureKind::Otb, Partition::Old).expect("otb old");
        assert_eq!(otb_old.events, 1);
        let otb_new = a.series(FailureKind::Otb, Partition::New).expect("otb new");
        assert_eq!(otb_new.events, 2);
        assert_eq!(a.fleet.len(), 9);
    }

    #[test]
    fn test_either_kind_is_set_union() {
        let a = analyze(LOG, MissingCohortPolicy::Abort).expect("analysis");

        // DBE {Feb 1, Mar 1}, OTB {Mar 1, Apr 1, May 1}: Mar 1 collapses.
        let either = a
            .series(FailureKind::Either, Partition::All)
            .expect("either");
        assert_eq!(either.events, 4);
        assert_eq!(either.quarters.total(), 4);
    }

    #[test]
    fn test_device_mtbf_years_by_cohort() {
        let a = analyze(LOG, MissingCohortPolicy::Abort).expect("analysis");

        let old_dbe = a.device_mtbf_years(FailureType::Dbe, Partition::Old);
        assert_eq!(old_dbe.len(), 1);
        assert!(a
            .device_mtbf_years(FailureType::Dbe, Partition::New)
            .is_empty());
        assert_eq!(a.device_mtbf_years(FailureType::Otb, Partition::All).len(), 2);
    }

    #[test]
    fn test_missing_cohort_aborts() {
        let err = analyze("D9,L9,,2014-01-01 00:00:00,,,DBE\n", MissingCohortPolicy::Abort)
            .expect_err("no install anywhere");
        assert_eq!(
            missing_cohort(&err),
            Some(&CohortError::Missing {
                serial: "D9".to_string()
            })
        );
    }

    #[test]
    fn test_missing_cohort_excluded_on_request() {
        let body = format!("{LOG}D9,L9,,2014-01-01 00:00:00,,,DBE\n");
        let a = analyze(&body, MissingCohortPolicy::Exclude).expect("analysis");

        assert!(a.excluded.contains("D9"));
        // Still part of the all-devices series, absent from both cohorts.
        let all = a.series(FailureKind::Dbe, Partition::All).expect("all");
        let old = a.series(FailureKind::Dbe, Partition::Old).expect("old");
        let new = a.series(FailureKind::Dbe, Partition::New).expect("new");
        assert_eq!(all.events, 3);
        assert_eq!(old.events + new.events, 2);
    }

    #[test]
    fn test_rows_without_install_still_need_a_cohort() {
        // Z only has an untimed failure and Y only an install-less clean row.
        let body = "\
A,L1,2014-01-01 00:00:00,2014-02-01 00:00:00,,,DBE\n\
Z,L9,,,,,DBE\n\
Y,L8,,,,,\n";
        let err = analyze(body, MissingCohortPolicy::Abort).expect_err("cohort missing");
        assert!(missing_cohort(&err).is_some(), "unexpected error: {err:#}");

        let a = analyze(body, MissingCohortPolicy::Exclude).expect("analysis");
        let excluded: Vec<&str> = a.excluded.iter().map(String::as_str).collect();
        assert_eq!(excluded, vec!["Y", "Z"]);
        assert_eq!(a.cohorts.cohort_of("A"), Ok(Cohort::Old));
    }

    #[test]
    fn test_duplicates_are_collected() {
        let body = "\
D1,L1,2014-01-01 00:00:00,2014-02-01 00:00:00,,,DBE\n\
D1,L1,,2014-02-01 00:00:00,,,DBE\n";
        let a = analyze(body, MissingCohortPolicy::Abort).expect("analysis");

        assert_eq!(a.duplicates.len(), 1);
        let dup = a.duplicates.iter().next().expect("one entry");
        assert_eq!(dup.serial, "D1");
        assert_eq!(dup.failure, FailureType::Dbe);
    }

    #[test]
    fn test_growth_counts_new_devices() {
        let a = analyze(LOG, MissingCohortPolicy::Abort).expect("analysis");
        assert_eq!(a.growth.total(), 1);
    }
}
