pub mod collector;
pub mod history;
pub mod interval;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use self::collector::TimestampCollector;
use self::interval::IntervalBuilder;
use crate::cohort::CohortEpochs;
use crate::record::event::{EventRecord, EventType, FailureType};
use crate::record::parse::ParsedRow;
use crate::record::stats::IngestStats;

/// A failure row that carried no remove/event time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTimestamp {
    pub line: u64,
    pub serial: String,
    pub location: String,
    pub failure: FailureType,
}

/// A row that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub line: u64,
    pub reason: String,
}

/// Everything gathered by the single forward pass over the event log.
#[derive(Debug, Default)]
pub struct IngestState {
    pub stats: IngestStats,
    pub intervals: IntervalBuilder,
    pub timestamps: TimestampCollector,
    pub cohort_epochs: CohortEpochs,
    /// Every device serial seen on a parsed row.
    pub serials: BTreeSet<String>,
    pub missing_timestamps: Vec<MissingTimestamp>,
    pub malformed: Vec<MalformedRow>,
}

impl IngestState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one parsed row.
    pub fn apply_row(&mut self, row: ParsedRow) {
        match row.result {
            Ok(record) => self.apply(row.line, &record),
            Err(e) => {
                warn!(line = row.line, error = %e, "skipping malformed row");
                self.stats.malformed += 1;
                self.malformed.push(MalformedRow {
                    line: row.line,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Routes one record into the interval builder, the global timestamp
    /// collector and the cohort epoch tracker.
    pub fn apply(&mut self, line: u64, record: &EventRecord) {
        if !self.serials.contains(&record.device_serial) {
            self.serials.insert(record.device_serial.clone());
        }
        match record.failure() {
            Some(failure) => self.apply_failure(line, failure, record),
            None => self.apply_clean(line, record),
        }
    }

    fn apply_failure(&mut self, line: u64, failure: FailureType, record: &EventRecord) {
        self.stats.record(EventType::from(failure));

        let serial = record.device_serial.as_str();
        let location = record.slot_location.as_str();
        let install = record.install_time.map(|t| t.epoch());

        if let Some(epoch) = install {
            self.cohort_epochs.observe(serial, epoch);
        }

        let Some(failed_at) = record.remove_time else {
            warn!(
                line,
                serial,
                location,
                failure = failure.as_str(),
                "failure record has no remove/event time",
            );
            self.stats.missing_timestamp += 1;
            self.missing_timestamps.push(MissingTimestamp {
                line,
                serial: serial.to_string(),
                location: location.to_string(),
                failure,
            });
            return;
        };

        self.timestamps.record(failure, serial, failed_at);

        if let Err(unresolved) =
            self.intervals
                .record_failure(failure, serial, location, install, failed_at.epoch())
        {
            debug!(
                line,
                serial = %unresolved.serial,
                location = %unresolved.location,
                failure = failure.as_str(),
                "no install time found for device location",
            );
            self.stats.unresolved_start += 1;
        }
    }

    fn apply_clean(&mut self, line: u64, record: &EventRecord) {
        self.stats.record(EventType::Clean);

        let Some(installed) = record.install_time else {
            debug!(
                line,
                serial = %record.device_serial,
                "clean record has no install time",
            );
            self.stats.clean_without_install += 1;
            return;
        };

        let serial = record.device_serial.as_str();
        self.intervals
            .record_clean(serial, &record.slot_location, installed.epoch());
        self.cohort_epochs.observe(serial, installed.epoch());
    }
}

/// Single forward pass over the event log. All per-device and global
/// structures are built here and returned; nothing is mutated afterwards.
pub fn ingest<I>(rows: I) -> IngestState
where
    I: IntoIterator<Item = ParsedRow>,
{
    let mut state = IngestState::new();
    for row in rows {
        state.apply_row(row);
    }

    info!(
        parsed = state.stats.parsed(),
        dbe = state.stats.count(EventType::Dbe),
        otb = state.stats.count(EventType::Otb),
        clean = state.stats.count(EventType::Clean),
        malformed = state.stats.malformed,
        missing_timestamp = state.stats.missing_timestamp,
        unresolved_start = state.intervals.unresolved().len(),
        devices = state.serials.len(),
        with_install = state.cohort_epochs.len(),
        "ingest complete",
    );
    for (event_type, count) in state.stats.snapshot() {
        debug!(event_type = event_type.as_str(), count, "rows by event type");
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse::LogRows;
    use crate::tbf::device::TbfSeries;

    fn ingest_csv(body: &str) -> IngestState {
        let data = format!("serial,location,insert,remove,duration,seen,event\n{body}");
        ingest(LogRows::new(data.as_bytes()))
    }

    #[test]
    fn test_ingest_routes_rows() {
        let state = ingest_csv(
            "D1,L1,1970-01-01 00:16:40,,,,\n\
             D1,L1,,1970-01-01 01:23:20,,,DBE\n\
             D1,L1,,1970-01-01 02:30:00,,,DBE\n\
             D2,L2,1970-01-01 00:00:10,1970-01-01 00:10:00,590,true,OTB\n",
        );

        assert_eq!(state.stats.count(EventType::Clean), 1);
        assert_eq!(state.stats.count(EventType::Dbe), 2);
        assert_eq!(state.stats.count(EventType::Otb), 1);
        assert_eq!(state.timestamps.timeline(FailureType::Dbe).len(), 2);

        let dbe = state
            .intervals
            .stream(FailureType::Dbe)
            .get("D1")
            .expect("D1 DBE history");
        assert_eq!(dbe.segments(), vec![vec![1000, 9000, 5000]]);
        assert_eq!(TbfSeries::from_history(dbe).groups, vec![vec![4000, 4000]]);

        assert_eq!(state.cohort_epochs.get("D1"), Some(1000));
        assert_eq!(state.cohort_epochs.get("D2"), Some(10));
    }

    #[test]
    fn test_missing_remove_time_counts_but_is_not_timed() {
        let state = ingest_csv("D1,L1,1970-01-01 00:16:40,,,,DBE\n");

        assert_eq!(state.stats.count(EventType::Dbe), 1);
        assert_eq!(state.stats.missing_timestamp, 1);
        assert!(state.timestamps.timeline(FailureType::Dbe).is_empty());
        assert!(state.intervals.stream(FailureType::Dbe).is_empty());
        assert_eq!(state.missing_timestamps.len(), 1);
        assert_eq!(state.missing_timestamps[0].line, 2);
        // The install time still establishes the device's cohort epoch.
        assert_eq!(state.cohort_epochs.get("D1"), Some(1000));
    }

    #[test]
    fn test_unresolvable_start_is_recorded() {
        let state = ingest_csv("D9,L9,,1970-01-01 00:16:40,,,OTB\n");

        assert_eq!(state.stats.unresolved_start, 1);
        assert_eq!(state.intervals.unresolved().len(), 1);
        // Still part of the fleet-wide timeline.
        assert_eq!(state.timestamps.timeline(FailureType::Otb).len(), 1);
        assert!(state.cohort_epochs.get("D9").is_none());
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let state = ingest_csv(
            "D1,L1,not-a-date,,,,\n\
             D1,L1,1970-01-01 00:00:01,,,,XID\n\
             D1,L1,1970-01-01 00:00:01,,,,\n",
        );
        assert_eq!(state.stats.malformed, 2);
        assert_eq!(state.malformed.len(), 2);
        assert_eq!(state.stats.count(EventType::Clean), 1);
    }

    #[test]
    fn test_clean_without_install_is_counted() {
        let state = ingest_csv("D1,L1,,,,,\n");
        assert_eq!(state.stats.count(EventType::Clean), 1);
        assert_eq!(state.stats.clean_without_install, 1);
        assert!(state.intervals.clean().is_empty());
    }

    #[test]
    fn test_serials_include_rows_without_install() {
        let state = ingest_csv(
            "A,L1,1970-01-01 00:16:40,1970-01-01 01:00:00,,,DBE
             Z,L9,,,,,DBE
             Y,L8,,,,,
",
        );
        let serials: Vec<&str> = state.serials.iter().map(String::as_str).collect();
        assert_eq!(serials, vec!["A", "Y", "Z"]);
        assert!(state.intervals.stream(FailureType::Dbe).get("Z").is_none());
        assert!(state.intervals.clean().get("Y").is_none());
        assert!(state.cohort_epochs.get("Y").is_none());
    }
}
