use std::collections::{BTreeMap, BTreeSet};

use crate::clock::Timestamp;
use crate::record::event::FailureType;

/// Global record of failure times for one failure type, kept both as a
/// flat sequence and per device so it can later be split by cohort.
#[derive(Debug, Clone, Default)]
pub struct FailureTimeline {
    events: Vec<Timestamp>,
    by_device: BTreeMap<String, Vec<Timestamp>>,
}

impl FailureTimeline {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure time for `serial`.
    pub fn record(&mut self, serial: &str, at: Timestamp) {
        self.events.push(at);
        self.by_device.entry(serial.to_string()).or_default().push(at);
    }

    /// Number of recorded failures, duplicates included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Raw failure times in ingest order.
    pub fn events(&self) -> &[Timestamp] {
        &self.events
    }

    /// Failure times grouped by device serial.
    pub fn by_device(&self) -> &BTreeMap<String, Vec<Timestamp>> {
        &self.by_device
    }

    /// De-duplicated, chronologically ordered failure times.
    pub fn distinct(&self) -> BTreeSet<Timestamp> {
        self.events.iter().copied().collect()
    }

    /// De-duplicated failure times of the devices accepted by `keep`.
    pub fn distinct_where<F>(&self, mut keep: F) -> BTreeSet<Timestamp>
    where
        F: FnMut(&str) -> bool,
    {
        self.by_device
            .iter()
            .filter(|(serial, _)| keep(serial.as_str()))
            .flat_map(|(_, times)| times.iter().copied())
            .collect()
    }
}

/// Failure timelines for both failure types.
#[derive(Debug, Clone, Default)]
pub struct TimestampCollector {
    dbe: FailureTimeline,
    otb: FailureTimeline,
}

impl TimestampCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure.
    pub fn record(&mut self, failure: FailureType, serial: &str, at: Timestamp) {
        match failure {
            FailureType::Dbe => self.dbe.record(serial, at),
            FailureType::Otb => self.otb.record(serial, at),
        }
    }

    /// Timeline of one failure type.
    pub fn timeline(&self, failure: FailureType) -> &FailureTimeline {
        match failure {
            FailureType::Dbe => &self.dbe,
            FailureType::Otb => &self.otb,
        }
    }
}
