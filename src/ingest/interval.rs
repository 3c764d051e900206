use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::history::DeviceSlotHistory;
use crate::record::event::FailureType;

/// Where the start epoch of a failure occupancy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSource {
    /// The row carried an install time.
    Explicit,
    /// Joined the device's existing occupancy at the same location in the
    /// same failure stream.
    SameStream,
    /// Borrowed from the other failure stream's first occupancy at the
    /// same location.
    OtherStream,
    /// Borrowed from the clean stream's first occupancy at the same location.
    Clean,
}

/// A device+location pair for which no start epoch could be inferred.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnresolvedStart {
    pub serial: String,
    pub location: String,
}

/// Per-device histories for one event stream, keyed by device serial.
pub type StreamHistories = BTreeMap<String, DeviceSlotHistory>;

/// Reconstructs per-device slot occupancies for the DBE, OTB and clean
/// streams, inferring missing install times from co-located records.
#[derive(Debug, Default)]
pub struct IntervalBuilder {
    dbe: StreamHistories,
    otb: StreamHistories,
    clean: StreamHistories,
    unresolved: BTreeSet<UnresolvedStart>,
}

impl IntervalBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a clean (no-failure) occupancy.
    pub fn record_clean(&mut self, serial: &str, location: &str, install: i64) {
        self.clean
            .entry(serial.to_string())
            .or_default()
            .push_occupancy(location, install, None);
    }

    /// Records one failure of `failure` type at `failure_epoch`.
    ///
    /// With an install time a new occupancy is opened. Without one, the
    /// start is inferred in priority order from the same stream, the other
    /// failure stream and the clean stream, always using the first
    /// occupancy recorded at `location`. When nothing matches the pair is
    /// recorded as unresolved and the failure is left out of the histories.
    pub fn record_failure(
        &mut self,
        failure: FailureType,
        serial: &str,
        location: &str,
        install: Option<i64>,
        failure_epoch: i64,
    ) -> Result<StartSource, UnresolvedStart> {
        if let Some(start) = install {
            self.stream_mut(failure)
                .entry(serial.to_string())
                .or_default()
                .push_occupancy(location, start, Some(failure_epoch));
            return Ok(StartSource::Explicit);
        }

        if let Some(history) = self.stream_mut(failure).get_mut(serial) {
            if history.join_first_occupancy(location, failure_epoch) {
                return Ok(StartSource::SameStream);
            }
        }

        let borrowed = self
            .first_start(failure.other(), serial, location)
            .map(|start| (start, StartSource::OtherStream))
            .or_else(|| {
                self.clean
                    .get(serial)
                    .and_then(|h| h.first_start(location))
                    .map(|start| (start, StartSource::Clean))
            });

        match borrowed {
            Some((start, source)) => {
                debug!(
                    serial,
                    location,
                    failure = failure.as_str(),
                    start,
                    ?source,
                    "inferred missing install time",
                );
                self.stream_mut(failure)
                    .entry(serial.to_string())
                    .or_default()
                    .push_occupancy(location, start, Some(failure_epoch));
                Ok(source)
            }
            None => {
                let pair = UnresolvedStart {
                    serial: serial.to_string(),
                    location: location.to_string(),
                };
                self.unresolved.insert(pair.clone());
                Err(pair)
            }
        }
    }

    fn first_start(&self, failure: FailureType, serial: &str, location: &str) -> Option<i64> {
        self.stream(failure)
            .get(serial)
            .and_then(|h| h.first_start(location))
    }

    fn stream_mut(&mut self, failure: FailureType) -> &mut StreamHistories {
        match failure {
            FailureType::Dbe => &mut self.dbe,
            FailureType::Otb => &mut self.otb,
        }
    }

    /// Histories of one failure stream.
    pub fn stream(&self, failure: FailureType) -> &StreamHistories {
        match failure {
            FailureType::Dbe => &self.dbe,
            FailureType::Otb => &self.otb,
        }
    }

    /// Histories of the clean stream.
    pub fn clean(&self) -> &StreamHistories {
        &self.clean
    }

    /// Device+location pairs whose start could not be inferred.
    pub fn unresolved(&self) -> &BTreeSet<UnresolvedStart> {
        &self.unresolved
    }
}
