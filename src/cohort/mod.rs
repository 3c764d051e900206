//! Manufacturing-cohort classification.
//!
//! A device's cohort epoch is the earliest install epoch seen for it across
//! DBE, OTB and clean records. Devices installed before the cutoff belong
//! to the `old` cohort, the rest to `new`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Manufacturing-batch grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    Old,
    New,
}

impl Cohort {
    /// Returns the canonical report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }

    /// Classify a cohort epoch against the cutoff.
    pub fn classify(cohort_epoch: i64, cutoff_epoch: i64) -> Self {
        if cohort_epoch < cutoff_epoch {
            Self::Old
        } else {
            Self::New
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to treat a device whose cohort cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCohortPolicy {
    /// Stop the run with an error.
    #[default]
    Abort,
    /// Leave the device out of cohort-partitioned results, logging it loudly.
    Exclude,
}

/// Errors raised by cohort resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CohortError {
    #[error("no install epoch recorded for device {serial}; cannot assign a cohort")]
    Missing { serial: String },
}

/// Earliest observed install epoch per device, built during ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortEpochs {
    earliest: BTreeMap<String, i64>,
}

impl CohortEpochs {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an install epoch; keeps the minimum per device.
    pub fn observe(&mut self, serial: &str, install_epoch: i64) {
        self.earliest
            .entry(serial.to_string())
            .and_modify(|e| *e = (*e).min(install_epoch))
            .or_insert(install_epoch);
    }

    /// Earliest install epoch of `serial`.
    pub fn get(&self, serial: &str) -> Option<i64> {
        self.earliest.get(serial).copied()
    }

    /// Number of devices with a known install epoch.
    pub fn len(&self) -> usize {
        self.earliest.len()
    }

    /// Whether no epochs were observed.
    pub fn is_empty(&self) -> bool {
        self.earliest.is_empty()
    }

    /// Iterate devices and their earliest install epochs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.earliest.iter().map(|(s, e)| (s.as_str(), *e))
    }
}

/// One device's resolved cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortEntry {
    pub cohort_epoch: i64,
    pub cohort: Cohort,
}

/// Cohort of every device with a known install epoch.
#[derive(Debug, Clone, Default)]
pub struct CohortAssignment {
    cutoff_epoch: i64,
    entries: BTreeMap<String, CohortEntry>,
}

impl CohortAssignment {
    /// Classify every device in `epochs` against `cutoff_epoch`.
    pub fn resolve(epochs: &CohortEpochs, cutoff_epoch: i64) -> Self {
        let entries = epochs
            .iter()
            .map(|(serial, cohort_epoch)| {
                (
                    serial.to_string(),
                    CohortEntry {
                        cohort_epoch,
                        cohort: Cohort::classify(cohort_epoch, cutoff_epoch),
                    },
                )
            })
            .collect();
        Self {
            cutoff_epoch,
            entries,
        }
    }

    /// The cutoff the assignment was built with.
    pub fn cutoff_epoch(&self) -> i64 {
        self.cutoff_epoch
    }

    /// Cohort of `serial`. Absence is a consistency error, never a default.
    pub fn cohort_of(&self, serial: &str) -> Result<Cohort, CohortError> {
        self.entry(serial).map(|e| e.cohort)
    }

    /// Full entry of `serial`.
    pub fn entry(&self, serial: &str) -> Result<CohortEntry, CohortError> {
        self.entries
            .get(serial)
            .copied()
            .ok_or_else(|| CohortError::Missing {
                serial: serial.to_string(),
            })
    }

    /// Whether `serial` belongs to `cohort`. Unknown devices belong to none.
    pub fn is(&self, serial: &str, cohort: Cohort) -> bool {
        self.entries.get(serial).is_some_and(|e| e.cohort == cohort)
    }

    /// Devices of the given cohort with their cohort epochs.
    pub fn members(&self, cohort: Cohort) -> impl Iterator<Item = (&str, i64)> {
        self.entries
            .iter()
            .filter(move |(_, e)| e.cohort == cohort)
            .map(|(s, e)| (s.as_str(), e.cohort_epoch))
    }

    /// Number of devices in `cohort`.
    pub fn count(&self, cohort: Cohort) -> usize {
        self.members(cohort).count()
    }

    /// Number of classified devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no device was classified.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
