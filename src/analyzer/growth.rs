use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::bucket::BucketLabel;
use crate::clock::Timestamp;
use crate::cohort::{Cohort, CohortAssignment};

/// Quarterly arrival of new-cohort devices relative to fleet capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortGrowth {
    capacity: u64,
    added: BTreeMap<BucketLabel, u64>,
}

impl CohortGrowth {
    /// Buckets each new device's cohort epoch by UTC calendar quarter.
    pub fn build(cohorts: &CohortAssignment, capacity: u64) -> Result<Self> {
        let mut added = BTreeMap::new();
        for (serial, epoch) in cohorts.members(Cohort::New) {
            let ts = Timestamp::from_epoch(epoch)
                .with_context(|| format!("cohort epoch of device {serial}"))?;
            *added.entry(BucketLabel::quarter_of(&ts.calendar())).or_insert(0) += 1;
        }
        Ok(Self { capacity, added })
    }

    /// Fleet capacity the percentages are relative to.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of quarters with at least one new device.
    pub fn len(&self) -> usize {
        self.added.len()
    }

    /// Whether no new device arrived.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    /// Total new devices.
    pub fn total(&self) -> u64 {
        self.added.values().sum()
    }

    /// New devices first installed in `quarter`.
    pub fn added_in(&self, quarter: &BucketLabel) -> u64 {
        self.added.get(quarter).copied().unwrap_or(0)
    }

    /// New devices first installed in or before `quarter`.
    pub fn cumulative_at(&self, quarter: &BucketLabel) -> u64 {
        self.added.range(..=*quarter).map(|(_, n)| n).sum()
    }

    /// Cumulative new devices as a percentage of fleet capacity.
    pub fn percent_at(&self, quarter: &BucketLabel) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.cumulative_at(quarter) as f64 / self.capacity as f64 * 100.0
    }
}
