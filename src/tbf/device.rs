use std::collections::BTreeMap;

use crate::ingest::history::DeviceSlotHistory;
use crate::ingest::interval::StreamHistories;
use crate::record::event::FailureType;

/// Time-between-failure samples of one device in one failure stream, one
/// delta list per reconstructed occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TbfSeries {
    pub groups: Vec<Vec<i64>>,
}

impl TbfSeries {
    /// Sorts each occupancy's epochs and takes successive differences.
    /// A single-epoch occupancy yields no delta.
    pub fn from_history(history: &DeviceSlotHistory) -> Self {
        let groups = history
            .segments()
            .into_iter()
            .map(|mut epochs| {
                epochs.sort_unstable();
                successive_deltas(&epochs)
            })
            .collect();
        Self { groups }
    }

    /// All deltas across occupancies.
    pub fn deltas(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.iter().flatten().copied()
    }

    /// Whether any delta is zero or negative (duplicate entries).
    pub fn has_non_positive(&self) -> bool {
        self.deltas().any(|d| d <= 0)
    }

    /// Mean of the positive deltas in seconds, `None` when there are none.
    pub fn mtbf_seconds(&self) -> Option<f64> {
        let (sum, count) = self
            .deltas()
            .filter(|&d| d > 0)
            .fold((0i128, 0u64), |(s, c), d| (s + i128::from(d), c + 1));
        if count == 0 {
            return None;
        }
        Some(sum as f64 / count as f64)
    }
}

/// Differences between consecutive elements.
pub fn successive_deltas(sorted: &[i64]) -> Vec<i64> {
    sorted.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Lifetime MTBF of one device in one failure stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMtbf {
    pub serial: String,
    pub failure: FailureType,
    pub series: TbfSeries,
    /// Mean of the positive deltas; `None` means no data.
    pub mtbf_seconds: Option<f64>,
    /// Number of zero/negative deltas excluded from the mean.
    pub non_positive: usize,
}

impl DeviceMtbf {
    /// Whether the device has a duplicate-entry data-quality flag.
    pub fn has_duplicates(&self) -> bool {
        self.series.has_non_positive()
    }
}

/// Per-device MTBF for every device in one failure stream.
pub fn device_mtbfs(histories: &StreamHistories, failure: FailureType) -> Vec<DeviceMtbf> {
    histories
        .iter()
        .map(|(serial, history)| {
            let series = TbfSeries::from_history(history);
            let non_positive = series.deltas().filter(|&d| d <= 0).count();
            DeviceMtbf {
                serial: serial.clone(),
                failure,
                mtbf_seconds: series.mtbf_seconds(),
                series,
                non_positive,
            }
        })
        .collect()
}

/// Per-device MTBF results for both failure streams.
pub type DeviceMtbfTable = BTreeMap<FailureType, Vec<DeviceMtbf>>;
