use std::collections::BTreeSet;

use thiserror::Error;

use super::device::successive_deltas;
use crate::bucket::{time_slice, BucketError, OrderGranularity, OrderedBuckets, SliceGranularity};
use crate::clock::Timestamp;

/// Errors raised by the fleet-wide time-sliced MTBF computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetMtbfError {
    #[error("bucket run-lengths sum to {run_total} but {timestamps} sorted timestamps were given")]
    RunLengthMismatch { run_total: u64, timestamps: usize },

    #[error("timestamps are not strictly ascending at index {index}")]
    NotStrictlyAscending { index: usize },

    #[error(transparent)]
    Bucket(#[from] BucketError),
}

/// MTBF and TBF samples for each bucket of a time-sliced sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicedMtbf {
    /// Mean delta per bucket in seconds; +inf when the bucket holds fewer
    /// than two events.
    pub mtbf_seconds: Vec<f64>,
    /// Deltas per bucket.
    pub tbf: Vec<Vec<i64>>,
}

/// Computes per-bucket MTBF from a sorted, de-duplicated epoch sequence and
/// per-year bucket run-lengths.
///
/// The sequence is consumed in consecutive runs, one per bucket. Only deltas
/// within a run count; each run's first element is a boundary. The
/// run-lengths must sum to exactly `sorted.len()`.
pub fn time_sliced_mtbf(
    sorted: &[i64],
    run_lengths: &[Vec<u64>],
) -> Result<SlicedMtbf, FleetMtbfError> {
    let run_total: u64 = run_lengths.iter().flatten().sum();
    if run_total != sorted.len() as u64 {
        return Err(FleetMtbfError::RunLengthMismatch {
            run_total,
            timestamps: sorted.len(),
        });
    }
    if let Some(index) = sorted.windows(2).position(|w| w[1] <= w[0]) {
        return Err(FleetMtbfError::NotStrictlyAscending { index: index + 1 });
    }

    let buckets = run_lengths.iter().map(Vec::len).sum();
    let mut mtbf_seconds = Vec::with_capacity(buckets);
    let mut tbf = Vec::with_capacity(buckets);

    let mut start = 0usize;
    for &len in run_lengths.iter().flatten() {
        let end = start + len as usize;
        // In bounds: the run-lengths were checked against sorted.len().
        let deltas = successive_deltas(sorted.get(start..end).unwrap_or_default());

        if deltas.is_empty() {
            mtbf_seconds.push(f64::INFINITY);
        } else {
            let sum: i128 = deltas.iter().map(|&d| i128::from(d)).sum();
            mtbf_seconds.push(sum as f64 / deltas.len() as f64);
        }
        tbf.push(deltas);
        start = end;
    }

    Ok(SlicedMtbf { mtbf_seconds, tbf })
}

/// Fleet-wide monthly/quarterly counts and quarterly MTBF for one set of
/// failure timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetSeries {
    /// Number of distinct failure timestamps.
    pub events: usize,
    pub months: OrderedBuckets,
    pub quarters: OrderedBuckets,
    pub quarterly_mtbf: SlicedMtbf,
}

impl FleetSeries {
    /// Buckets a de-duplicated timestamp set by month and quarter, then
    /// computes quarterly MTBF from the same set so the run-lengths and the
    /// sorted sequence stay index-aligned.
    pub fn build(timestamps: &BTreeSet<Timestamp>) -> Result<Self, FleetMtbfError> {
        let slices = time_slice(
            timestamps.iter().map(Timestamp::calendar),
            SliceGranularity::Month,
        );
        let months = slices.order(OrderGranularity::Month)?;
        let quarters = slices.order(OrderGranularity::Quarter)?;

        let sorted: Vec<i64> = timestamps.iter().map(Timestamp::epoch).collect();
        let quarterly_mtbf = time_sliced_mtbf(&sorted, &quarters.counts)?;

        Ok(Self {
            events: sorted.len(),
            months,
            quarters,
            quarterly_mtbf,
        })
    }
}
