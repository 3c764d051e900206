//! Calendar time-bucketing of failure timestamps.
//!
//! [`time_slice`] counts timestamps per year or per year+month.
//! [`TimeSlices::order`] turns those counts into chronologically ordered,
//! zero-filled per-year count lists by year, month or quarter. The flattened
//! ordering is index-aligned with the sorted timestamp sequence the counts
//! were taken from, which is what the fleet-wide MTBF computation relies on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::clock::{quarter_of_month, Calendar};

/// Granularity at which timestamps are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceGranularity {
    Year,
    Month,
}

/// Granularity of the ordered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderGranularity {
    Year,
    Month,
    Quarter,
}

impl OrderGranularity {
    /// Number of sub-periods per year.
    pub const fn periods_per_year(self) -> u32 {
        match self {
            Self::Year => 1,
            Self::Month => 12,
            Self::Quarter => 4,
        }
    }
}

/// Errors raised while ordering buckets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("cannot order {requested:?} buckets from {sliced:?} slices")]
    GranularityMismatch {
        sliced: SliceGranularity,
        requested: OrderGranularity,
    },

    #[error("invalid bucket label {raw:?}: expected YYYY-Qn")]
    InvalidLabel { raw: String },
}

/// Key of one time slice. `month` is set only for month slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SliceKey {
    pub year: i32,
    pub month: Option<u32>,
}

/// Per-slice counts of a set of timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlices {
    granularity: SliceGranularity,
    counts: BTreeMap<SliceKey, u64>,
}

/// Count timestamps per slice. Input order does not matter.
pub fn time_slice<I>(times: I, granularity: SliceGranularity) -> TimeSlices
where
    I: IntoIterator<Item = Calendar>,
{
    let mut counts: BTreeMap<SliceKey, u64> = BTreeMap::new();
    for c in times {
        let key = SliceKey {
            year: c.year,
            month: match granularity {
                SliceGranularity::Year => None,
                SliceGranularity::Month => Some(c.month),
            },
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    TimeSlices {
        granularity,
        counts,
    }
}

impl TimeSlices {
    /// Count of one slice, zero if absent.
    pub fn count(&self, key: SliceKey) -> u64 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Total count across slices.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Years with at least one timestamp, ascending.
    pub fn years(&self) -> BTreeSet<i32> {
        self.counts.keys().map(|k| k.year).collect()
    }

    /// Orders counts chronologically, zero-filling missing sub-periods of
    /// every observed year. Quarter counts sum their three months. Year
    /// order may be taken from month slices; finer orders require month
    /// slices.
    pub fn order(&self, granularity: OrderGranularity) -> Result<OrderedBuckets, BucketError> {
        if self.granularity == SliceGranularity::Year && granularity != OrderGranularity::Year {
            return Err(BucketError::GranularityMismatch {
                sliced: self.granularity,
                requested: granularity,
            });
        }

        let years: Vec<i32> = self.years().into_iter().collect();
        let per_year = granularity.periods_per_year() as usize;
        let mut counts: Vec<Vec<u64>> = vec![vec![0; per_year]; years.len()];

        for (key, &n) in &self.counts {
            let Ok(year_idx) = years.binary_search(&key.year) else {
                continue;
            };
            let period = match (granularity, key.month) {
                (OrderGranularity::Year, _) => 0,
                (OrderGranularity::Month, Some(m)) => m.saturating_sub(1) as usize,
                (OrderGranularity::Quarter, Some(m)) => (quarter_of_month(m) - 1) as usize,
                (_, None) => continue,
            };
            if let Some(slot) = counts.get_mut(year_idx).and_then(|y| y.get_mut(period)) {
                *slot += n;
            }
        }

        Ok(OrderedBuckets {
            granularity,
            years,
            counts,
        })
    }
}

/// Chronologically ordered, zero-filled bucket counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedBuckets {
    pub granularity: OrderGranularity,
    /// Observed years, ascending.
    pub years: Vec<i32>,
    /// One count list per year, one count per sub-period.
    pub counts: Vec<Vec<u64>>,
}

impl OrderedBuckets {
    /// Counts flattened into one chronological sequence.
    pub fn flatten(&self) -> Vec<u64> {
        self.counts.iter().flatten().copied().collect()
    }

    /// Total count across buckets.
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Labels of every bucket, in the same order as [`Self::flatten`].
    pub fn labels(&self) -> Vec<BucketLabel> {
        let per_year = self.granularity.periods_per_year();
        self.years
            .iter()
            .flat_map(|&year| {
                (1..=per_year).map(move |period| BucketLabel {
                    granularity: self.granularity,
                    year,
                    period,
                })
            })
            .collect()
    }

    /// (label, count) pairs in chronological order.
    pub fn labelled(&self) -> Vec<(BucketLabel, u64)> {
        self.labels().into_iter().zip(self.flatten()).collect()
    }
}

/// Identifies one bucket: a year, a year+month or a year+quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketLabel {
    pub granularity: OrderGranularity,
    pub year: i32,
    /// 1-based sub-period (month or quarter); always 1 for years.
    pub period: u32,
}

impl BucketLabel {
    /// Quarter label.
    pub fn quarter(year: i32, quarter: u32) -> Self {
        Self {
            granularity: OrderGranularity::Quarter,
            year,
            period: quarter,
        }
    }

    /// Quarter label containing a calendar date.
    pub fn quarter_of(c: &Calendar) -> Self {
        Self::quarter(c.year, c.quarter())
    }

    /// Sort key across years.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * i64::from(self.granularity.periods_per_year())
            + i64::from(self.period)
            - 1
    }
}

impl PartialOrd for BucketLabel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BucketLabel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.year, self.period, self.granularity.periods_per_year()).cmp(&(
            other.year,
            other.period,
            other.granularity.periods_per_year(),
        ))
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            OrderGranularity::Year => write!(f, "{}", self.year),
            OrderGranularity::Month => write!(f, "{}-{:02}", self.year, self.period),
            OrderGranularity::Quarter => write!(f, "{}-Q{}", self.year, self.period),
        }
    }
}

impl FromStr for BucketLabel {
    type Err = BucketError;

    /// Parses a quarter label such as `2014-Q1`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || BucketError::InvalidLabel {
            raw: raw.to_string(),
        };
        let (year, quarter) = raw.trim().split_once("-Q").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
        if !(1..=4).contains(&quarter) {
            return Err(invalid());
        }
        Ok(Self::quarter(year, quarter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;

    fn cal(raw: &str) -> Calendar {
        Timestamp::parse(raw).expect("valid timestamp").calendar()
    }

    fn sample() -> Vec<Calendar> {
        vec![
            cal("2014-01-05 00:00:00"),
            cal("2014-02-05 00:00:00"),
            cal("2014-02-06 00:00:00"),
            cal("2014-11-30 00:00:00"),
            cal("2016-07-01 00:00:00"),
        ]
    }

    #[test]
    fn test_time_slice_by_year() {
        let slices = time_slice(sample(), SliceGranularity::Year);
        assert_eq!(slices.count(SliceKey { year: 2014, month: None }), 4);
        assert_eq!(slices.count(SliceKey { year: 2016, month: None }), 1);
        assert_eq!(slices.count(SliceKey { year: 2015, month: None }), 0);
        assert_eq!(slices.total(), 5);
    }

    #[test]
    fn test_order_by_month_zero_fills() {
        let ordered = time_slice(sample(), SliceGranularity::Month)
            .order(OrderGranularity::Month)
            .expect("month order");

        // 2015 was never observed, so it is absent, not zero-filled.
        assert_eq!(ordered.years, vec![2014, 2016]);
        assert_eq!(ordered.counts[0], vec![1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(ordered.counts[1], vec![0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_order_by_quarter_sums_months() {
        let slices = time_slice(sample(), SliceGranularity::Month);
        let quarters = slices.order(OrderGranularity::Quarter).expect("quarters");
        assert_eq!(quarters.counts, vec![vec![3, 0, 0, 1], vec![0, 0, 1, 0]]);

        let months = slices.order(OrderGranularity::Month).expect("months");
        for (q, m) in quarters.counts.iter().zip(months.counts.iter()) {
            for (qi, &qc) in q.iter().enumerate() {
                let month_sum: u64 = m[qi * 3..qi * 3 + 3].iter().sum();
                assert_eq!(qc, month_sum, "quarter {} disagrees with its months", qi + 1);
            }
        }
    }

    #[test]
    fn test_quarter_counts_sum_to_year_count() {
        let yearly = time_slice(sample(), SliceGranularity::Year);
        let quarters = time_slice(sample(), SliceGranularity::Month)
            .order(OrderGranularity::Quarter)
            .expect("quarters");

        for (year, counts) in quarters.years.iter().zip(quarters.counts.iter()) {
            let total: u64 = counts.iter().sum();
            assert_eq!(total, yearly.count(SliceKey { year: *year, month: None }));
        }
    }

    #[test]
    fn test_year_order_from_month_slices() {
        let ordered = time_slice(sample(), SliceGranularity::Month)
            .order(OrderGranularity::Year)
            .expect("year order");
        assert_eq!(ordered.counts, vec![vec![4], vec![1]]);
    }

    #[test]
    fn test_finer_order_from_year_slices_is_rejected() {
        let err = time_slice(sample(), SliceGranularity::Year)
            .order(OrderGranularity::Quarter)
            .expect_err("mismatch");
        assert!(matches!(err, BucketError::GranularityMismatch { .. }));
    }

    #[test]
    fn test_empty_input_orders_to_nothing() {
        let ordered = time_slice(Vec::new(), SliceGranularity::Month)
            .order(OrderGranularity::Quarter)
            .expect("empty");
        assert!(ordered.years.is_empty());
        assert_eq!(ordered.total(), 0);
    }

    #[test]
    fn test_labels_align_with_flatten() {
        let ordered = time_slice(sample(), SliceGranularity::Month)
            .order(OrderGranularity::Quarter)
            .expect("quarters");
        let labelled = ordered.labelled();
        assert_eq!(labelled.len(), 8);
        assert_eq!(labelled[0].0.to_string(), "2014-Q1");
        assert_eq!(labelled[0].1, 3);
        assert_eq!(labelled[6].0.to_string(), "2016-Q3");
        assert_eq!(labelled[6].1, 1);
    }

    #[test]
    fn test_quarter_label_parse_and_order() {
        let a: BucketLabel = "2014-Q1".parse().expect("valid");
        let b: BucketLabel = "2019-Q2".parse().expect("valid");
        assert!(a < b);
        assert_eq!(b.ordinal() - a.ordinal(), 21);
        assert!("2014-Q5".parse::<BucketLabel>().is_err());
        assert!("2014Q1".parse::<BucketLabel>().is_err());
    }

    #[test]
    fn test_labels_as_hash_keys() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(BucketLabel::quarter(2016, 1)));
        assert!(seen.insert(BucketLabel::quarter(2016, 2)));
        assert!(!seen.insert("2016-Q1".parse::<BucketLabel>().expect("label")));
        assert_eq!(seen.len(), 2);

        let labelled = time_slice(sample(), SliceGranularity::Month)
            .order(OrderGranularity::Month)
            .expect("month order")
            .labelled();
        let unique: std::collections::HashSet<BucketLabel> =
            labelled.iter().map(|(label, _)| *label).collect();
        assert_eq!(unique.len(), labelled.len());
    }
}
