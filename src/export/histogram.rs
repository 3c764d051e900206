use serde::Serialize;

/// Equal-width histogram over `[0, max]`. The last bin is closed on the
/// right; values above `max` or below zero are counted as overflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearHistogram {
    pub max: f64,
    pub bin_width: f64,
    pub counts: Vec<u64>,
    pub overflow: u64,
}

impl LinearHistogram {
    /// Creates an empty histogram. `bins` and `max` must be positive.
    pub fn new(bins: usize, max: f64) -> Self {
        Self {
            max,
            bin_width: max / bins as f64,
            counts: vec![0; bins],
            overflow: 0,
        }
    }

    /// Builds a histogram from `values`.
    pub fn from_values(bins: usize, max: f64, values: &[f64]) -> Self {
        let mut h = Self::new(bins, max);
        for &v in values {
            h.record(v);
        }
        h
    }

    /// Records one value.
    pub fn record(&mut self, value: f64) {
        match bucket_index(value, self.max, self.counts.len()) {
            Some(idx) => {
                if let Some(slot) = self.counts.get_mut(idx) {
                    *slot += 1;
                }
            }
            None => self.overflow += 1,
        }
    }

    /// Lower edge of every bin, followed by `max`.
    pub fn edges(&self) -> Vec<f64> {
        let bins = self.counts.len() as f64;
        (0..=self.counts.len())
            .map(|i| self.max * i as f64 / bins)
            .collect()
    }
}

/// Bin index of `value`, `None` when outside `[0, max]` or not finite.
fn bucket_index(value: f64, max: f64, bins: usize) -> Option<usize> {
    if bins == 0 || !value.is_finite() || !(0.0..=max).contains(&value) {
        return None;
    }
    let idx = (value / max * bins as f64) as usize;
    Some(idx.min(bins - 1))
}
