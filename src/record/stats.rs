use super::event::{EventType, EVENT_TYPE_CARDINALITY};

/// Per-EventType row counters plus data-quality tallies gathered during
/// ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    counts: [u64; EVENT_TYPE_CARDINALITY],
    /// Rows that could not be parsed at all.
    pub malformed: u64,
    /// Failure rows lacking a remove/event time.
    pub missing_timestamp: u64,
    /// Clean rows lacking an install time.
    pub clean_without_install: u64,
    /// Failure rows whose start could not be inferred.
    pub unresolved_start: u64,
}

impl IngestStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for the given event type by one.
    pub fn record(&mut self, t: EventType) {
        self.record_n(t, 1);
    }

    /// Increment the counter for the given event type by n.
    pub fn record_n(&mut self, t: EventType, n: u64) {
        if let Some(counter) = self.counts.get_mut(t as usize) {
            *counter += n;
        }
    }

    /// Count of rows of the given type.
    pub fn count(&self, t: EventType) -> u64 {
        self.counts.get(t as usize).copied().unwrap_or(0)
    }

    /// Total of successfully parsed rows.
    pub fn parsed(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Non-zero per-type counts in numeric order.
    pub fn snapshot(&self) -> Vec<(EventType, u64)> {
        let mut result = Vec::new();

        for (i, &v) in self.counts.iter().enumerate() {
            if v > 0 {
                if let Some(et) = u8::try_from(i).ok().and_then(EventType::from_u8) {
                    result.push((et, v));
                }
            }
        }

        result
    }
}
