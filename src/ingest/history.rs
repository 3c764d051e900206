/// One entry of a device's slot history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    /// Start of a new slot occupancy at the given location.
    Marker(String),
    /// A resolved epoch (install start or failure time) belonging to the
    /// occupancy opened by the nearest preceding marker.
    Epoch(i64),
}

/// Append-only interleaving of slot markers and epochs for one device in
/// one event stream (DBE, OTB or clean).
///
/// Every marker is immediately followed by the occupancy's start epoch.
/// Epochs after that are events of the same occupancy, in insertion order,
/// which is not necessarily chronological.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSlotHistory {
    entries: Vec<HistoryEntry>,
}

impl DeviceSlotHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new occupancy at `location` starting at `start`, optionally
    /// followed by one event epoch.
    pub fn push_occupancy(&mut self, location: &str, start: i64, event: Option<i64>) {
        self.entries.push(HistoryEntry::Marker(location.to_string()));
        self.entries.push(HistoryEntry::Epoch(start));
        if let Some(epoch) = event {
            self.entries.push(HistoryEntry::Epoch(epoch));
        }
    }

    /// Index of the first marker for `location`.
    fn first_marker(&self, location: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, HistoryEntry::Marker(loc) if loc == location))
    }

    /// Start epoch of the first occupancy recorded at `location`.
    ///
    /// Only the first occupancy is consulted, even when the device occupied
    /// the same location several times.
    pub fn first_start(&self, location: &str) -> Option<i64> {
        let idx = self.first_marker(location)?;
        match self.entries.get(idx + 1) {
            Some(HistoryEntry::Epoch(start)) => Some(*start),
            _ => None,
        }
    }

    /// Adds `epoch` to the first occupancy recorded at `location`, directly
    /// after its start epoch. Returns false if no such occupancy exists.
    pub fn join_first_occupancy(&mut self, location: &str, epoch: i64) -> bool {
        let Some(idx) = self.first_marker(location) else {
            return false;
        };
        let at = (idx + 2).min(self.entries.len());
        self.entries.insert(at, HistoryEntry::Epoch(epoch));
        true
    }

    /// Raw entries in insertion order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of occupancies (markers) recorded.
    pub fn occupancies(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, HistoryEntry::Marker(_)))
            .count()
    }

    /// Re-segments the history into one epoch group per occupancy, in
    /// insertion order. Epochs within a group keep insertion order.
    pub fn segments(&self) -> Vec<Vec<i64>> {
        let mut groups: Vec<Vec<i64>> = Vec::with_capacity(self.occupancies());
        for entry in &self.entries {
            match entry {
                HistoryEntry::Marker(_) => groups.push(Vec::new()),
                HistoryEntry::Epoch(epoch) => match groups.last_mut() {
                    Some(group) => group.push(*epoch),
                    // Epochs ahead of any marker form their own group.
                    None => groups.push(vec![*epoch]),
                },
            }
        }
        groups
    }
}
