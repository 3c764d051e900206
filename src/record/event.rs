use std::fmt;

use crate::clock::Timestamp;

/// EventType classifies one row of the install/remove log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EventType {
    /// No failure: the device was installed and later removed cleanly
    /// (or is still in service).
    Clean = 0,
    /// Double-bit memory error.
    Dbe = 1,
    /// Off-the-bus disconnect.
    Otb = 2,
}

/// Number of EventType variants, used for array sizing.
pub const EVENT_TYPE_CARDINALITY: usize = 3;

impl EventType {
    /// Returns the canonical log/report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dbe => "DBE",
            Self::Otb => "OTB",
        }
    }

    /// Convert from the raw `event_type` column value. Empty means clean.
    pub fn from_column(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" => Some(Self::Clean),
            "DBE" => Some(Self::Dbe),
            "OTB" => Some(Self::Otb),
            _ => None,
        }
    }

    /// Convert from a raw u8 discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Clean),
            1 => Some(Self::Dbe),
            2 => Some(Self::Otb),
            _ => None,
        }
    }

    /// The failure type carried by this event, if any.
    pub const fn failure(self) -> Option<FailureType> {
        match self {
            Self::Clean => None,
            Self::Dbe => Some(FailureType::Dbe),
            Self::Otb => Some(FailureType::Otb),
        }
    }

    /// Return all event types in numeric order.
    pub fn all() -> &'static [Self] {
        &[Self::Clean, Self::Dbe, Self::Otb]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FailureType is the subset of [`EventType`] that represents a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureType {
    Dbe,
    Otb,
}

impl FailureType {
    /// Returns the canonical log/report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dbe => "DBE",
            Self::Otb => "OTB",
        }
    }

    /// The other failure stream, consulted when inferring missing starts.
    pub const fn other(self) -> Self {
        match self {
            Self::Dbe => Self::Otb,
            Self::Otb => Self::Dbe,
        }
    }

    /// Return all failure types.
    pub fn all() -> &'static [Self] {
        &[Self::Dbe, Self::Otb]
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailureType> for EventType {
    fn from(f: FailureType) -> Self {
        match f {
            FailureType::Dbe => Self::Dbe,
            FailureType::Otb => Self::Otb,
        }
    }
}

/// One parsed row of the event log. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub device_serial: String,
    pub slot_location: String,
    pub install_time: Option<Timestamp>,
    /// Remove (or failure) time. Required for failure rows; a failure row
    /// without it is a MissingTimestamp defect.
    pub remove_time: Option<Timestamp>,
    /// Seconds between install and remove, as reported by the log.
    pub duration_seconds: Option<i64>,
    /// Whether the device was seen again after removal.
    pub seen_after_remove: Option<bool>,
    pub event_type: EventType,
}

impl EventRecord {
    /// Returns the failure type of this record, if it is a failure.
    pub fn failure(&self) -> Option<FailureType> {
        self.event_type.failure()
    }
}
