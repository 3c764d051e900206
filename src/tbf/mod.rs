pub mod device;
pub mod fleet;

use std::fmt;

use serde::Serialize;

use crate::record::event::FailureType;

/// Failure selection for fleet-wide series: one failure type, or the union
/// of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FailureKind {
    #[serde(rename = "DBE")]
    Dbe,
    #[serde(rename = "OTB")]
    Otb,
    /// DBE or OTB: the set union of both timestamp sets.
    #[serde(rename = "DBE_or_OTB")]
    Either,
}

impl FailureKind {
    /// Returns the canonical report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dbe => "DBE",
            Self::Otb => "OTB",
            Self::Either => "DBE_or_OTB",
        }
    }

    /// Failure types included in this kind.
    pub fn failure_types(self) -> &'static [FailureType] {
        match self {
            Self::Dbe => &[FailureType::Dbe],
            Self::Otb => &[FailureType::Otb],
            Self::Either => &[FailureType::Dbe, FailureType::Otb],
        }
    }

    /// Return all kinds in report order.
    pub fn all() -> &'static [Self] {
        &[Self::Dbe, Self::Otb, Self::Either]
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailureType> for FailureKind {
    fn from(f: FailureType) -> Self {
        match f {
            FailureType::Dbe => Self::Dbe,
            FailureType::Otb => Self::Otb,
        }
    }
}
