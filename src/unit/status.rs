//! Unit lifecycle status and the transition table that governs it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a single serialized unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,
    Reserved,
    Sold,
    Returned,
    Damaged,
    Disposed,
    Unavailable,
    DisplayUnit,
    QualityControl,
    InTransit,
}

/// A status change that the transition table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: UnitStatus,
    pub to: UnitStatus,
}

impl UnitStatus {
    /// Every status, in declaration order.
    pub const ALL: [UnitStatus; 10] = [
        UnitStatus::Available,
        UnitStatus::Reserved,
        UnitStatus::Sold,
        UnitStatus::Returned,
        UnitStatus::Damaged,
        UnitStatus::Disposed,
        UnitStatus::Unavailable,
        UnitStatus::DisplayUnit,
        UnitStatus::QualityControl,
        UnitStatus::InTransit,
    ];

    /// Statuses reachable from `self` in a single step.
    pub fn allowed_targets(self) -> &'static [UnitStatus] {
        use UnitStatus::*;
        match self {
            Available => &[Reserved, Damaged, Unavailable, DisplayUnit],
            Reserved => &[Available, Sold, Damaged],
            Sold => &[Returned, Damaged],
            Returned => &[Available, Damaged, Disposed],
            Damaged => &[Available, Disposed],
            Unavailable => &[Available, Damaged],
            DisplayUnit => &[Available, Damaged],
            QualityControl => &[Available, Damaged],
            InTransit => &[Available, QualityControl],
            Disposed => &[],
        }
    }

    pub fn can_transition_to(self, to: UnitStatus) -> bool {
        self.allowed_targets().contains(&to)
    }

    /// Validate `self -> to`, returning the target on success.
    pub fn transition_to(self, to: UnitStatus) -> Result<UnitStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Reserved => "RESERVED",
            UnitStatus::Sold => "SOLD",
            UnitStatus::Returned => "RETURNED",
            UnitStatus::Damaged => "DAMAGED",
            UnitStatus::Disposed => "DISPOSED",
            UnitStatus::Unavailable => "UNAVAILABLE",
            UnitStatus::DisplayUnit => "DISPLAY_UNIT",
            UnitStatus::QualityControl => "QUALITY_CONTROL",
            UnitStatus::InTransit => "IN_TRANSIT",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown unit status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for UnitStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
