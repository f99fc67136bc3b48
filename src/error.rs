use std::time::Duration;

use thiserror::Error;

use crate::lock::LockError;
use crate::store::StoreError;
use crate::unit::{TransitionError, UnitId, UnitStatus, VariantId};

/// Errors surfaced by the reservation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("insufficient inventory for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        variant_id: VariantId,
        requested: usize,
        available: usize,
    },
    #[error("unit {unit_id} belongs to variant {actual}, not {expected}")]
    VariantMismatch {
        unit_id: UnitId,
        expected: VariantId,
        actual: VariantId,
    },
    #[error("unit {unit_id} cannot be reserved from status {status}")]
    UnitNotReservable { unit_id: UnitId, status: UnitStatus },
    #[error("unit {unit_id} is not reserved (status {status})")]
    NotReserved { unit_id: UnitId, status: UnitStatus },
    #[error("unit {unit_id} is not reserved under order {order_ref}")]
    OrderMismatch { unit_id: UnitId, order_ref: String },
    #[error("unit {unit_id}: invalid status transition from {from} to {to}")]
    InvalidTransition {
        unit_id: UnitId,
        from: UnitStatus,
        to: UnitStatus,
    },
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),
    #[error("serial already assigned: {0}")]
    DuplicateSerial(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("timed out after {waited:?} waiting for lock {key}")]
    LockTimeout { key: String, waited: Duration },
    /// A single optimistic write lost a race. Retried internally; callers
    /// see [`ReservationError::ConcurrencyConflict`] once retries run out.
    #[error("version conflict on unit {unit_id} (expected {expected}, actual {actual})")]
    VersionConflict {
        unit_id: UnitId,
        expected: u64,
        actual: u64,
    },
    #[error("gave up after {attempts} attempts due to concurrent modification")]
    ConcurrencyConflict { attempts: u32 },
    #[error("lock error: {0}")]
    Lock(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Broad classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not enough stock, or the caller referenced units inconsistently.
    Business,
    /// Contention; retrying the whole request later may succeed.
    Retryable,
    /// A bug or infrastructure failure.
    Internal,
}

impl ReservationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReservationError::InsufficientInventory { .. }
            | ReservationError::VariantMismatch { .. }
            | ReservationError::UnitNotReservable { .. }
            | ReservationError::OrderMismatch { .. }
            | ReservationError::NotReserved { .. }
            | ReservationError::UnitNotFound(_)
            | ReservationError::DuplicateSerial(_)
            | ReservationError::InvalidRequest(_) => ErrorKind::Business,
            ReservationError::LockTimeout { .. }
            | ReservationError::VersionConflict { .. }
            | ReservationError::ConcurrencyConflict { .. } => ErrorKind::Retryable,
            ReservationError::InvalidTransition { .. }
            | ReservationError::Lock(_)
            | ReservationError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Message suitable for an end user.
    pub fn user_message(&self) -> String {
        match self {
            ReservationError::InsufficientInventory { available, .. } => {
                format!("Not enough stock: only {} left", available)
            }
            ReservationError::VariantMismatch { .. }
            | ReservationError::UnitNotReservable { .. }
            | ReservationError::OrderMismatch { .. }
            | ReservationError::UnitNotFound(_) => {
                "The selected item is no longer available".to_string()
            }
            _ if self.is_retryable() => {
                "We could not complete your request right now, please retry".to_string()
            }
            _ => "Something went wrong, please contact support".to_string(),
        }
    }

    pub(crate) fn from_transition(unit_id: UnitId, err: TransitionError) -> Self {
        ReservationError::InvalidTransition {
            unit_id,
            from: err.from,
            to: err.to,
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                unit_id,
                expected,
                actual,
            } => ReservationError::VersionConflict {
                unit_id,
                expected,
                actual,
            },
            StoreError::NotFound(id) => ReservationError::UnitNotFound(id),
            StoreError::DuplicateSerial(serial) => ReservationError::DuplicateSerial(serial),
            StoreError::Storage(message) => ReservationError::Storage(message),
        }
    }
}

impl From<LockError> for ReservationError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { key, waited } => ReservationError::LockTimeout { key, waited },
            other => ReservationError::Lock(other.to_string()),
        }
    }
}
