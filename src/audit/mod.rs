//! AuditRecorder - append-only record of every unit transition.
//!
//! The engine appends after a transition has been persisted. A failing
//! recorder is logged and ignored: the unit table is the source of truth.

mod in_memory;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::unit::UnitId;

pub use in_memory::InMemoryAuditLog;

/// Actor name used for transitions performed by background jobs.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Reserved,
    /// Reservation metadata moved to another order reference.
    Restamped,
    Sold,
    Released,
    Returned,
    StatusChanged,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::Created => "CREATED",
            AuditAction::Reserved => "RESERVED",
            AuditAction::Restamped => "RESTAMPED",
            AuditAction::Sold => "SOLD",
            AuditAction::Released => "RELEASED",
            AuditAction::Returned => "RETURNED",
            AuditAction::StatusChanged => "STATUS_CHANGED",
        };
        f.write_str(name)
    }
}

/// One audited change to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub unit_id: UnitId,
    pub action: AuditAction,
    pub old_value: String,
    pub new_value: String,
    pub actor: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

pub trait AuditRecorder: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes audit entries to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditRecorder;

impl AuditRecorder for LogAuditRecorder {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "unit_reserve::audit",
            unit_id = entry.unit_id.0,
            action = %entry.action,
            old = %entry.old_value,
            new = %entry.new_value,
            actor = %entry.actor,
            reason = %entry.reason,
            "unit audit"
        );
        Ok(())
    }
}
