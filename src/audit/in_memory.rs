use std::sync::{Arc, RwLock};

use super::{AuditAction, AuditEntry, AuditError, AuditRecorder};
use crate::unit::UnitId;

/// Audit log kept in memory. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn for_unit(&self, unit_id: UnitId) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.unit_id == unit_id)
            .collect()
    }

    pub fn with_action(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditRecorder for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::Unavailable("audit buffer poisoned".into()))?;
        entries.push(entry);
        Ok(())
    }
}
