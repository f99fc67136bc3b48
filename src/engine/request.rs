use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReservationError;
use crate::unit::{Channel, UnitId, UnitStatus, VariantId};

/// Who is reserving, and under which order reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationContext {
    pub channel: Channel,
    pub order_ref: String,
    pub actor: String,
}

impl ReservationContext {
    pub fn new(channel: Channel, order_ref: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            channel,
            order_ref: order_ref.into(),
            actor: actor.into(),
        }
    }
}

/// What a request line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    /// Any `quantity` available units of the variant.
    Any { quantity: usize },
    /// One particular unit.
    Specific { unit_id: UnitId },
}

/// One line of a reservation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub variant_id: VariantId,
    #[serde(flatten)]
    pub kind: RequestKind,
}

impl ReservationRequest {
    pub fn any(variant_id: VariantId, quantity: usize) -> Self {
        Self {
            variant_id,
            kind: RequestKind::Any { quantity },
        }
    }

    pub fn specific(variant_id: VariantId, unit_id: UnitId) -> Self {
        Self {
            variant_id,
            kind: RequestKind::Specific { unit_id },
        }
    }
}

/// All lines for one variant, merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct VariantPlan {
    pub specific: Vec<UnitId>,
    pub quantity: usize,
}

/// Group request lines by variant. Specific ids keep their order; "any"
/// quantities are summed. Iteration order is ascending variant id.
pub(crate) fn plan_by_variant(
    requests: &[ReservationRequest],
) -> Result<BTreeMap<VariantId, VariantPlan>, ReservationError> {
    if requests.is_empty() {
        return Err(ReservationError::InvalidRequest(
            "reservation has no request lines".into(),
        ));
    }

    let mut plans: BTreeMap<VariantId, VariantPlan> = BTreeMap::new();
    for request in requests {
        let plan = plans.entry(request.variant_id).or_default();
        match request.kind {
            RequestKind::Any { quantity: 0 } => {
                return Err(ReservationError::InvalidRequest(format!(
                    "quantity for variant {} must be positive",
                    request.variant_id
                )));
            }
            RequestKind::Any { quantity } => plan.quantity += quantity,
            RequestKind::Specific { unit_id } => {
                if plan.specific.contains(&unit_id) {
                    return Err(ReservationError::InvalidRequest(format!(
                        "unit {} requested more than once",
                        unit_id
                    )));
                }
                plan.specific.push(unit_id);
            }
        }
    }
    Ok(plans)
}

/// Per-id result of a batch operation that does not stop at the first
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<UnitId>,
    pub failed: Vec<(UnitId, ReservationError)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn error_for(&self, unit_id: UnitId) -> Option<&ReservationError> {
        self.failed
            .iter()
            .find(|(id, _)| *id == unit_id)
            .map(|(_, err)| err)
    }
}

/// Unit counts per status for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub variant_id: VariantId,
    pub total: usize,
    pub by_status: BTreeMap<UnitStatus, usize>,
}

impl StockSummary {
    pub fn count(&self, status: UnitStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn available(&self) -> usize {
        self.count(UnitStatus::Available)
    }
}
