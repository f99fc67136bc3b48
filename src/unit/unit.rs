use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::reference::RefKind;
use super::status::UnitStatus;

/// Identifier of a single inventory unit. Ordering is the selection order
/// used when any available unit may be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

/// Identifier of a sellable product configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a reservation came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Pos,
    Online,
    Cart,
    Admin,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Pos => "POS",
            Channel::Online => "ONLINE",
            Channel::Cart => "CART",
            Channel::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POS" => Ok(Channel::Pos),
            "ONLINE" => Ok(Channel::Online),
            "CART" => Ok(Channel::Cart),
            "ADMIN" => Ok(Channel::Admin),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// Reservation metadata stamped onto a unit when it is reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStamp {
    pub channel: Channel,
    pub order_ref: String,
    pub reserved_at: DateTime<Utc>,
}

impl ReservationStamp {
    pub fn ref_kind(&self) -> RefKind {
        RefKind::of(&self.order_ref)
    }

    /// True for a cart reservation that may be converted to an order.
    pub fn is_cart_session(&self) -> bool {
        self.channel == Channel::Cart && self.ref_kind() == RefKind::CartSession
    }

    pub fn is_temp_order(&self) -> bool {
        self.ref_kind() == RefKind::TempOrder
    }
}

/// Where a unit came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub batch_id: Option<String>,
    pub supplier: Option<String>,
    pub manufactured_on: Option<NaiveDate>,
    pub warranty_expires_on: Option<NaiveDate>,
    pub note: Option<String>,
    pub import_batch_id: Option<String>,
}

/// One physically distinct, individually trackable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: UnitId,
    pub serial: String,
    pub variant_id: VariantId,
    pub status: UnitStatus,
    /// Last reservation stamp. Stale unless `status` is `Reserved`; read it
    /// through [`InventoryUnit::active_reservation`].
    pub reservation: Option<ReservationStamp>,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by the store on every successful write.
    pub version: u64,
}

impl InventoryUnit {
    /// The reservation stamp, only while the unit is reserved.
    pub fn active_reservation(&self) -> Option<&ReservationStamp> {
        if self.status == UnitStatus::Reserved {
            self.reservation.as_ref()
        } else {
            None
        }
    }

    pub fn is_reserved_under(&self, order_ref: &str) -> bool {
        self.active_reservation()
            .map(|stamp| stamp.order_ref == order_ref)
            .unwrap_or(false)
    }
}

/// A unit that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUnit {
    pub serial: String,
    pub variant_id: VariantId,
    #[serde(default)]
    pub provenance: Provenance,
}

impl NewUnit {
    pub fn new(variant_id: VariantId, serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            variant_id,
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}
