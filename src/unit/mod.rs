//! Inventory units - the data model the engine mutates.
//!
//! A unit is one physically distinct item with an immutable serial. Its
//! `status` moves only along the edges of [`UnitStatus::allowed_targets`];
//! reservation metadata rides along while the unit is `Reserved`.

mod reference;
mod status;
#[allow(clippy::module_inception)]
mod unit;

pub use reference::{
    cart_session_ref, temp_order_ref, RefKind, CART_SESSION_PREFIX, TEMP_ORDER_PREFIX,
};
pub use status::{ParseStatusError, TransitionError, UnitStatus};
pub use unit::{
    Channel, InventoryUnit, NewUnit, Provenance, ReservationStamp, UnitId, VariantId,
};
