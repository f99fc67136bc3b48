//! Order reference conventions.
//!
//! A reservation is always held under an order reference. Besides final order
//! ids, two provisional kinds exist: cart sessions and temporary pre-order
//! ids handed out while an order is still being created. Both are recognised
//! by prefix and may be re-stamped onto a final order without releasing the
//! unit.

use serde::{Deserialize, Serialize};

/// Prefix of cart-session references.
pub const CART_SESSION_PREFIX: &str = "CART-";

/// Prefix of temporary pre-order references.
pub const TEMP_ORDER_PREFIX: &str = "TEMP-";

/// Classification of an order reference by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    CartSession,
    TempOrder,
    Order,
}

impl RefKind {
    pub fn of(order_ref: &str) -> RefKind {
        if order_ref.starts_with(CART_SESSION_PREFIX) {
            RefKind::CartSession
        } else if order_ref.starts_with(TEMP_ORDER_PREFIX) {
            RefKind::TempOrder
        } else {
            RefKind::Order
        }
    }

    pub fn prefix(self) -> Option<&'static str> {
        match self {
            RefKind::CartSession => Some(CART_SESSION_PREFIX),
            RefKind::TempOrder => Some(TEMP_ORDER_PREFIX),
            RefKind::Order => None,
        }
    }
}

pub fn cart_session_ref(session_id: impl AsRef<str>) -> String {
    format!("{}{}", CART_SESSION_PREFIX, session_id.as_ref())
}

pub fn temp_order_ref(attempt_id: impl AsRef<str>) -> String {
    format!("{}{}", TEMP_ORDER_PREFIX, attempt_id.as_ref())
}
