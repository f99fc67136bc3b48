//! Reservation engine integration tests.
//!
//! - Bulk and mixed multi-line reservations
//! - Specific-unit reservation, cart and temporary-order conversion
//! - Concurrency: no oversell, lock timeouts, optimistic retries
//! - Sale, release, return and administrative status changes
//! - Expiration sweeps
//! - Unit provisioning and stock-change notifications

mod bulk;
mod specific;
mod lifecycle;
mod sweeper;
mod provisioning;
