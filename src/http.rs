//! HTTP transport for the reservation engine.
//!
//! Requires the `http` feature. Uses axum for routing; every engine call
//! runs on tokio's blocking pool since it may wait on a variant lock.
//!
//! ## Routes
//!
//! - `GET /health`
//! - `GET /variants/:variant_id/stock`: available count and per-status summary
//! - `POST /availability`: `{ "requests": [...] }` → `{ "available": bool }`
//! - `POST /reservations`: `{ "channel", "order_ref", "actor", "requests" }`
//! - `POST /sales`: `{ "unit_ids", "order_ref", "actor" }`
//! - `POST /releases`: `{ "unit_ids", "reason", "actor", "safe"? }`
//! - `POST /returns`: `{ "unit_ids", "reason", "actor" }`
//!
//! Errors are returned as `{ "error", "detail", "retryable" }`: business
//! failures map to 4xx, lock and concurrency failures to 503.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::engine::{ReservationContext, ReservationEngine, ReservationRequest};
use crate::error::{ErrorKind, ReservationError};
use crate::lock::Locker;
use crate::store::UnitStore;
use crate::unit::{Channel, UnitId, VariantId};

type Engine<S, L> = Arc<ReservationEngine<S, L>>;

/// Build an axum `Router` over the given engine.
pub fn router<S, L>(engine: Engine<S, L>) -> Router
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/variants/:variant_id/stock", get(stock_handler::<S, L>))
        .route("/availability", post(availability_handler::<S, L>))
        .route("/reservations", post(reserve_handler::<S, L>))
        .route("/sales", post(confirm_handler::<S, L>))
        .route("/releases", post(release_handler::<S, L>))
        .route("/returns", post(return_handler::<S, L>))
        .with_state(engine)
}

/// Serve the engine over HTTP at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve<S, L>(engine: Engine<S, L>, addr: &str) -> Result<(), std::io::Error>
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityBody {
    pub requests: Vec<ReservationRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    pub channel: Channel,
    pub order_ref: String,
    pub actor: String,
    pub requests: Vec<ReservationRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub unit_ids: Vec<UnitId>,
    pub order_ref: String,
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseBody {
    pub unit_ids: Vec<UnitId>,
    pub reason: String,
    pub actor: String,
    #[serde(default)]
    pub safe: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReturnBody {
    pub unit_ids: Vec<UnitId>,
    pub reason: String,
    pub actor: String,
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn stock_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Path(variant_id): Path<u64>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    let variant_id = VariantId(variant_id);
    respond(blocking(move || engine.stock_summary(variant_id)).await, |summary| {
        json!({
            "variant_id": summary.variant_id,
            "available": summary.available(),
            "total": summary.total,
            "by_status": summary.by_status,
        })
    })
}

async fn availability_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Json(body): Json<AvailabilityBody>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    respond(
        blocking(move || engine.check_availability(&body.requests)).await,
        |available| json!({ "available": available }),
    )
}

async fn reserve_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Json(body): Json<ReserveBody>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    let ctx = ReservationContext::new(body.channel, body.order_ref, body.actor);
    let requests = body.requests;
    respond(
        blocking(move || engine.reserve(&requests, &ctx)).await,
        |unit_ids| json!({ "unit_ids": unit_ids }),
    )
}

async fn confirm_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Json(body): Json<ConfirmBody>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    let result = blocking(move || {
        Ok(engine.confirm_sale(&body.unit_ids, &body.order_ref, &body.actor))
    })
    .await;
    respond(result, |outcome| {
        let failed: Vec<_> = outcome
            .failed
            .iter()
            .map(|(unit_id, err)| json!({ "unit_id": unit_id, "error": err.to_string() }))
            .collect();
        json!({ "succeeded": outcome.succeeded, "failed": failed })
    })
}

async fn release_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Json(body): Json<ReleaseBody>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    let result = blocking(move || {
        if body.safe {
            engine.release_safe(&body.unit_ids, &body.reason, &body.actor)
        } else {
            engine.release(&body.unit_ids, &body.reason, &body.actor)
        }
    })
    .await;
    respond(result, |unit_ids| json!({ "unit_ids": unit_ids }))
}

async fn return_handler<S, L>(
    State(engine): State<Engine<S, L>>,
    Json(body): Json<ReturnBody>,
) -> Response
where
    S: UnitStore + 'static,
    L: Locker + 'static,
{
    respond(
        blocking(move || engine.return_to_stock(&body.unit_ids, &body.reason, &body.actor)).await,
        |unit_ids| json!({ "unit_ids": unit_ids }),
    )
}

async fn blocking<T, F>(work: F) -> Result<T, ReservationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ReservationError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "engine task failed");
            Err(ReservationError::Storage(format!("engine task failed: {}", err)))
        }
    }
}

fn respond<T, F>(result: Result<T, ReservationError>, render: F) -> Response
where
    F: FnOnce(T) -> serde_json::Value,
{
    match result {
        Ok(value) => (StatusCode::OK, Json(render(value))).into_response(),
        Err(err) => {
            let body = json!({
                "error": err.user_message(),
                "detail": err.to_string(),
                "retryable": err.is_retryable(),
            });
            (status_for(&err), Json(body)).into_response()
        }
    }
}

fn status_for(err: &ReservationError) -> StatusCode {
    match err {
        ReservationError::UnitNotFound(_) => StatusCode::NOT_FOUND,
        ReservationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => match err.kind() {
            ErrorKind::Business => StatusCode::CONFLICT,
            ErrorKind::Retryable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}
