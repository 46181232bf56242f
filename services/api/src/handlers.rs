//! Axum Handlers for the counter API
//!
//! Every handler returns the counter as it stands after the request.
//! `utoipa` doc comments feed the OpenAPI document.

use axum::{extract::State, response::Json};
use std::sync::Arc;
use tracing::debug;

use crate::{models::Counter, state::AppState};

/// Read the current counter.
#[utoipa::path(
    get,
    path = "/counter",
    responses(
        (status = 200, description = "Current counter", body = Counter)
    )
)]
pub async fn get_counter(State(state): State<Arc<AppState>>) -> Json<Counter> {
    Json(state.counter.lock().await.clone())
}

/// Replace the counter.
#[utoipa::path(
    put,
    path = "/counter",
    request_body = Counter,
    responses(
        (status = 200, description = "Counter replaced", body = Counter),
        (status = 422, description = "Body is missing `MyProperty` or malformed")
    )
)]
pub async fn update_counter(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Counter>,
) -> Json<Counter> {
    let mut counter = state.counter.lock().await;
    *counter = payload;
    debug!(value = counter.my_property, "Counter replaced");
    Json(counter.clone())
}

/// Add one to the counter.
#[utoipa::path(
    post,
    path = "/counter/increment",
    responses(
        (status = 200, description = "Counter incremented", body = Counter)
    )
)]
pub async fn increment_counter(State(state): State<Arc<AppState>>) -> Json<Counter> {
    let mut counter = state.counter.lock().await;
    counter.increment();
    debug!(value = counter.my_property, "Counter incremented");
    Json(counter.clone())
}

/// Set the counter back to zero.
#[utoipa::path(
    post,
    path = "/counter/reset",
    responses(
        (status = 200, description = "Counter reset", body = Counter)
    )
)]
pub async fn reset_counter(State(state): State<Arc<AppState>>) -> Json<Counter> {
    let mut counter = state.counter.lock().await;
    counter.reset();
    debug!("Counter reset");
    Json(counter.clone())
}
