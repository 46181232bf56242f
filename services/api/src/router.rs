//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the counter API, the debug WebSocket endpoint, and OpenAPI
//! documentation.

use crate::{handlers, models::Counter, state::AppState, ws::ws_handler};

use axum::{
    Router,
    routing::{get, post},
};
use std::{path::Path, sync::Arc};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Path of the debug console WebSocket.
pub const DEBUG_PATH: &str = "/debug";

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_counter,
        handlers::update_counter,
        handlers::increment_counter,
        handlers::reset_counter,
    ),
    components(schemas(Counter)),
    tags(
        (name = "Duplex API", description = "Counter model and debug console host")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/counter",
            get(handlers::get_counter).put(handlers::update_counter),
        )
        .route("/counter/increment", post(handlers::increment_counter))
        .route("/counter/reset", post(handlers::reset_counter))
        .route(DEBUG_PATH, get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

/// Writes the OpenAPI document for the counter API as pretty JSON to `path`.
pub fn write_openapi(path: &Path) -> anyhow::Result<()> {
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    Ok(())
}
