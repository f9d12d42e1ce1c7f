//! Defines routes for the media storage gateway and history ledger.
//!
//! ## Structure
//! - **Probes** (no auth)
//!   - `GET  /health`, `GET /healthz`: liveness
//!   - `GET  /readyz`: readiness (SQLite + object store)
//!
//! - **Storage endpoints** (auth required)
//!   - `POST /storage/upload-url`: presigned PUT URL
//!   - `POST /storage/upload-direct`: multipart upload through the server
//!
//! - **History endpoints** (auth required)
//!   - `POST /generation/history`: record a generation
//!   - `GET  /generation/history`: paginated listing, newest first

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        history_handlers::{create_history, list_history},
        storage_handlers::{create_upload_url, upload_direct},
    },
    middleware::auth::require_auth,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Build the application router over `state`.
///
/// Authentication is a route layer on the protected routes only, so
/// unknown paths still answer 404 rather than 401.
pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/storage/upload-url", post(create_upload_url))
        .route(
            "/storage/upload-direct",
            post(upload_direct).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route(
            "/generation/history",
            post(create_history).get(list_history),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // health endpoints (mounted at root)
        .route("/health", get(healthz))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(protected)
        .with_state(state)
}
