//! HTTP handlers for the generation history ledger.

use crate::{
    errors::AppError,
    handlers::json_body::JsonBody,
    middleware::auth::AuthenticatedUser,
    models::history::{HistoryEntry, HistoryPage, NewHistoryEntry},
    services::history_service::PageRequest,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

/// Query params for listing. Kept as strings so junk values fall back to
/// defaults instead of failing the request.
#[derive(Debug, Deserialize)]
pub struct ListHistoryQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// POST `/generation/history`: record a completed generation.
pub async fn create_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<NewHistoryEntry>,
) -> Result<Json<HistoryEntry>, AppError> {
    let entry = state.history.record_event(&user.user_id, payload).await?;
    Ok(Json(entry))
}

/// GET `/generation/history?page=&pageSize=`: newest first.
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(q): Query<ListHistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    let request = PageRequest::parse(q.page.as_deref(), q.page_size.as_deref());
    let page = state.history.list_history(&user.user_id, request).await?;
    Ok(Json(page))
}
