//! Shared handler state: every external client is built once in `main` and
//! handed down from here.

use crate::{
    middleware::auth::Authenticator,
    services::{
        history_service::HistoryService, object_store::ObjectStore, upload_service::UploadService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub store: Arc<dyn ObjectStore>,
    pub uploads: UploadService,
    pub history: HistoryService,
    pub authenticator: Arc<dyn Authenticator>,
    /// Body limit for `POST /storage/upload-direct`.
    pub max_upload_bytes: usize,
}
