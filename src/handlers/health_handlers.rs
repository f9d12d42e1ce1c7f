//! Health & readiness handlers.
//!
//! - GET /health, /healthz -> simple liveness ("ok")
//! - GET /readyz           -> readiness that checks DB connectivity and the object store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// Reported for a failed dependency; the cause is only logged.
const UNAVAILABLE: &str = "unavailable";

/// `GET /healthz`
///
/// Very small liveness probe; it always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Asks the object store whether the upload bucket exists. Reaching the
///    store is what counts; a missing bucket is created on first upload.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => {
            tracing::warn!("readiness: sqlite check failed: {}", e);
            (false, Some(UNAVAILABLE.to_string()))
        }
    };

    // 2) Object store check
    let store_check = match state.store.bucket_exists(state.uploads.bucket()).await {
        Ok(_) => (true, None::<String>),
        Err(e) => {
            tracing::warn!("readiness: object store check failed: {}", e);
            (false, Some(UNAVAILABLE.to_string()))
        }
    };

    let overall_ok = sqlite_check.0 && store_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_check.0,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "object_store",
        CheckStatus {
            ok: store_check.0,
            error: store_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::{
        routes::routes::routes, services::object_store::testing::MemoryObjectStore,
        state::testing::state_with,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn probe(store: Arc<MemoryObjectStore>, path: &str) -> (StatusCode, Value) {
        let app = routes(state_with(store).await);
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn liveness_needs_no_auth() {
        for path in ["/health", "/healthz"] {
            let (status, body) = probe(Arc::default(), path).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
        }
    }

    #[tokio::test]
    async fn ready_when_dependencies_answer() {
        let (status, body) = probe(Arc::default(), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["object_store"]["ok"], true);
    }

    #[tokio::test]
    async fn unready_when_store_unreachable() {
        let store = Arc::new(MemoryObjectStore::default());
        store.state().fail_exists = true;

        let (status, body) = probe(store, "/readyz").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["checks"]["object_store"]["ok"], false);
        assert_eq!(body["checks"]["object_store"]["error"], "unavailable");
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
    }
}
