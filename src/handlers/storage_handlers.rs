//! HTTP handlers for brokering uploads into the object store.
//! Storage concerns (provisioning, key derivation, presigning) live in
//! `UploadService`.

use crate::{
    errors::AppError,
    handlers::json_body::JsonBody,
    middleware::auth::AuthenticatedUser,
    models::upload::{PresignedUpload, StoredUpload},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
};
use bytes::Bytes;
use serde::Deserialize;

/// Request body for `POST /storage/upload-url`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlReq {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// POST `/storage/upload-url`: presigned PUT URL for a new object.
pub async fn create_upload_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<UploadUrlReq>,
) -> Result<Json<PresignedUpload>, AppError> {
    let upload = state
        .uploads
        .issue_upload_url(
            &user.user_id,
            payload.file_name.as_deref(),
            payload.content_type.as_deref(),
        )
        .await?;

    Ok(Json(upload))
}

/// POST `/storage/upload-direct`: multipart upload written by the server.
///
/// Reads the `file` part and an optional `contentType` text part, which
/// takes precedence over the part's own MIME type.
pub async fn upload_direct(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<StoredUpload>, AppError> {
    let mut body = Bytes::new();
    let mut file_name = None;
    let mut part_content_type = None;
    let mut form_content_type = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_owned);
                part_content_type = field.content_type().map(str::to_owned);
                body = field.bytes().await.map_err(multipart_error)?;
            }
            Some("contentType") => {
                form_content_type = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let content_type = form_content_type
        .filter(|ct| !ct.trim().is_empty())
        .or(part_content_type);

    let stored = state
        .uploads
        .upload_direct(
            &user.user_id,
            body,
            file_name.as_deref(),
            content_type.as_deref(),
        )
        .await?;

    Ok(Json(stored))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

#[cfg(test)]
mod tests {
    use crate::{
        routes::routes::routes,
        services::object_store::testing::MemoryObjectStore,
        state::testing::{TEST_BUCKET, USER_HEADER, state_with},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    async fn send(store: Arc<MemoryObjectStore>, request: Request<Body>) -> (StatusCode, Value) {
        let app = routes(state_with(store).await);
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(body: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/storage/upload-url")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    fn multipart_request(parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content_type, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            if let Some(content_type) = content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/storage/upload-direct")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(USER_HEADER, "7")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_url_requires_authentication() {
        let (status, body) = send(Arc::default(), json_request(r#"{"fileName":"a.png"}"#, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn upload_url_requires_file_name() {
        let (status, body) = send(Arc::default(), json_request("{}", Some("7"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fileName is required");
    }

    #[tokio::test]
    async fn upload_url_rejects_user_id_leaving_its_prefix() {
        let store = Arc::new(MemoryObjectStore::default());
        let (status, _) = send(
            store.clone(),
            json_request(r#"{"fileName":"a.png"}"#, Some("a/generated")),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.state().create_calls, 0);
    }

    #[tokio::test]
    async fn upload_url_empty_body_names_missing_field() {
        let (status, body) = send(Arc::default(), json_request("", Some("7"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fileName is required");
    }

    #[tokio::test]
    async fn upload_url_without_json_content_type_names_missing_field() {
        let request = Request::post("/storage/upload-url")
            .header(USER_HEADER, "7")
            .body(Body::from(r#"{"fileName":"a.png"}"#))
            .unwrap();

        let (status, body) = send(Arc::default(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "fileName is required");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn upload_url_malformed_json_is_bad_request() {
        let (status, body) = send(Arc::default(), json_request(r#"{"fileName":"#, Some("7"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn upload_url_returns_presigned_and_public_urls() {
        let store = Arc::new(MemoryObjectStore::default());
        let (status, body) = send(
            store.clone(),
            json_request(r#"{"fileName":"a.jpg","contentType":"image/jpeg"}"#, Some("7")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let key = body["objectKey"].as_str().unwrap();
        assert!(key.starts_with("users/7/generated/") && key.ends_with(".jpg"));
        assert_eq!(body["contentType"], "image/jpeg");
        assert_eq!(
            body["fileUrl"],
            format!("http://localhost:9200/{TEST_BUCKET}/{key}")
        );
        assert!(body["uploadUrl"].as_str().unwrap().contains(key));
        assert!(store.state().buckets.contains_key(TEST_BUCKET));
    }

    #[tokio::test]
    async fn upload_url_store_failure_is_generic_500() {
        let store = Arc::new(MemoryObjectStore::default());
        store.state().fail_exists = true;

        let (status, body) = send(store, json_request(r#"{"fileName":"a.png"}"#, Some("7"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
    }

    #[tokio::test]
    async fn upload_direct_stores_file() {
        let store = Arc::new(MemoryObjectStore::default());
        let request = multipart_request(&[("file", Some("cat.webp"), Some("image/webp"), b"RIFF".as_slice())]);

        let (status, body) = send(store.clone(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contentType"], "image/webp");
        let key = body["objectKey"].as_str().unwrap().to_string();
        assert!(key.ends_with(".webp"));
        let state = store.state();
        let (payload, _) = &state.objects[&(TEST_BUCKET.to_string(), key)];
        assert_eq!(payload.as_ref(), b"RIFF".as_slice());
    }

    #[tokio::test]
    async fn upload_direct_form_content_type_wins() {
        let request = multipart_request(&[
            ("contentType", None, None, b"image/png".as_slice()),
            ("file", Some("blob"), Some("application/x-unknown"), b"data".as_slice()),
        ]);

        let (status, body) = send(Arc::default(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contentType"], "image/png");
        assert!(body["objectKey"].as_str().unwrap().ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_direct_requires_file() {
        let request = multipart_request(&[("contentType", None, None, b"image/png".as_slice())]);

        let (status, body) = send(Arc::default(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "file is required");
    }
}
