//! Responses handed back to clients after brokering an upload.

use super::object_key::ObjectKey;
use serde::Serialize;

/// Credentials for a client-executed PUT.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// Presigned URL exactly as the object store issued it.
    pub upload_url: String,
    pub file_url: String,
    pub object_key: ObjectKey,
    pub content_type: String,
}

/// Result of a server-side write.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub file_url: String,
    pub object_key: ObjectKey,
    pub content_type: String,
}
