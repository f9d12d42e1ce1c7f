//! src/services/upload_service.rs
//!
//! UploadService: brokers writes of generated images into the object store.
//! Two entry points share provisioning and key derivation:
//! - `issue_upload_url` hands the client a presigned PUT URL
//! - `upload_direct` writes the bytes from the server
//!
//! Both return the public URL under which the object will be served.

use super::{
    bucket_provisioner::BucketProvisioner,
    object_store::{ObjectStore, StoreError},
};
use crate::models::{
    object_key::ObjectKey,
    upload::{PresignedUpload, StoredUpload},
};
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_UPLOAD_NAME: &str = "image.png";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    provisioner: BucketProvisioner,
    bucket: String,
    /// Base URL clients fetch objects from; may differ from the S3 endpoint.
    public_endpoint: String,
    presign_expiry: Duration,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        public_endpoint: impl Into<String>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            provisioner: BucketProvisioner::new(store.clone()),
            store,
            bucket: bucket.into(),
            public_endpoint: public_endpoint.into(),
            presign_expiry,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Issue a presigned PUT URL for a new object owned by `user_id`.
    ///
    /// The URL is returned exactly as the store produced it: changing its
    /// host or encoding would invalidate the signature.
    pub async fn issue_upload_url(
        &self,
        user_id: &str,
        file_name: Option<&str>,
        content_type: Option<&str>,
    ) -> UploadResult<PresignedUpload> {
        let file_name = non_blank(file_name).ok_or(UploadError::MissingField("fileName"))?;
        let content_type = non_blank(content_type).unwrap_or(DEFAULT_CONTENT_TYPE);
        debug!(
            "upload-url userId={} fileName={} contentType={}",
            user_id, file_name, content_type
        );

        self.provisioner.ensure_bucket_ready(&self.bucket).await?;

        let object_key = ObjectKey::generate(user_id, file_name);
        let upload_url = self
            .store
            .presign_put(
                &self.bucket,
                object_key.as_str(),
                content_type,
                self.presign_expiry,
            )
            .await?;
        debug!("presigned PUT for {}", object_key);

        Ok(PresignedUpload {
            upload_url,
            file_url: self.public_url(&object_key),
            object_key,
            content_type: content_type.to_string(),
        })
    }

    /// Store `body` for `user_id` and return where it can be fetched.
    ///
    /// `original_name` only contributes the extension; it defaults to
    /// [`DEFAULT_UPLOAD_NAME`].
    pub async fn upload_direct(
        &self,
        user_id: &str,
        body: Bytes,
        original_name: Option<&str>,
        content_type: Option<&str>,
    ) -> UploadResult<StoredUpload> {
        if body.is_empty() {
            return Err(UploadError::MissingField("file"));
        }
        let original_name = non_blank(original_name).unwrap_or(DEFAULT_UPLOAD_NAME);
        let content_type = non_blank(content_type).unwrap_or(DEFAULT_CONTENT_TYPE);
        debug!(
            "upload-direct userId={} fileName={} contentType={} size={}",
            user_id,
            original_name,
            content_type,
            body.len()
        );

        self.provisioner.ensure_bucket_ready(&self.bucket).await?;

        let object_key = ObjectKey::generate(user_id, original_name);
        let size = body.len();
        self.store
            .put_object(&self.bucket, object_key.as_str(), body, content_type)
            .await?;
        info!("stored {} ({} bytes)", object_key, size);

        Ok(StoredUpload {
            file_url: self.public_url(&object_key),
            object_key,
            content_type: content_type.to_string(),
        })
    }

    /// `<public endpoint>/<bucket>/<key>`, key left unescaped so its `/`
    /// separators still address the object.
    pub fn public_url(&self, key: &ObjectKey) -> String {
        format!(
            "{}/{}/{}",
            self.public_endpoint.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
