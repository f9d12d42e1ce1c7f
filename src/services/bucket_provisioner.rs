//! Makes sure the upload bucket exists and is publicly readable.

use super::object_store::{ObjectStore, StoreError, StoreResult};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Idempotent bucket provisioning, run before every upload.
///
/// Policy state is not assumed to survive redeployments of the store, so the
/// public-read policy is re-applied on every call.
#[derive(Clone)]
pub struct BucketProvisioner {
    store: Arc<dyn ObjectStore>,
}

impl BucketProvisioner {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Ensure `bucket` exists and carries the public-read policy.
    ///
    /// - A missing bucket is created; losing a creation race counts as success.
    /// - Any other store error aborts the caller's request.
    /// - A failed policy update is logged and ignored: the upload can still
    ///   succeed, its public URL just may not resolve.
    pub async fn ensure_bucket_ready(&self, bucket: &str) -> StoreResult<()> {
        let exists = self.store.bucket_exists(bucket).await?;
        debug!("bucket {} exists={}", bucket, exists);

        if !exists {
            match self.store.create_bucket(bucket).await {
                Ok(()) => info!("Created bucket {}", bucket),
                Err(StoreError::BucketAlreadyExists(_)) => {
                    debug!("bucket {} was created concurrently", bucket)
                }
                Err(err) => return Err(err),
            }
        }

        let policy = public_read_policy(bucket);
        match self.store.put_bucket_policy(bucket, &policy).await {
            Ok(()) => debug!("applied public-read policy to bucket {}", bucket),
            Err(err) => warn!(
                "failed to apply public-read policy to bucket {}; uploaded objects may not be publicly readable: {}",
                bucket, err
            ),
        }

        Ok(())
    }
}

/// Anonymous `s3:GetObject` on every object in `bucket`.
pub fn public_read_policy(bucket: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }],
    })
    .to_string()
}
