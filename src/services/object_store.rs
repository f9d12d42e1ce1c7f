//! src/services/object_store.rs
//!
//! ObjectStore is the set of S3 primitives the gateway relies on: bucket
//! existence, bucket creation, bucket policy, presigned PUT and direct PUT.
//! `S3ObjectStore` talks to any S3-compatible service (AWS, MinIO) through
//! `aws-sdk-s3`; services only ever see `Arc<dyn ObjectStore>`.

use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{create_bucket::CreateBucketError, head_bucket::HeadBucketError},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("object store {operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
    #[error("invalid presigning configuration: {0}")]
    Presigning(String),
}

impl StoreError {
    fn request(operation: &'static str, err: impl std::error::Error) -> Self {
        Self::Request {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object store capability consumed by the provisioner and upload broker.
///
/// `create_bucket` reports an already existing bucket as
/// [`StoreError::BucketAlreadyExists`]; callers decide whether that matters.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(false)` when the store reports the bucket as missing.
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()>;

    /// Presigned PUT URL for `key`, bound to `content_type`.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<String>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StoreResult<()>;
}

/// `ObjectStore` backed by `aws-sdk-s3`.
pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    /// Build a client for `cfg.endpoint` with path-style addressing, static
    /// credentials when configured, bounded retries and an operation timeout.
    pub async fn connect(cfg: &S3Config) -> Self {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(MAX_ATTEMPTS)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(cfg.timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .endpoint_url(&cfg.endpoint)
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "ai-image-api",
            ));
        }

        let sdk_config = loader.load().await;

        // MinIO serves buckets by path, not by virtual host.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "Initialized S3 client for endpoint {} with {} max attempts",
            cfg.endpoint, MAX_ATTEMPTS
        );

        Self {
            client: Client::from_conf(s3_config),
            region: cfg.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), HeadBucketError::NotFound(_))
                    || service_err.err().code() == Some("NoSuchBucket")
                    || service_err.raw().status().as_u16() == 404 =>
            {
                debug!("bucket {} not found", bucket);
                Ok(false)
            }
            Err(err) => Err(StoreError::request("HeadBucket", err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service_err))
                if matches!(
                    service_err.err(),
                    CreateBucketError::BucketAlreadyOwnedByYou(_)
                        | CreateBucketError::BucketAlreadyExists(_)
                ) =>
            {
                Err(StoreError::BucketAlreadyExists(bucket.to_string()))
            }
            Err(err) => Err(StoreError::request("CreateBucket", err)),
        }
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|err| StoreError::request("PutBucketPolicy", err))?;
        Ok(())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StoreError::Presigning(err.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|err| StoreError::request("PresignPutObject", err))?;

        Ok(presigned.uri().to_string())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        let content_length = body.len() as i64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| StoreError::request("PutObject", err))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory `ObjectStore` with failure switches for unit tests.

    use super::*;
    use std::{
        collections::HashMap,
        sync::{Mutex, MutexGuard},
    };

    #[derive(Default)]
    pub struct MemoryState {
        /// Bucket name -> applied policy.
        pub buckets: HashMap<String, Option<String>>,
        /// (bucket, key) -> (payload, content type).
        pub objects: HashMap<(String, String), (Bytes, String)>,
        pub create_calls: usize,
        pub policy_calls: usize,
        /// `bucket_exists` always answers `false`, as seen by a racing provisioner.
        pub hide_buckets: bool,
        pub fail_exists: bool,
        pub fail_create: bool,
        pub fail_policy: bool,
        pub fail_presign: bool,
        pub fail_put: bool,
        /// Returned verbatim by `presign_put` when set.
        pub presigned_url: Option<String>,
    }

    #[derive(Default)]
    pub struct MemoryObjectStore {
        state: Mutex<MemoryState>,
    }

    impl MemoryObjectStore {
        pub fn state(&self) -> MutexGuard<'_, MemoryState> {
            self.state.lock().expect("memory store poisoned")
        }
    }

    fn injected(operation: &'static str) -> StoreError {
        StoreError::Request {
            operation,
            message: "injected failure".into(),
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
            let state = self.state();
            if state.fail_exists {
                return Err(injected("HeadBucket"));
            }
            Ok(!state.hide_buckets && state.buckets.contains_key(bucket))
        }

        async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
            let mut state = self.state();
            state.create_calls += 1;
            if state.fail_create {
                return Err(injected("CreateBucket"));
            }
            if state.buckets.contains_key(bucket) {
                return Err(StoreError::BucketAlreadyExists(bucket.to_string()));
            }
            state.buckets.insert(bucket.to_string(), None);
            Ok(())
        }

        async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
            let mut state = self.state();
            state.policy_calls += 1;
            if state.fail_policy {
                return Err(injected("PutBucketPolicy"));
            }
            match state.buckets.get_mut(bucket) {
                Some(slot) => {
                    *slot = Some(policy.to_string());
                    Ok(())
                }
                None => Err(injected("PutBucketPolicy")),
            }
        }

        async fn presign_put(
            &self,
            bucket: &str,
            key: &str,
            _content_type: &str,
            expires_in: Duration,
        ) -> StoreResult<String> {
            let state = self.state();
            if state.fail_presign {
                return Err(injected("PresignPutObject"));
            }
            Ok(state.presigned_url.clone().unwrap_or_else(|| {
                format!(
                    "http://store.internal:9000/{}/{}?X-Amz-Expires={}&X-Amz-Signature=deadbeef",
                    bucket,
                    key,
                    expires_in.as_secs()
                )
            }))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> StoreResult<()> {
            let mut state = self.state();
            if state.fail_put || !state.buckets.contains_key(bucket) {
                return Err(injected("PutObject"));
            }
            state.objects.insert(
                (bucket.to_string(), key.to_string()),
                (body, content_type.to_string()),
            );
            Ok(())
        }
    }
}
