//! Object storage for uploaded media.
//!
//! Uploads go to an S3-compatible bucket (Aliyun OSS in production) through
//! the `object_store` crate. Objects are addressed virtual-hosted style, so the
//! public URL of a key is `https://{bucket}.{endpoint}/{key}`.

use crate::config::ObjectStoreConfig;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    UploadFailed(String),

    #[error("Storage configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`, returning the object's public URL.
    async fn upload(&self, key: &str, data: Bytes) -> Result<String, StorageError>;

    fn public_url(&self, key: &str) -> String;
}

pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    endpoint_host: String,
}

impl ObjectStorage {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        endpoint_host: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            endpoint_host: endpoint_host.into(),
        }
    }

    /// Build an OSS-backed store from configuration.
    pub fn oss(config: &ObjectStoreConfig) -> Result<Self, StorageError> {
        let allow_http = config.endpoint.trim().starts_with("http://");
        let scheme = if allow_http { "http" } else { "https" };
        let endpoint = format!("{}://{}.{}", scheme, config.bucket, config.endpoint_host());

        let store = AmazonS3Builder::new()
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.access_key_secret)
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(true)
            .with_client_options(
                ClientOptions::new()
                    .with_timeout(config.timeout())
                    .with_allow_http(allow_http),
            )
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::new(
            Arc::new(store),
            config.bucket.clone(),
            config.endpoint_host(),
        ))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn upload(&self, key: &str, data: Bytes) -> Result<String, StorageError> {
        let size = data.len();
        let location = Path::from(key);
        let start = Instant::now();

        self.store
            .put_opts(&location, PutPayload::from(data), PutOptions::default())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let url = self.public_url(key);

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(url)
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://{}.{}/{}", self.bucket, self.endpoint_host, key)
    }
}
