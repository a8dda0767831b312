use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::errors::{MediaError, Result};

/// Write-only object storage for generated images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a PNG under `key` and return its public URL.
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the default AWS credential chain for `region`.
    pub async fn from_env(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.into()))
            .load()
            .await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.bucket, key)
    }
}

pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}")
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/png")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| MediaError::Storage(DisplayErrorContext(err).to_string()))?;
        info!(event = "image_uploaded", bucket = %self.bucket, key, bytes = size);
        Ok(self.public_url(key))
    }
}

/// Keeps objects in memory; URLs use the `memory://` scheme.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.objects
            .lock()
            .map_err(|_| MediaError::Storage("object map poisoned".to_string()))?
            .insert(key.to_string(), bytes);
        Ok(format!("memory://{key}"))
    }
}
