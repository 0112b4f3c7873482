//! Object storage access for data capture files

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use log::debug;

use crate::error::{ErrorContext, Result, ServiceError};

/// Read-only access to stored objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Full contents of `bucket/key`
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// S3-backed object store
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Client configured from the default AWS credential and region chain
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        debug!("Fetching s3://{}/{}", bucket, key);
        let context = ErrorContext::for_service("s3")
            .endpoint(format!("s3://{}/{}", bucket, key));

        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                let error = match err.as_service_error() {
                    Some(GetObjectError::NoSuchKey(_)) => {
                        ServiceError::not_found(format!("No such key: s3://{}/{}", bucket, key))
                    }
                    _ => ServiceError::storage(DisplayErrorContext(&err).to_string()),
                };
                return Err(error.with_context(context));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| ServiceError::storage(format!("Failed to read object body: {}", e)).with_context(context))?;

        Ok(body.to_vec())
    }
}

/// In-memory object store that counts reads
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    reads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, contents: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert((bucket.to_string(), key.to_string()), contents.into());
        }
    }

    /// Number of `get_object` calls made so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let objects = self
            .objects
            .lock()
            .map_err(|_| ServiceError::internal("object store lock poisoned"))?;

        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("No such key: s3://{}/{}", bucket, key)))
    }
}
