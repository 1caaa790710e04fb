//! S3-compatible object storage for export files.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, BucketConfiguration, Region};
use std::path::Path;
use thiserror::Error;

use crate::config::BucketSettings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    S3(#[from] S3Error),

    #[error("Invalid storage credentials: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bucket-style object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket unless it already exists
    async fn ensure_bucket(&self) -> Result<(), StorageError>;

    /// Stream a local file to `remote_path`
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError>;

    /// Time-limited GET URL for `remote_path`
    async fn presign(&self, remote_path: &str, ttl_secs: u32) -> Result<String, StorageError>;
}

pub struct S3Store {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(settings: &BucketSettings) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Credentials(e.to_string()))?;

        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&settings.name, region.clone(), credentials.clone())?;
        // Path-style URLs (http://endpoint/bucket) work with local emulators and MinIO
        bucket.set_path_style();

        Ok(Self {
            bucket,
            region,
            credentials,
        })
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        tracing::info!("Checking bucket {}", self.bucket.name());

        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Bucket with name {} has been created", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                {
                    tracing::debug!("Bucket {} already exists", self.bucket.name());
                    Ok(())
                } else {
                    tracing::error!("Error on verify bucket: {}", e);
                    Err(e.into())
                }
            }
        }
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::File::open(local_path).await?;
        self.bucket.put_object_stream(&mut file, remote_path).await?;

        tracing::debug!("Uploaded {} to bucket {}", remote_path, self.bucket.name());
        Ok(())
    }

    async fn presign(&self, remote_path: &str, ttl_secs: u32) -> Result<String, StorageError> {
        Ok(self.bucket.presign_get(remote_path, ttl_secs, None).await?)
    }
}
