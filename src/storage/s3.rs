//! S3-backed object store.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
    Client,
};
use std::path::Path;
use tracing::{debug, info};

use super::{object_key, ObjectStore, StorageError};

/// Connection settings for an S3 bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// S3-compatible endpoint (MinIO, LocalStack); `None` for AWS
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Store {
    pub fn new(settings: S3Settings) -> Result<Self, StorageError> {
        if settings.bucket.trim().is_empty() {
            return Err(StorageError::NotConfigured("bucket name is empty".to_string()));
        }

        let mut builder = aws_sdk_s3::Config::builder().region(Region::new(settings.region.clone()));

        match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                builder = builder.credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "research-harvest",
                ));
            }
            _ => {
                return Err(StorageError::NotConfigured(
                    "AWS access key and secret key are required".to_string(),
                ))
            }
        }

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        info!("Storage client initialized for bucket: {}", settings.bucket);

        Ok(Self {
            client,
            bucket: settings.bucket,
            region: settings.region,
            endpoint: settings.endpoint,
        })
    }

    /// Public location of an object
    fn location(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, key),
        }
    }

    /// Delete one listing page in a single request
    async fn delete_keys(&self, keys: Vec<String>) -> Result<usize, StorageError> {
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Backend(format!("Invalid object identifier: {}", e)))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| StorageError::Backend(format!("Invalid delete request: {}", e)))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to delete objects: {}", e)))?;

        for error in response.errors() {
            debug!(
                "Failed to delete {}: {}",
                error.key().unwrap_or_default(),
                error.message().unwrap_or_default()
            );
        }

        Ok(response.deleted().len())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, path: &Path) -> Result<String, StorageError> {
        let key = object_key(path)?;
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read {}: {}", path.display(), e)))?;

        debug!("Uploading {} to s3://{}/{}", path.display(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to upload to S3: {}", e)))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, key);
        Ok(self.location(&key))
    }

    async fn clear_bucket(&self) -> Result<usize, StorageError> {
        let mut deleted = 0;
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation_token.as_ref() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("Failed to list S3 objects: {}", e)))?;

            let keys: Vec<String> = response
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string))
                .collect();

            if !keys.is_empty() {
                deleted += self.delete_keys(keys).await?;
                debug!("Deleted {} objects so far from s3://{}", deleted, self.bucket);
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        info!("Cleared {} objects from s3://{}", deleted, self.bucket);
        Ok(deleted)
    }
}
