//! S3-compatible object store (AWS S3, Supabase Storage S3 endpoint, MinIO).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use crate::{validate_key, ObjectStore, StorageError};

/// Objects in a single bucket, served from `public_base_url`.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Store {
    /// Build a client from the default AWS credential chain.
    ///
    /// A custom `endpoint` switches to path-style addressing, which
    /// S3-compatible services expect.
    pub async fn connect(
        bucket: String,
        endpoint: Option<String>,
        region: String,
        public_base_url: String,
    ) -> Self {
        let shared = aws_config::from_env()
            .region(aws_config::Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        tracing::info!(%bucket, endpoint = ?endpoint, "S3 object store configured");
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("put {key}: {e}")))?;
        tracing::debug!(key, size, "Stored object in S3");
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::S3(format!("get {key}: {e}"))
                }
            })?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("read {key}: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("delete {key}: {e}")))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}
