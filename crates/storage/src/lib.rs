//! Object storage for uploaded photos and generated renditions.
//!
//! Keys are `/`-separated relative paths (see `roastme_core::naming`). Every
//! stored object has a public URL that browsers can fetch directly.

pub mod config;
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{StorageBackend, StorageConfig};
pub use local::LocalStore;
pub use s3::S3Store;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),
}

/// A bucket-like store addressed by key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object. Returns the
    /// public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public URL for `key`, whether or not it exists yet.
    fn public_url(&self, key: &str) -> String;
}

/// Reject keys that could escape the store root or address nothing.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Build the configured store.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let store: Arc<dyn ObjectStore> = match &config.backend {
        StorageBackend::Local { root, public_url } => {
            Arc::new(LocalStore::new(root.clone(), public_url.clone()).await?)
        }
        StorageBackend::S3 {
            bucket,
            endpoint,
            region,
            public_base_url,
        } => Arc::new(
            S3Store::connect(
                bucket.clone(),
                endpoint.clone(),
                region.clone(),
                public_base_url.clone(),
            )
            .await,
        ),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn keys_must_be_relative_and_clean() {
        assert!(validate_key("characters/1/og.png").is_ok());
        for bad in ["", "/etc/passwd", "a/../b", "a//b", "./a", "a\\b", "a/"] {
            assert_matches!(validate_key(bad), Err(StorageError::InvalidKey(_)), "{bad}");
        }
    }
}
