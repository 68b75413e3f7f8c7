//! Local-disk object store for development and single-node deployments.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{validate_key, ObjectStore, StorageError};

/// Stores objects as files under `root`.
pub struct LocalStore {
    root: PathBuf,
    public_url: String,
}

impl LocalStore {
    /// Create the store, creating `root` if needed.
    pub async fn new(root: PathBuf, public_url: String) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never observe a partial file.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(key, size = bytes.len(), "Stored object on local disk");
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_url)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("objects"), "http://localhost:3000/files/".into())
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_and_returns_url() {
        let (_dir, store) = store().await;
        let url = store
            .put("characters/1/attempt-1/full.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/files/characters/1/attempt-1/full.png");
        assert_eq!(
            store.get("characters/1/attempt-1/full.png").await.unwrap(),
            b"png"
        );
        assert!(store.root().join("characters/1/attempt-1/full.png").is_file());
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let (_dir, store) = store().await;
        store.put("a/b.txt", b"one".to_vec(), "text/plain").await.unwrap();
        store.put("a/b.txt", b"two".to_vec(), "text/plain").await.unwrap();
        assert_eq!(store.get("a/b.txt").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_objects_are_not_found_and_delete_is_idempotent() {
        let (_dir, store) = store().await;
        assert_matches!(store.get("nope.png").await, Err(StorageError::NotFound(_)));
        store.delete("nope.png").await.unwrap();

        store.put("x.png", vec![1], "image/png").await.unwrap();
        store.delete("x.png").await.unwrap();
        assert_matches!(store.get("x.png").await, Err(StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store().await;
        assert_matches!(
            store.put("../escape.txt", vec![], "text/plain").await,
            Err(StorageError::InvalidKey(_))
        );
    }
}
