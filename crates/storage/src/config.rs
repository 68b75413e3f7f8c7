use std::path::PathBuf;

/// Which object store backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files on local disk, served by the API under `/files`.
    Local { root: PathBuf, public_url: String },
    /// An S3-compatible bucket (AWS, Supabase Storage, MinIO, R2).
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: String,
        public_base_url: String,
    },
}

/// Storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default                      |
    /// |----------------------------|------------------------------|
    /// | `STORAGE_BACKEND`          | `local` (`local` or `s3`)    |
    /// | `LOCAL_STORAGE_DIR`        | `./storage`                  |
    /// | `LOCAL_STORAGE_PUBLIC_URL` | `{public_base_url}/files`    |
    /// | `S3_BUCKET`                | (required for `s3`)          |
    /// | `S3_ENDPOINT`              | (AWS default)                |
    /// | `S3_REGION`                | `us-east-1`                  |
    /// | `S3_PUBLIC_BASE_URL`       | (required for `s3`)          |
    ///
    /// `public_base_url` is the API's own public URL, used to derive the
    /// local file URL.
    pub fn from_env(public_base_url: &str) -> Self {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());

        let backend = match backend.trim().to_ascii_lowercase().as_str() {
            "local" => StorageBackend::Local {
                root: std::env::var("LOCAL_STORAGE_DIR")
                    .unwrap_or_else(|_| "./storage".into())
                    .into(),
                public_url: std::env::var("LOCAL_STORAGE_PUBLIC_URL").unwrap_or_else(|_| {
                    format!("{}/files", public_base_url.trim_end_matches('/'))
                }),
            },
            "s3" => StorageBackend::S3 {
                bucket: std::env::var("S3_BUCKET").expect("S3_BUCKET must be set for s3 storage"),
                endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                public_base_url: std::env::var("S3_PUBLIC_BASE_URL")
                    .expect("S3_PUBLIC_BASE_URL must be set for s3 storage"),
            },
            other => panic!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        Self { backend }
    }

    /// Local directory served under `/files`, if the backend is local.
    pub fn local_root(&self) -> Option<&PathBuf> {
        match &self.backend {
            StorageBackend::Local { root, .. } => Some(root),
            StorageBackend::S3 { .. } => None,
        }
    }
}
