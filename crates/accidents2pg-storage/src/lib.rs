// accidents2pg-storage - Object storage for raw CSV files
//
// Unified storage abstraction over OpenDAL:
// - S3 (Lambda)
// - Filesystem (local runs)
// - Memory (dry runs and tests)

use accidents2pg_config::{StorageBackend, StorageConfig};
use bytes::Bytes;
use opendal::Operator;
use tracing::{debug, info};

mod error;

pub use error::{Result, StorageError};

/// Keyed blob store holding one object per downloaded CSV.
///
/// Cheap to clone; clones share the underlying operator.
#[derive(Clone, Debug)]
pub struct ObjectStore {
    operator: Operator,
    prefix: Option<String>,
    bucket: String,
}

impl ObjectStore {
    /// Build the store described by `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        info!(
            backend = %config.backend,
            location = %config.location(),
            "Initializing object storage"
        );

        let store = match config.backend {
            StorageBackend::S3 => {
                let s3 = config.s3.as_ref().ok_or_else(|| {
                    StorageError::Config("s3 storage backend requires 's3' configuration".into())
                })?;
                Self::s3_from_parts(&s3.bucket, &s3.region, s3.endpoint.as_deref())?
            }
            StorageBackend::Fs => {
                let fs = config.fs.as_ref().ok_or_else(|| {
                    StorageError::Config("fs storage backend requires 'fs' configuration".into())
                })?;
                Self::fs_from_parts(&fs.path)?
            }
            StorageBackend::Memory => Self::memory_from_parts()?,
        };

        Ok(store.with_prefix(config.prefix.clone()))
    }

    /// Create storage for an S3 bucket. Credentials come from the ambient
    /// AWS environment (Lambda execution role locally or in the cloud).
    #[cfg(feature = "services-s3")]
    pub fn new_s3(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self> {
        let mut builder = opendal::services::S3::default()
            .bucket(bucket)
            .region(region);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .finish();
        Ok(Self::from_operator(operator, bucket))
    }

    /// Create storage rooted at a local directory
    #[cfg(feature = "services-fs")]
    pub fn new_fs(root: &str) -> Result<Self> {
        let builder = opendal::services::Fs::default().root(root);

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .finish();
        Ok(Self::from_operator(operator, root))
    }

    #[cfg(feature = "services-memory")]
    pub fn new_memory() -> Result<Self> {
        let operator = Operator::new(opendal::services::Memory::default())
            .map_err(|e| StorageError::Config(e.to_string()))?
            .finish();
        Ok(Self::from_operator(operator, "memory"))
    }

    /// Wrap an existing operator.
    pub fn from_operator(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            prefix: None,
            bucket: bucket.into(),
        }
    }

    /// Prepend `prefix` to every key passed to [`put`](Self::put) and
    /// [`get`](Self::get).
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Bucket name or root directory, used to compare against event buckets.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Inverse of [`object_path`](Self::object_path): the key for a full
    /// backend path, or `None` when the path lies outside the prefix.
    pub fn key_for_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => path.strip_prefix(prefix.as_str()).filter(|key| !key.is_empty()),
            None => Some(path),
        }
    }

    /// Key as stored in the backend, prefix included.
    pub fn object_path(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Store `body` under `key`, replacing any existing object.
    pub async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        let path = self.object_path(key);
        let size = body.len();
        self.operator
            .write(&path, body)
            .await
            .map_err(|e| StorageError::from_opendal(&path, e))?;
        debug!(key = %path, bytes = size, "Stored object");
        Ok(())
    }

    /// Read the whole object stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key);
        let buffer = self
            .operator
            .read(&path)
            .await
            .map_err(|e| StorageError::from_opendal(&path, e))?;
        let body = buffer.to_bytes();
        debug!(key = %path, bytes = body.len(), "Read object");
        Ok(body)
    }

    #[cfg(feature = "services-s3")]
    fn s3_from_parts(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self> {
        Self::new_s3(bucket, region, endpoint)
    }

    #[cfg(not(feature = "services-s3"))]
    fn s3_from_parts(_bucket: &str, _region: &str, _endpoint: Option<&str>) -> Result<Self> {
        Err(StorageError::Unsupported("s3".to_string()))
    }

    #[cfg(feature = "services-fs")]
    fn fs_from_parts(root: &str) -> Result<Self> {
        Self::new_fs(root)
    }

    #[cfg(not(feature = "services-fs"))]
    fn fs_from_parts(_root: &str) -> Result<Self> {
        Err(StorageError::Unsupported("fs".to_string()))
    }

    #[cfg(feature = "services-memory")]
    fn memory_from_parts() -> Result<Self> {
        Self::new_memory()
    }

    #[cfg(not(feature = "services-memory"))]
    fn memory_from_parts() -> Result<Self> {
        Err(StorageError::Unsupported("memory".to_string()))
    }
}
