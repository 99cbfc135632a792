use thiserror::Error;

/// Failures reading or writing the raw CSV objects.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Access denied for object {key}: {message}")]
    AccessDenied { key: String, message: String },

    #[error("Storage backend error for object {key}: {message}")]
    Backend { key: String, message: String },

    /// The operator could not be built from configuration.
    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage backend '{0}' is not compiled into this build")]
    Unsupported(String),
}

impl StorageError {
    pub(crate) fn from_opendal(key: &str, err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound {
                key: key.to_string(),
            },
            opendal::ErrorKind::PermissionDenied => StorageError::AccessDenied {
                key: key.to_string(),
                message: err.to_string(),
            },
            _ => StorageError::Backend {
                key: key.to_string(),
                message: err.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
