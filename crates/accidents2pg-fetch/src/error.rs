use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The caller supplied something that is not an absolute http(s) URL,
    /// or a URL with no file name to store it under.
    #[error("Invalid CSV URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to download CSV from {url}: {message}")]
    Request { url: String, message: String },

    #[error("Timed out after {secs}s downloading CSV from {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Failed to download CSV. Status code: {status}")]
    Status { url: String, status: u16 },

    #[error("CSV at {url} exceeds the {limit} byte download limit")]
    TooLarge { url: String, limit: u64 },
}

impl DownloadError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the failure is the caller's fault rather than the remote
    /// server's or ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DownloadError::InvalidUrl { .. })
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
