// accidents2pg-fetch - Download CSV files over HTTP
//
// One GET per invocation, bounded by a timeout and a size cap. No retries.

use accidents2pg_config::FetchConfig;
use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

mod error;
mod key;

pub use error::{DownloadError, Result};
pub use key::{object_key_for_url, parse_csv_url};

/// HTTP client for source CSV files.
///
/// Created once per process; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_bytes: config.max_bytes,
        })
    }

    /// Download the whole body at `url`. Any non-2xx status is an error.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let parsed = parse_csv_url(url)?;
        info!(url = %parsed, "Attempting to download CSV");

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.request_error(url, e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), status = status.as_u16(), "Downloaded CSV");
        Ok(body.freeze())
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> DownloadError {
        if err.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            DownloadError::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn too_large(&self, url: &str) -> DownloadError {
        DownloadError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}
