//! Object key derivation from the source URL.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{DownloadError, Result};

/// Parse `raw` as an absolute http(s) URL.
pub fn parse_csv_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| DownloadError::invalid_url(raw, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DownloadError::invalid_url(
            raw,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

/// Storage key for a downloaded CSV: the last path segment of its URL,
/// percent-decoded. Query string and fragment are not part of the key.
///
/// `https://host/dados/acidentes2023.csv?v=2` → `acidentes2023.csv`
pub fn object_key_for_url(raw: &str) -> Result<String> {
    let url = parse_csv_url(raw)?;

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let key = percent_decode_str(segment)
        .decode_utf8()
        .map_err(|e| DownloadError::invalid_url(raw, format!("file name is not UTF-8: {}", e)))?;

    if key.is_empty() {
        return Err(DownloadError::invalid_url(
            raw,
            "URL path has no file name to use as the object key",
        ));
    }

    Ok(key.into_owned())
}
