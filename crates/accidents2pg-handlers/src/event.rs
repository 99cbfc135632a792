//! Object references extracted from storage notifications.

use aws_lambda_events::event::s3::S3Event;
use percent_encoding::percent_decode_str;

use crate::error::PipelineError;

/// `eventSource` of records emitted by S3.
pub const S3_EVENT_SOURCE: &str = "aws:s3";

/// One object named by a storage notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Bucket named by the event, if any.
    pub bucket: Option<String>,
    /// Decoded object key.
    pub key: String,
}

/// Objects named by the S3 records of `event`, in record order.
///
/// Records from other sources are skipped. A storage record with no key, or
/// an event with no storage records at all, is a missing field.
pub fn object_refs(event: &S3Event) -> Result<Vec<ObjectRef>, PipelineError> {
    let mut refs = Vec::new();

    for record in &event.records {
        if record.event_source.as_deref() != Some(S3_EVENT_SOURCE) {
            continue;
        }

        let raw_key = record
            .s3
            .object
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::missing_field("key", "s3.object record"))?;

        refs.push(ObjectRef {
            bucket: record.s3.bucket.name.clone(),
            key: decode_object_key(raw_key)?,
        });
    }

    if refs.is_empty() {
        return Err(PipelineError::missing_field("s3", "event records"));
    }

    Ok(refs)
}

/// S3 notifications form-encode keys: spaces arrive as `+`, everything else
/// unsafe as `%XX`.
pub fn decode_object_key(raw: &str) -> Result<String, PipelineError> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| {
            PipelineError::invalid_request(format!("object key {:?} is not UTF-8: {}", raw, e))
        })
}
