//! Stage processors. Each call is one invocation; failures come back as a
//! classified [`PipelineError`] for the caller to turn into a response.

use std::sync::Arc;

use accidents2pg_config::BatchMode;
use accidents2pg_core::{reshape_bytes, ReshapeStats};
use accidents2pg_fetch::{object_key_for_url, Fetcher};
use accidents2pg_persist::RecordSink;
use accidents2pg_storage::ObjectStore;
use aws_lambda_events::event::s3::S3Event;
use tracing::{info, instrument, warn};

use crate::error::PipelineError;
use crate::event::object_refs;

/// Long-lived clients for the fetch stage
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub fetcher: Fetcher,
    pub store: ObjectStore,
}

/// Long-lived clients for the load stage
#[derive(Clone)]
pub struct LoadContext {
    pub store: ObjectStore,
    pub sink: Arc<dyn RecordSink>,
    pub table: String,
    pub batch_mode: BatchMode,
}

/// Result of storing one downloaded CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub key: String,
    pub bytes: usize,
}

/// Result of loading one stored CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub key: String,
    pub stats: ReshapeStats,
    pub records_saved: u64,
}

/// Result of handling one storage notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub objects: Vec<LoadOutcome>,
    /// Storage records left unprocessed because of [`BatchMode::First`].
    pub skipped: usize,
}

impl LoadSummary {
    pub fn records_saved(&self) -> u64 {
        self.objects.iter().map(|o| o.records_saved).sum()
    }
}

/// Download `csv_url` and store it under its last path segment.
#[instrument(skip(ctx), fields(key = tracing::field::Empty))]
pub async fn process_fetch_request(
    csv_url: &str,
    ctx: &FetchContext,
) -> Result<FetchOutcome, PipelineError> {
    // Key first: a URL without a file name is rejected before any download.
    let key = object_key_for_url(csv_url)?;
    tracing::Span::current().record("key", key.as_str());

    let body = ctx.fetcher.fetch(csv_url).await?;
    let bytes = body.len();

    info!(bucket = %ctx.store.bucket(), key = %key, bytes, "Attempting to upload file");
    ctx.store.put(&key, body).await?;
    info!(bucket = %ctx.store.bucket(), key = %key, "Successfully uploaded file");

    Ok(FetchOutcome { key, bytes })
}

/// Read the object at `key`, reshape it, and append the records.
///
/// Any transform failure happens before the sink is touched, so a bad file
/// never leaves partial rows behind.
#[instrument(skip(ctx))]
pub async fn process_object(key: &str, ctx: &LoadContext) -> Result<LoadOutcome, PipelineError> {
    let body = ctx.store.get(key).await?;
    let output = reshape_bytes(&body)?;

    info!(
        key,
        rows_read = output.stats.rows_read,
        rows_dropped = output.stats.rows_dropped,
        records = output.stats.records_emitted,
        "Reshaped CSV"
    );

    let records_saved = if output.records.is_empty() {
        0
    } else {
        ctx.sink.append(&ctx.table, &output.records).await?
    };

    Ok(LoadOutcome {
        key: key.to_string(),
        stats: output.stats,
        records_saved,
    })
}

/// Handle a storage notification according to `ctx.batch_mode`.
///
/// Objects are always read from the configured store; a bucket named by the
/// event that differs from it is only logged. Event keys are full backend
/// paths, so the store's prefix is stripped before reading and keys outside
/// it are skipped.
pub async fn process_s3_event(
    event: &S3Event,
    ctx: &LoadContext,
) -> Result<LoadSummary, PipelineError> {
    let refs = object_refs(event)?;
    let mut summary = LoadSummary::default();

    for (idx, object) in refs.iter().enumerate() {
        if let Some(bucket) = object.bucket.as_deref() {
            if bucket != ctx.store.bucket() {
                warn!(
                    event_bucket = bucket,
                    configured_bucket = ctx.store.bucket(),
                    key = %object.key,
                    "Event names a different bucket; reading from the configured one"
                );
            }
        }

        let Some(key) = ctx.store.key_for_path(&object.key) else {
            warn!(
                key = %object.key,
                prefix = ctx.store.prefix().unwrap_or_default(),
                "Object is outside the configured prefix; skipping"
            );
            summary.skipped += 1;
            continue;
        };

        summary.objects.push(process_object(key, ctx).await?);

        if ctx.batch_mode == BatchMode::First {
            summary.skipped += refs.len() - idx - 1;
            if summary.skipped > 0 {
                warn!(
                    skipped = summary.skipped,
                    "Ignoring remaining storage records (loader.batch_mode = first)"
                );
            }
            break;
        }
    }

    Ok(summary)
}
