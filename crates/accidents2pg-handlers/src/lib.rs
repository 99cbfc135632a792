//! Shared stage processing and error handling for the accident pipeline
//!
//! This crate provides the error taxonomy, request/event parsing and the two
//! stage processors used by the Lambda binaries and the local CLI.

pub mod error;
pub mod event;
pub mod init;
pub mod processor;
pub mod request;

pub use error::PipelineError;
pub use event::{decode_object_key, object_refs, ObjectRef, S3_EVENT_SOURCE};
pub use init::{build_fetch_context, build_load_context, build_load_context_with_sink, init_tracing};
pub use processor::{
    process_fetch_request, process_object, process_s3_event, FetchContext, FetchOutcome,
    LoadContext, LoadOutcome, LoadSummary,
};
pub use request::{FetchInvocation, CSV_URL_FIELD};

/// Re-exported so callers can name the notification type without depending
/// on `aws_lambda_events` directly.
pub use aws_lambda_events::event::s3::S3Event;
