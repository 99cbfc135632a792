#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use accidents2pg_config::{BatchMode, FetchConfig};
use accidents2pg_fetch::Fetcher;
use accidents2pg_handlers::{FetchContext, LoadContext, S3Event};
use accidents2pg_persist::MemorySink;
use accidents2pg_storage::ObjectStore;
use serde_json::json;

pub const TABLE: &str = "traffic_accidents";
pub const BUCKET: &str = "memory";

pub fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

pub fn fetch_context(store: ObjectStore) -> FetchContext {
    let fetcher = Fetcher::new(&FetchConfig {
        timeout_secs: 5,
        max_bytes: 1024 * 1024,
    })
    .unwrap();
    FetchContext { fetcher, store }
}

pub fn load_context(batch_mode: BatchMode) -> (LoadContext, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let ctx = LoadContext {
        store: ObjectStore::new_memory().unwrap(),
        sink: sink.clone(),
        table: TABLE.to_string(),
        batch_mode,
    };
    (ctx, sink)
}

/// S3 notification with one record per `(event_source, key)` pair, keys
/// given exactly as S3 would encode them.
pub fn s3_event(records: &[(&str, &str)]) -> S3Event {
    let records: Vec<_> = records
        .iter()
        .map(|(source, key)| {
            json!({
                "eventVersion": "2.1",
                "eventSource": source,
                "awsRegion": "sa-east-1",
                "eventTime": "2023-01-05T12:00:00.000Z",
                "eventName": "ObjectCreated:Put",
                "userIdentity": { "principalId": "AWS:AIDAEXAMPLE" },
                "requestParameters": { "sourceIPAddress": "127.0.0.1" },
                "responseElements": {
                    "x-amz-request-id": "C3D13FE58DE4C810",
                    "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
                },
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "configurationId": "csv-uploaded",
                    "bucket": {
                        "name": BUCKET,
                        "ownerIdentity": { "principalId": "A3NL1KOZZKExample" },
                        "arn": "arn:aws:s3:::memory"
                    },
                    "object": {
                        "key": key,
                        "size": 1024,
                        "eTag": "d41d8cd98f00b204e9800998ecf8427e",
                        "sequencer": "0055AED6DCD90281E5"
                    }
                }
            })
        })
        .collect();

    serde_json::from_value(json!({ "Records": records })).unwrap()
}
