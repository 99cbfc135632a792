// Fetch stage: request -> download -> object store

mod common;

use accidents2pg_handlers::{process_fetch_request, FetchInvocation, PipelineError};
use accidents2pg_storage::ObjectStore;
use common::{fetch_context, fixture};
use httpmock::prelude::*;

#[tokio::test]
async fn test_request_downloads_and_stores_under_file_name() {
    let csv = fixture("acidentes_sample.csv");
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/dados/acidentes2023.csv");
            then.status(200).body(csv.clone());
        })
        .await;

    let ctx = fetch_context(ObjectStore::new_memory().unwrap());
    let body = format!(
        r#"{{"csv_url": "{}"}}"#,
        server.url("/dados/acidentes2023.csv?download=1")
    );
    let csv_url = FetchInvocation::from_json_body(body).csv_url().unwrap();

    let outcome = process_fetch_request(&csv_url, &ctx).await.unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.key, "acidentes2023.csv");
    assert_eq!(outcome.bytes, csv.len());
    assert_eq!(&ctx.store.get("acidentes2023.csv").await.unwrap()[..], &csv[..]);
}

#[tokio::test]
async fn test_url_without_file_name_is_rejected_before_download() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).body("x");
        })
        .await;

    let ctx = fetch_context(ObjectStore::new_memory().unwrap());
    let err = process_fetch_request(&server.url("/dados/"), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest { .. }));
    assert_eq!(err.status_code(), 400);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_failed_download_stores_nothing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/acidentes.csv");
            then.status(500);
        })
        .await;

    let ctx = fetch_context(ObjectStore::new_memory().unwrap());
    let err = process_fetch_request(&server.url("/acidentes.csv"), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Download { .. }));
    assert_eq!(err.status_code(), 500);
    assert!(err.message().contains("500"));
    assert!(ctx.store.get("acidentes.csv").await.is_err());
}
