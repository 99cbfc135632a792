// AWS Lambda runtime adapter
//
// Two functions share this crate: `fetcher` (HTTP request -> S3 object) and
// `loader` (S3 notification -> Postgres rows). Configuration and clients are
// built once per cold start; every invocation ends in a {statusCode, body}
// response, never a runtime error.

use std::sync::Arc;

use accidents2pg_config::{RuntimeConfig, Stage};
use accidents2pg_handlers::{
    build_fetch_context, build_load_context, init_tracing, process_fetch_request,
    process_s3_event, FetchContext, FetchInvocation, LoadContext, S3Event,
};
use aws_lambda_events::apigw::ApiGatewayProxyResponse;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::info;

mod response;

use response::{build_response, error_response};

/// Handle one fetch invocation
pub async fn handle_fetch(event: FetchInvocation, ctx: &FetchContext) -> ApiGatewayProxyResponse {
    let csv_url = match event.csv_url() {
        Ok(url) => url,
        Err(err) => return error_response("fetch", &err),
    };

    match process_fetch_request(&csv_url, ctx).await {
        // Success body stays empty; callers only look at the status.
        Ok(outcome) => {
            info!(key = %outcome.key, bytes = outcome.bytes, "Fetch complete");
            build_response(200, None)
        }
        Err(err) => error_response("fetch", &err),
    }
}

/// Handle one storage notification
pub async fn handle_load(event: S3Event, ctx: &LoadContext) -> ApiGatewayProxyResponse {
    match process_s3_event(&event, ctx).await {
        Ok(summary) => {
            let saved = summary.records_saved();
            info!(
                objects = summary.objects.len(),
                skipped = summary.skipped,
                records = saved,
                "Load complete"
            );
            build_response(
                200,
                Some(format!(
                    "Successfully processed and saved {} records to the database.",
                    saved
                )),
            )
        }
        Err(err) => error_response("load", &err),
    }
}

fn load_config(stage: Stage) -> Result<RuntimeConfig, Error> {
    RuntimeConfig::load(stage)
        .map_err(|e| Error::from(format!("Failed to load configuration: {:#}", e)))
}

/// Lambda runtime entry point for the fetch stage
pub async fn run_fetcher() -> Result<(), Error> {
    let config = load_config(Stage::Fetch)?;
    init_tracing(&config.log);

    let ctx = Arc::new(
        build_fetch_context(&config).map_err(|e| Error::from(format!("{:#}", e)))?,
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<FetchInvocation>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Error>(handle_fetch(event.payload, &ctx).await) }
    }))
    .await
}

/// Lambda runtime entry point for the load stage
pub async fn run_loader() -> Result<(), Error> {
    let config = load_config(Stage::Load)?;
    init_tracing(&config.log);

    let ctx = Arc::new(build_load_context(&config).map_err(|e| Error::from(format!("{:#}", e)))?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<S3Event>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Error>(handle_load(event.payload, &ctx).await) }
    }))
    .await
}
