// Response builders for Lambda
//
// Both stages answer with the API Gateway proxy shape: {statusCode, body}.
// Bodies are plain text.

use accidents2pg_handlers::PipelineError;
use aws_lambda_events::{
    apigw::ApiGatewayProxyResponse,
    encodings::Body,
    http::{header::CONTENT_TYPE, HeaderValue},
};
use tracing::error;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Response with an optional plain-text body
pub(crate) fn build_response(status_code: u16, body: Option<String>) -> ApiGatewayProxyResponse {
    let mut response = ApiGatewayProxyResponse {
        status_code: status_code as i64,
        headers: Default::default(),
        multi_value_headers: Default::default(),
        body: body.map(Body::Text),
        is_base64_encoded: false,
    };
    if response.body.is_some() {
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    }
    response
}

/// Log `err` and convert it to its status code and message
pub(crate) fn error_response(stage: &'static str, err: &PipelineError) -> ApiGatewayProxyResponse {
    error!(
        stage,
        error_type = err.error_type(),
        status = err.status_code(),
        "{}",
        err.message()
    );
    build_response(err.status_code(), Some(err.message()))
}
