//! Lambda HTTP handlers
//!
//! Implements `POST /lambda-invoke` and the shared response helpers used by the
//! other invoke endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use awslocal_core::{EmulatorError, ErrorEnvelope};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::invocation::{Invoker, RawEvent};

/// Shared state for Lambda handlers
#[derive(Debug, Clone)]
pub struct LambdaState {
    pub invoker: Arc<Invoker>,
}

impl LambdaState {
    pub fn new(invoker: Arc<Invoker>) -> Self {
        Self { invoker }
    }
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: &Value) -> Response {
    let mut response = (status, Body::from(body.to_string())).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// 500 carrying the handler's error envelope
pub fn envelope_response(envelope: &ErrorEnvelope) -> Response {
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Body::from(envelope.to_json())).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("X-Amz-Function-Error", HeaderValue::from_static("Unhandled"));
    response
}

/// Response for an emulator-level failure
pub fn error_response(error: &EmulatorError) -> Response {
    let status = StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Body::from(error.to_json())).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("x-amzn-ErrorType", HeaderValue::from_static(error.code.as_str()));
    response
}

/// Request body as a harness event; an empty body is a `null` event
pub fn raw_event(body: &Bytes) -> RawEvent {
    if body.iter().all(u8::is_ascii_whitespace) {
        RawEvent::Json(Value::Null)
    } else {
        RawEvent::Text(String::from_utf8_lossy(body).into_owned())
    }
}

/// POST /lambda-invoke
/// Invoke the loaded handler directly with the request body as event
pub async fn invoke_function(State(state): State<Arc<LambdaState>>, body: Bytes) -> Response {
    debug!(payload_size = %body.len(), "Direct invoke");

    match state.invoker.invoke(raw_event(&body)).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => envelope_response(&e.to_envelope()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionConfig;
    use crate::handler::{handler_fn, HandlerError};
    use axum::{routing::post, Router};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        let handler = Arc::new(handler_fn(|event: Value, _ctx| async move {
            if event.get("fail").is_some() {
                return Err(HandlerError::new("Error", "asked to fail"));
            }
            Ok(json!({ "received": event }))
        }));
        let invoker = Arc::new(Invoker::new(handler, FunctionConfig::default()));
        Router::new()
            .route("/lambda-invoke", post(invoke_function))
            .with_state(Arc::new(LambdaState::new(invoker)))
    }

    async fn call(body: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(
                axum::http::Request::post("/lambda-invoke")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let (status, body) = call(r#"{"name":"x"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "received": { "name": "x" } }));
    }

    #[tokio::test]
    async fn test_invoke_empty_body_is_null_event() {
        let (status, body) = call("").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "received": null }));
    }

    #[tokio::test]
    async fn test_invoke_handler_error() {
        let (status, body) = call(r#"{"fail":true}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorType"], "Error");
        assert_eq!(body["errorMessage"], "asked to fail");
        assert!(body["stackTrace"].is_array());
    }

    #[tokio::test]
    async fn test_invoke_bad_json() {
        let (status, body) = call("{oops").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorType"], "SerializationError");
    }
}
