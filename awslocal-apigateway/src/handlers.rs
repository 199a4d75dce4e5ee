//! API Gateway HTTP handlers

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use awslocal_core::EmulatorError;
use awslocal_lambda::handlers::{envelope_response, error_response, json_response};
use awslocal_lambda::Invoker;
use base64::Engine;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::builder::{GatewayError, GatewayEventBuilder, HttpRequestView};
use crate::event::{header_text, ApiGatewayResponse};

/// Shared state for API Gateway handlers
#[derive(Debug, Clone)]
pub struct ApiGatewayState {
    pub builder: GatewayEventBuilder,
    pub invoker: Arc<Invoker>,
}

impl ApiGatewayState {
    pub fn new(builder: GatewayEventBuilder, invoker: Arc<Invoker>) -> Self {
        Self { builder, invoker }
    }
}

/// ANY /apigateway-invoke/{*path}
/// Route the request, invoke the handler with the proxy event and relay its response
pub async fn invoke_gateway(
    State(state): State<Arc<ApiGatewayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw_body = (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned());
    let request = HttpRequestView {
        method: &method,
        uri: &uri,
        headers: &headers,
    };

    let event = match state.builder.build(raw_body, request).await {
        Ok(event) => event,
        Err(e) => return gateway_error(&e),
    };
    debug!(resource = %event.resource, path = %event.path, "Built proxy event");

    let event = match serde_json::to_value(&event) {
        Ok(value) => value,
        Err(e) => return gateway_error(&GatewayError::Serialization(e.to_string())),
    };

    match state.invoker.invoke(event).await {
        Ok(result) => proxy_response(result),
        Err(e) => envelope_response(&e.to_envelope()),
    }
}

fn message_response(status: StatusCode, error_type: &'static str, message: &str) -> Response {
    let mut response = json_response(status, &json!({ "message": message }));
    response
        .headers_mut()
        .insert("x-amzn-ErrorType", HeaderValue::from_static(error_type));
    response
}

/// Client-visible response for a request that never reached the handler
pub fn gateway_error(error: &GatewayError) -> Response {
    warn!(error = %error, "API Gateway request rejected");
    match error {
        GatewayError::RouteNotFound { .. } => message_response(
            StatusCode::FORBIDDEN,
            "MissingAuthenticationTokenException",
            "Missing Authentication Token",
        ),
        GatewayError::Unauthorized(_) => message_response(
            StatusCode::FORBIDDEN,
            "AccessDeniedException",
            "User is not authorized to access this resource",
        ),
        other => error_response(&EmulatorError::new(other.code(), other.to_string())),
    }
}

fn bad_gateway(reason: &str) -> Response {
    warn!(reason = %reason, "Handler returned an invalid proxy response");
    json_response(StatusCode::BAD_GATEWAY, &json!({ "message": "Internal server error" }))
}

/// Translate the handler's proxy result into the HTTP response
pub fn proxy_response(result: Value) -> Response {
    let proxy: ApiGatewayResponse = match serde_json::from_value(result) {
        Ok(proxy) => proxy,
        Err(e) => return bad_gateway(&e.to_string()),
    };
    let Ok(status) = StatusCode::from_u16(proxy.status_code) else {
        return bad_gateway(&format!("invalid status code {}", proxy.status_code));
    };

    let body = match proxy.body {
        None => Vec::new(),
        Some(body) if proxy.is_base64_encoded => {
            match base64::engine::general_purpose::STANDARD.decode(body.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => return bad_gateway(&format!("invalid base64 body: {e}")),
            }
        }
        Some(body) => body.into_bytes(),
    };

    let mut response = (status, Body::from(body)).into_response();
    let headers = response.headers_mut();

    let single = proxy
        .headers
        .iter()
        .filter_map(|(name, value)| header_text(value).map(|text| (name, text)));
    for (name, text) in single {
        if let Some((name, value)) = header_pair(name, &text) {
            headers.insert(name, value);
        }
    }
    for (name, values) in &proxy.multi_value_headers {
        for text in values.iter().filter_map(header_text) {
            if let Some((name, value)) = header_pair(name, &text) {
                headers.append(name, value);
            }
        }
    }

    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    response
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!(header = %name, "Dropping invalid response header");
            None
        }
    }
}
