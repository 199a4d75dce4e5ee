//! HTTP router for the invoke endpoints

use awslocal_apigateway::handlers::invoke_gateway;
use awslocal_apigateway::{ApiGatewayState, GatewayEventBuilder};
use awslocal_core::{EmulatorError, ErrorCode};
use awslocal_lambda::handlers::{error_response, invoke_function, json_response};
use awslocal_lambda::{Invoker, LambdaState};
use awslocal_sns::delivery::TopicSettings;
use awslocal_sns::handlers::invoke_topic;
use awslocal_sns::SnsState;
use awslocal_sqs::delivery::QueueSettings;
use awslocal_sqs::handlers::invoke_queue;
use awslocal_sqs::SqsState;
use axum::{
    http::{Method, StatusCode, Uri},
    response::Response,
    routing::{any, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Method and path of every invoke endpoint
pub const INVOKE_ENDPOINTS: [(&str, &str); 4] = [
    ("POST", "lambda-invoke"),
    ("ANY", "apigateway-invoke"),
    ("POST", "sns-invoke"),
    ("POST", "sqs-invoke"),
];

/// Service state for the main router
#[derive(Debug, Clone)]
pub struct AppState {
    pub lambda: Arc<LambdaState>,
    pub apigateway: Arc<ApiGatewayState>,
    pub sns: Arc<SnsState>,
    pub sqs: Arc<SqsState>,
}

impl AppState {
    /// All endpoints share one invoker; topic and queue live in the function's region
    pub fn new(invoker: Arc<Invoker>, builder: GatewayEventBuilder) -> Self {
        let account = invoker.config().account.clone();
        Self {
            lambda: Arc::new(LambdaState::new(invoker.clone())),
            apigateway: Arc::new(ApiGatewayState::new(builder, invoker.clone())),
            sns: Arc::new(SnsState::new(
                invoker.clone(),
                TopicSettings {
                    account: account.clone(),
                    ..TopicSettings::default()
                },
            )),
            sqs: Arc::new(SqsState::new(
                invoker,
                QueueSettings {
                    account,
                    ..QueueSettings::default()
                },
            )),
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/lambda-invoke",
            post(invoke_function).fallback(invalid_invoke).with_state(state.lambda),
        )
        .route(
            "/apigateway-invoke",
            any(invoke_gateway).with_state(state.apigateway.clone()),
        )
        .route(
            "/apigateway-invoke/",
            any(invoke_gateway).with_state(state.apigateway.clone()),
        )
        .route(
            "/apigateway-invoke/*path",
            any(invoke_gateway).with_state(state.apigateway),
        )
        .route(
            "/sns-invoke",
            post(invoke_topic).fallback(invalid_invoke).with_state(state.sns),
        )
        .route(
            "/sqs-invoke",
            post(invoke_queue).fallback(invalid_invoke).with_state(state.sqs),
        )
        .fallback(invalid_invoke)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Response {
    json_response(StatusCode::OK, &json!({ "status": "running" }))
}

fn invoke_list() -> Value {
    INVOKE_ENDPOINTS
        .iter()
        .map(|(method, path)| json!({ "path": path, "method": method }))
        .collect()
}

/// 400 listing the valid invoke paths
async fn invalid_invoke(method: Method, uri: Uri) -> Response {
    debug!(method = %method, path = %uri.path(), "Invalid invoke path");
    error_response(
        &EmulatorError::new(ErrorCode::InvalidInvoke, "Invalid invoke")
            .with_detail("message", "Choose an invoke enabled path")
            .with_detail("invoke", invoke_list()),
    )
}
