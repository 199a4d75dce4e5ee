//! HTTP handlers for SNS

use axum::{extract::State, http::StatusCode, response::Response};
use awslocal_core::{parse_batch, EmulatorError, ErrorCode, MalformedBatchError};
use awslocal_lambda::handlers::{envelope_response, error_response, json_response};
use awslocal_lambda::Invoker;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::delivery::{build_topic_delivery, TopicMessage, TopicSettings};

/// Shared state for the SNS endpoint
#[derive(Debug, Clone)]
pub struct SnsState {
    pub invoker: Arc<Invoker>,
    pub topic: TopicSettings,
}

impl SnsState {
    pub fn new(invoker: Arc<Invoker>, topic: TopicSettings) -> Self {
        Self { invoker, topic }
    }
}

/// Body shape advertised when a batch is rejected
pub fn usage_example() -> Value {
    json!([{
        "message": { "hello": "world" },
        "subject": "optional subject",
        "messageAttributes": { "kind": { "Type": "String", "Value": "greeting" } }
    }])
}

/// POST /sns-invoke
/// Deliver a batch of messages to the handler as one topic notification event
pub async fn invoke_topic(State(state): State<Arc<SnsState>>, body: Bytes) -> Response {
    let messages = match parse_batch::<TopicMessage>(&body) {
        Ok(messages) => messages,
        Err(e) => return malformed(&e),
    };
    let event = build_topic_delivery(messages, &state.topic);
    info!(records = event.records.len(), topic = %state.topic.topic_name, "SNS delivery");

    let event = match serde_json::to_value(&event) {
        Ok(event) => event,
        Err(e) => return error_response(&EmulatorError::new(ErrorCode::Serialization, e.to_string())),
    };
    match state.invoker.invoke(event).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => envelope_response(&e.to_envelope()),
    }
}

fn malformed(error: &MalformedBatchError) -> Response {
    warn!(error = %error, "Rejected SNS batch");
    error_response(
        &EmulatorError::new(ErrorCode::MalformedBatch, error.to_string()).with_detail("usage", usage_example()),
    )
}
