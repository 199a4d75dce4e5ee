//! HTTP handlers for SQS

use axum::{extract::State, http::StatusCode, response::Response};
use awslocal_core::{parse_batch, EmulatorError, ErrorCode, MalformedBatchError};
use awslocal_lambda::handlers::{envelope_response, error_response, json_response};
use awslocal_lambda::Invoker;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::delivery::{build_queue_delivery, QueueMessage, QueueSettings};

/// Shared state for the SQS endpoint
#[derive(Debug, Clone)]
pub struct SqsState {
    pub invoker: Arc<Invoker>,
    pub queue: QueueSettings,
}

impl SqsState {
    pub fn new(invoker: Arc<Invoker>, queue: QueueSettings) -> Self {
        Self { invoker, queue }
    }
}

/// Body shape advertised when a batch is rejected
pub fn usage_example() -> Value {
    json!([{
        "message": { "hello": "world" },
        "messageGroupId": "optional, makes the batch FIFO",
        "messageDeduplicationId": "optional",
        "messageAttributes": { "kind": { "stringValue": "greeting", "dataType": "String" } }
    }])
}

/// POST /sqs-invoke
/// Deliver a batch of messages to the handler as one queue polling event
pub async fn invoke_queue(State(state): State<Arc<SqsState>>, body: Bytes) -> Response {
    let messages = match parse_batch::<QueueMessage>(&body) {
        Ok(messages) => messages,
        Err(e) => return malformed(&e),
    };
    let event = match build_queue_delivery(messages, &state.queue) {
        Ok(event) => event,
        Err(e) => return malformed(&e),
    };
    info!(records = event.records.len(), queue = %state.queue.queue_name, "SQS delivery");

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
    warn!(error = %error, "Rejected SQS batch");
    error_response(
        &EmulatorError::new(ErrorCode::MalformedBatch, error.to_string()).with_detail("usage", usage_example()),
    )
}
