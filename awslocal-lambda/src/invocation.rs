//! Lambda invocation handling

use crate::context::LambdaContext;
use crate::function::FunctionConfig;
use crate::handler::{HandlerError, SharedHandler};
use awslocal_core::{ErrorCode, ErrorEnvelope};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// Longest result prefix written to the END log line
const LOGGED_RESULT_LIMIT: usize = 1024;

const PANIC_ERROR_TYPE: &str = "Runtime.HandlerPanic";

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Task timed out after {:.2} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{0}")]
    Handler(HandlerError),

    #[error("Could not parse event: {0}")]
    Serialization(String),
}

impl InvocationError {
    /// Client-facing form of the failure
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Timeout(_) => ErrorEnvelope::without_stack(ErrorCode::Timeout.as_str(), self.to_string()),
            Self::Handler(e) => ErrorEnvelope::new(&e.error_type, &e.message, &e.stack),
            Self::Serialization(_) => {
                ErrorEnvelope::without_stack(ErrorCode::Serialization.as_str(), self.to_string())
            }
        }
    }
}

/// Event as received by the harness
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Unparsed JSON text
    Text(String),
    Json(Value),
}

impl From<String> for RawEvent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawEvent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RawEvent {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl RawEvent {
    fn into_value(self) -> Result<Value, InvocationError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => {
                serde_json::from_str(&text).map_err(|e| InvocationError::Serialization(e.to_string()))
            }
        }
    }
}

/// Invocation harness around the loaded handler
#[derive(Clone)]
pub struct Invoker {
    handler: SharedHandler,
    config: Arc<FunctionConfig>,
}

impl Invoker {
    pub fn new(handler: SharedHandler, config: FunctionConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    /// Invoke with the configured time budget
    pub async fn invoke(&self, event: impl Into<RawEvent>) -> Result<Value, InvocationError> {
        self.invoke_with_timeout(event, self.config.timeout).await
    }

    pub async fn invoke_with_timeout(
        &self,
        event: impl Into<RawEvent>,
        timeout: Duration,
    ) -> Result<Value, InvocationError> {
        let deadline_ms = chrono::Utc::now().timestamp_millis()
            + i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX / 2);
        let context = LambdaContext::new(&self.config, deadline_ms);
        let request_id = context.aws_request_id.clone();
        let started = Instant::now();

        info!(
            request_id = %request_id,
            version = %self.config.version,
            "START RequestId: {request_id}"
        );

        let result = self.run(event.into(), context, timeout).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(value) => {
                let rendered = value.to_string();
                info!(
                    request_id = %request_id,
                    duration_ms = %format!("{duration_ms:.2}"),
                    result = %truncate(&rendered, LOGGED_RESULT_LIMIT),
                    "END RequestId: {request_id}"
                );
            }
            Err(e) => {
                let envelope = e.to_envelope();
                error!(
                    request_id = %request_id,
                    error_type = %envelope.error_type,
                    error_message = %envelope.error_message,
                    stack = ?envelope.stack_trace,
                    "Invocation failed"
                );
                info!(
                    request_id = %request_id,
                    duration_ms = %format!("{duration_ms:.2}"),
                    result = %truncate(&envelope.to_json(), LOGGED_RESULT_LIMIT),
                    "END RequestId: {request_id}"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        event: RawEvent,
        context: LambdaContext,
        timeout: Duration,
    ) -> Result<Value, InvocationError> {
        let event = event.into_value()?;
        let handler = Arc::clone(&self.handler);
        let mut task = tokio::spawn(async move { handler.invoke(event, context).await });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result.map_err(InvocationError::Handler),
            Ok(Err(join_error)) => Err(InvocationError::Handler(HandlerError::new(
                PANIC_ERROR_TYPE,
                panic_message(join_error),
            ))),
            Err(_) => {
                // dropping the handler future also kills a subprocess handler
                task.abort();
                warn!(timeout_secs = timeout.as_secs_f64(), "Handler exceeded its time budget");
                Err(InvocationError::Timeout(timeout))
            }
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker").field("config", &self.config).finish_non_exhaustive()
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string()),
        Err(error) => error.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
