//! Emulator error codes and the normalized Lambda error envelope

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error codes surfaced by the emulator endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Dispatcher
    InvalidInvoke,

    // API Gateway
    RouteNotFound,
    AuthorizerNotConfigured,
    Unauthorized,
    AuthorizerFailure,
    InvalidProxyResponse,

    // Event sources
    MalformedBatch,

    // Lambda
    Timeout,
    Serialization,
    ServiceException,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInvoke => "InvalidInvoke",
            Self::RouteNotFound => "RouteNotFoundError",
            Self::AuthorizerNotConfigured => "AuthorizerNotConfiguredError",
            Self::Unauthorized => "UnauthorizedError",
            Self::AuthorizerFailure => "AuthorizerFailureError",
            Self::InvalidProxyResponse => "InvalidProxyResponseError",
            Self::MalformedBatch => "MalformedBatchError",
            Self::Timeout => "TimeoutError",
            Self::Serialization => "SerializationError",
            Self::ServiceException => "ServiceException",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInvoke | Self::MalformedBatch => 400,
            Self::RouteNotFound | Self::AuthorizerNotConfigured | Self::Unauthorized => 403,
            Self::InvalidProxyResponse => 502,
            Self::AuthorizerFailure
            | Self::Timeout
            | Self::Serialization
            | Self::ServiceException => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by an emulator endpoint rather than by a handler
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct EmulatorError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
    pub details: Map<String, Value>,
}

impl EmulatorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            details: Map::new(),
        }
    }

    /// Attach an extra top-level field to the JSON body
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Format as a Lambda-style JSON error body
    pub fn to_json(&self) -> String {
        let mut body = Map::new();
        body.insert("errorMessage".into(), Value::String(self.message.clone()));
        body.insert("errorType".into(), Value::String(self.code.as_str().into()));
        for (key, value) in &self.details {
            body.insert(key.clone(), value.clone());
        }
        body.insert("requestId".into(), Value::String(self.request_id.clone()));
        Value::Object(body).to_string()
    }
}

/// Normalized failure description produced by the invocation harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_message: String,
    pub error_type: String,
    #[serde(default)]
    pub stack_trace: Vec<String>,
}

impl ErrorEnvelope {
    /// Build an envelope, normalizing the raw stack frames
    pub fn new<I, S>(error_type: impl Into<String>, message: impl Into<String>, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let error_type = error_type.into();
        let stack_trace = normalize_stack(&error_type, frames);
        Self {
            error_message: message.into(),
            error_type,
            stack_trace,
        }
    }

    pub fn without_stack(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            error_type: error_type.into(),
            stack_trace: Vec::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"errorMessage":{:?},"errorType":{:?},"stackTrace":[]}}"#,
                self.error_message, self.error_type
            )
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "errorMessage": self.error_message,
            "errorType": self.error_type,
            "stackTrace": self.stack_trace,
        })
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}

/// Drop the leading type-name line, strip `at ` prefixes and discard blank frames
fn normalize_stack<I, S>(error_type: &str, frames: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let header = format!("{error_type}:");
    let mut out = Vec::new();
    for (idx, frame) in frames.into_iter().enumerate() {
        let line = frame.as_ref().trim();
        if idx == 0 && (line == error_type || line.starts_with(&header)) {
            continue;
        }
        let line = line.strip_prefix("at ").unwrap_or(line).trim();
        if !line.is_empty() {
            out.push(line.to_string());
        }
    }
    out
}
