//! The handler capability and its two calling-convention adapters
//!
//! Every loaded function is reduced to [`Handler::invoke`]. Closures returning a
//! future are wrapped with [`handler_fn`]; closures that report their result through
//! a completion callback are wrapped with [`callback_fn`].

use crate::context::LambdaContext;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// Error raised by a handler
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    pub error_type: String,
    pub message: String,
    /// Raw stack frames, normalized later by the harness
    pub stack: Vec<String>,
}

impl HandlerError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    pub fn with_stack<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Build from any error, naming it after its type and recording its source chain
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        let mut frames = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            frames.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self::new(short, error.to_string()).with_stack(frames)
    }
}

/// A loaded function
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, HandlerError>;
}

pub type SharedHandler = Arc<dyn Handler>;

/// Adapter for future-returning functions
pub struct AsyncHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> AsyncHandler<F>
where
    F: Fn(Value, LambdaContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    AsyncHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Value, LambdaContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, HandlerError> {
        (self.f)(event, context).await
    }
}

/// Completion callback given to callback-style functions
///
/// Consumed on first use, so a function can only complete once. Dropping it
/// without calling it completes the invocation with `null`.
pub struct Callback {
    tx: oneshot::Sender<Result<Value, HandlerError>>,
}

impl Callback {
    pub fn call(self, result: Result<Value, HandlerError>) {
        // receiver is gone once the harness has timed out
        let _ = self.tx.send(result);
    }

    pub fn succeed(self, value: Value) {
        self.call(Ok(value));
    }

    pub fn fail(self, error: HandlerError) {
        self.call(Err(error));
    }
}

/// Adapter for functions that complete through a [`Callback`]
pub struct CallbackHandler<F> {
    f: F,
}

pub fn callback_fn<F>(f: F) -> CallbackHandler<F>
where
    F: Fn(Value, LambdaContext, Callback) + Send + Sync,
{
    CallbackHandler { f }
}

#[async_trait]
impl<F> Handler for CallbackHandler<F>
where
    F: Fn(Value, LambdaContext, Callback) + Send + Sync,
{
    async fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, HandlerError> {
        let (tx, rx) = oneshot::channel();
        (self.f)(event, context, Callback { tx });
        rx.await.unwrap_or(Ok(Value::Null))
    }
}
