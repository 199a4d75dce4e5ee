//! Test utilities for awslocal
//!
//! Runs the real router in-process on a free port and talks to it over HTTP.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use awslocal_lambda::{handler_fn, HandlerError, LambdaContext};
//! use awslocal_test::TestServer;
//! use serde_json::Value;
//!
//! # async fn example() {
//! let handler = handler_fn(|event: Value, _ctx: LambdaContext| async move { Ok::<_, HandlerError>(event) });
//! let server = TestServer::builder(handler).start().await.unwrap();
//! let (status, body) = server.client().lambda_invoke(&serde_json::json!({ "a": 1 })).await.unwrap();
//! # }
//! ```

pub mod client;
pub mod server;

pub use client::{AwsLocalClient, ClientError};
pub use server::{TestError, TestServer, TestServerBuilder};

/// Timeout for waiting on the listener
pub const STARTUP_TIMEOUT_SECS: u64 = 5;
