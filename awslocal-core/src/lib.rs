//! Core types for awslocal
//!
//! This crate provides the error envelope, error codes, identifier generation and
//! event-source batch validation shared by every emulator surface.

pub mod account;
pub mod batch;
pub mod error;
pub mod request_id;

pub use account::{AccountRegion, DEFAULT_ACCOUNT_ID, DEFAULT_REGION};
pub use batch::{parse_batch, MalformedBatchError};
pub use error::{EmulatorError, ErrorCode, ErrorEnvelope};
pub use request_id::RequestId;
