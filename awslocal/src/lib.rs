//! awslocal - local AWS Lambda invocation emulator
//!
//! Loads one handler and exposes it through direct invocation, an API Gateway
//! proxy emulation and SNS / SQS delivery mocks over a single HTTP listener.

pub mod config;
pub mod env;
pub mod router;
pub mod server;

pub use config::{Config, ConfigError, ConfigOverrides, DEFAULT_CONFIG_PATH};
pub use router::{create_router, AppState, INVOKE_ENDPOINTS};
pub use server::{build_state, run, serve};
