//! Lambda invocation for awslocal
//!
//! Loads a single user handler and runs it through the invocation harness with a
//! synthetic runtime context, a time budget and normalized error envelopes.

pub mod context;
pub mod function;
pub mod handler;
pub mod handlers;
pub mod invocation;
pub mod loader;
pub mod process;

pub use context::LambdaContext;
pub use function::{FunctionConfig, DEFAULT_FUNCTION_NAME, DEFAULT_HANDLER, DEFAULT_TIMEOUT_SECS};
pub use handler::{callback_fn, handler_fn, Callback, Handler, HandlerError, SharedHandler};
pub use handlers::LambdaState;
pub use invocation::{InvocationError, Invoker, RawEvent};
pub use loader::{HandlerLoader, HandlerModule, HandlerRegistry, HandlerResolutionError};
pub use process::ProcessHandler;
