//! Synthetic runtime context handed to every invocation

use crate::function::FunctionConfig;
use awslocal_core::RequestId;
use serde::Serialize;

/// Lambda context passed to the function
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaContext {
    pub callback_waits_for_empty_event_loop: bool,
    pub function_name: String,
    pub function_version: String,
    pub invoked_function_arn: String,
    #[serde(rename = "memoryLimitInMB")]
    pub memory_limit_in_mb: u32,
    pub aws_request_id: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    /// Epoch milliseconds at which the harness gives up on the invocation
    pub deadline_ms: i64,
}

impl LambdaContext {
    pub fn new(config: &FunctionConfig, deadline_ms: i64) -> Self {
        Self {
            callback_waits_for_empty_event_loop: false,
            function_name: config.function_name.clone(),
            function_version: config.version.clone(),
            invoked_function_arn: config.arn(),
            memory_limit_in_mb: config.memory_limit_mb(),
            aws_request_id: RequestId::new().id,
            log_group_name: config.log_group_name(),
            log_stream_name: log_stream_name(&config.version),
            deadline_ms,
        }
    }

    /// Get remaining time in milliseconds
    pub fn get_remaining_time_in_millis(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        (self.deadline_ms - now).max(0)
    }

    // Completion hooks kept for handlers written against the callback-era context.
    // The harness only observes the handler's returned result.

    pub fn done(&self) {}

    pub fn fail(&self) {}

    pub fn succeed(&self) {}
}

/// `YYYY/MM/DD/[<version>]<32 hex>`
fn log_stream_name(version: &str) -> String {
    format!(
        "{}/[{}]{}",
        chrono::Utc::now().format("%Y/%m/%d"),
        version,
        RequestId::hex32()
    )
}
