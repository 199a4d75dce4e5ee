//! Handlers backed by an executable on disk
//!
//! The executable is spawned once per invocation. It receives the event as JSON on
//! stdin and the runtime context through Lambda-style environment variables. The last
//! non-empty line written to stdout is the result. A non-zero exit is a handler error;
//! when the last stderr line is a JSON error object it supplies the error details.

use crate::context::LambdaContext;
use crate::handler::{Handler, HandlerError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const EXIT_ERROR_TYPE: &str = "Runtime.ExitError";
const START_ERROR_TYPE: &str = "Runtime.StartError";

/// Subprocess handler
#[derive(Debug, Clone)]
pub struct ProcessHandler {
    program: PathBuf,
    export: String,
    environment: HashMap<String, String>,
}

impl ProcessHandler {
    pub fn new(program: impl Into<PathBuf>, export: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            export: export.into(),
            environment: HashMap::new(),
        }
    }

    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    fn command(&self, context: &LambdaContext) -> Result<Command, HandlerError> {
        let context_json = serde_json::to_string(context)
            .map_err(|e| HandlerError::new(START_ERROR_TYPE, e.to_string()))?;

        let mut command = Command::new(&self.program);
        command
            .envs(&self.environment)
            .env("_HANDLER", &self.export)
            .env("AWS_LAMBDA_FUNCTION_NAME", &context.function_name)
            .env("AWS_LAMBDA_FUNCTION_VERSION", &context.function_version)
            .env(
                "AWS_LAMBDA_FUNCTION_MEMORY_SIZE",
                context.memory_limit_in_mb.to_string(),
            )
            .env("AWS_LAMBDA_LOG_GROUP_NAME", &context.log_group_name)
            .env("AWS_LAMBDA_LOG_STREAM_NAME", &context.log_stream_name)
            .env("AWS_REQUEST_ID", &context.aws_request_id)
            .env("AWSLOCAL_CONTEXT", context_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }
}

#[async_trait]
impl Handler for ProcessHandler {
    async fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, HandlerError> {
        let payload = serde_json::to_vec(&event)
            .map_err(|e| HandlerError::new(START_ERROR_TYPE, e.to_string()))?;

        let mut child = self
            .command(&context)?
            .spawn()
            .map_err(|e| HandlerError::new(START_ERROR_TYPE, format!("{}: {e}", self.program.display())))?;

        debug!(
            program = %self.program.display(),
            request_id = %context.aws_request_id,
            "Spawned handler process"
        );

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // the process may exit without reading its input
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "Handler process closed stdin early");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| HandlerError::new(EXIT_ERROR_TYPE, e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "Handler process stderr");
        }

        if output.status.success() {
            Ok(parse_result(&stdout))
        } else {
            Err(parse_failure(output.status, &stderr))
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

/// Last stdout line as JSON; plain text becomes a JSON string
fn parse_result(stdout: &str) -> Value {
    match last_line(stdout) {
        None => Value::Null,
        Some(line) => {
            serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessFailure {
    error_message: String,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    stack_trace: Vec<String>,
}

fn parse_failure(status: ExitStatus, stderr: &str) -> HandlerError {
    let reported = last_line(stderr).and_then(|line| serde_json::from_str::<ProcessFailure>(line).ok());
    if let Some(failure) = reported {
        return HandlerError::new(
            failure.error_type.unwrap_or_else(|| "Error".to_string()),
            failure.error_message,
        )
        .with_stack(failure.stack_trace);
    }

    let message = stderr.trim();
    if message.is_empty() {
        HandlerError::new(EXIT_ERROR_TYPE, format!("Handler process exited with {status}"))
    } else {
        HandlerError::new(EXIT_ERROR_TYPE, message)
    }
}
