//! Authorizer context resolution
//!
//! A route flagged as requiring an authorizer gets its `requestContext.authorizer`
//! either from a remote REQUEST authorizer function or from a fixed context map.

use crate::builder::GatewayError;
use crate::event::ApiGatewayEvent;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw result of invoking an authorizer function
#[derive(Debug, Clone, Default)]
pub struct AuthorizerOutput {
    pub payload: Option<Value>,
    /// Set when the function itself failed
    pub function_error: Option<String>,
}

#[async_trait]
pub trait AuthorizerInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Value) -> Result<AuthorizerOutput, GatewayError>;
}

/// Authorizer invocation through the Lambda control plane
pub struct AwsAuthorizerInvoker {
    client: aws_sdk_lambda::Client,
}

impl AwsAuthorizerInvoker {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_lambda::Client::new(config))
    }
}

#[async_trait]
impl AuthorizerInvoker for AwsAuthorizerInvoker {
    async fn invoke(&self, function_name: &str, payload: Value) -> Result<AuthorizerOutput, GatewayError> {
        let body = serde_json::to_vec(&payload).map_err(|e| GatewayError::Serialization(e.to_string()))?;

        let out = self
            .client
            .invoke()
            .function_name(function_name)
            .payload(aws_sdk_lambda::primitives::Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                GatewayError::AuthorizerFailure(aws_sdk_lambda::error::DisplayErrorContext(&e).to_string())
            })?;

        let payload = match out.payload() {
            Some(blob) if !blob.as_ref().is_empty() => Some(
                serde_json::from_slice(blob.as_ref())
                    .map_err(|e| GatewayError::AuthorizerFailure(format!("invalid authorizer response: {e}")))?,
            ),
            _ => None,
        };

        Ok(AuthorizerOutput {
            payload,
            function_error: out.function_error().map(str::to_string),
        })
    }
}

/// Where authorizer context comes from
#[derive(Clone, Default)]
pub enum Authorizer {
    Remote {
        function_name: String,
        invoker: Arc<dyn AuthorizerInvoker>,
    },
    Static(Map<String, Value>),
    #[default]
    None,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote { function_name, .. } => {
                f.debug_struct("Remote").field("function_name", function_name).finish_non_exhaustive()
            }
            Self::Static(context) => f.debug_tuple("Static").field(context).finish(),
            Self::None => f.write_str("None"),
        }
    }
}

impl Authorizer {
    pub fn remote(function_name: impl Into<String>, invoker: Arc<dyn AuthorizerInvoker>) -> Self {
        Self::Remote {
            function_name: function_name.into(),
            invoker,
        }
    }

    /// Context for a route that requires authorization
    pub async fn resolve(
        &self,
        event: &ApiGatewayEvent,
        method_arn: &str,
    ) -> Result<Option<Map<String, Value>>, GatewayError> {
        match self {
            Self::Remote { function_name, invoker } => {
                let payload = request_payload(event, method_arn)?;
                debug!(function = %function_name, method_arn = %method_arn, "Invoking REQUEST authorizer");
                let output = invoker.invoke(function_name, payload).await?;

                if let Some(error) = output.function_error {
                    warn!(function = %function_name, error = %error, "Authorizer function failed");
                    return Err(GatewayError::Unauthorized(format!("authorizer reported {error}")));
                }
                let Some(payload) = output.payload else {
                    return Ok(None);
                };
                if denies(&payload) {
                    return Err(GatewayError::Unauthorized("policy denies access".to_string()));
                }
                Ok(payload.get("context").and_then(Value::as_object).cloned())
            }
            Self::Static(context) => Ok(Some(context.clone())),
            Self::None => Err(GatewayError::AuthorizerNotConfigured),
        }
    }
}

/// The event tagged as a REQUEST authorizer call
fn request_payload(event: &ApiGatewayEvent, method_arn: &str) -> Result<Value, GatewayError> {
    let mut payload = serde_json::to_value(event).map_err(|e| GatewayError::Serialization(e.to_string()))?;
    if let Some(fields) = payload.as_object_mut() {
        fields.insert("type".to_string(), Value::String("REQUEST".to_string()));
        fields.insert("methodArn".to_string(), Value::String(method_arn.to_string()));
    }
    Ok(payload)
}

/// Whether the returned policy document has a Deny statement
fn denies(payload: &Value) -> bool {
    let statements = match payload.pointer("/policyDocument/Statement") {
        Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => return false,
    };
    statements.iter().any(|statement| {
        statement
            .get("Effect")
            .and_then(Value::as_str)
            .is_some_and(|effect| effect.eq_ignore_ascii_case("deny"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_denies() {
        assert!(denies(&json!({
            "policyDocument": { "Statement": [{ "Effect": "Allow" }, { "Effect": "Deny" }] }
        })));
        assert!(denies(&json!({ "policyDocument": { "Statement": { "Effect": "DENY" } } })));
        assert!(!denies(&json!({ "policyDocument": { "Statement": [{ "Effect": "Allow" }] } })));
        assert!(!denies(&json!({ "context": {} })));
    }
}
