//! Client for the awslocal invoke endpoints

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Raw HTTP response from an invoke endpoint
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub status: StatusCode,
    pub headers: reqwest::header::HeaderMap,
    pub body: String,
}

impl InvokeResponse {
    /// Body parsed as JSON; `Null` when empty or not JSON
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Client for interacting with awslocal
pub struct AwsLocalClient {
    base_url: String,
    client: Client,
}

impl AwsLocalClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Send `body` to `path` with `method`
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<reqwest::Body>,
    ) -> Result<InvokeResponse, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.request(method, url).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        Ok(InvokeResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.text().await?,
        })
    }

    /// POST /lambda-invoke
    pub async fn lambda_invoke(&self, event: &Value) -> Result<(StatusCode, Value), ClientError> {
        let response = self.request(Method::POST, "lambda-invoke", &[], event.to_string()).await?;
        Ok((response.status, response.json()))
    }

    /// Any method on /apigateway-invoke/{path}
    pub async fn apigateway_invoke(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<InvokeResponse, ClientError> {
        let path = format!("apigateway-invoke/{}", path.trim_start_matches('/'));
        self.request(method, &path, headers, body.to_string()).await
    }

    /// POST /sns-invoke
    pub async fn sns_invoke(&self, batch: &Value) -> Result<(StatusCode, Value), ClientError> {
        let response = self.request(Method::POST, "sns-invoke", &[], batch.to_string()).await?;
        Ok((response.status, response.json()))
    }

    /// POST /sqs-invoke
    pub async fn sqs_invoke(&self, batch: &Value) -> Result<(StatusCode, Value), ClientError> {
        let response = self.request(Method::POST, "sqs-invoke", &[], batch.to_string()).await?;
        Ok((response.status, response.json()))
    }
}
