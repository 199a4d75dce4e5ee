//! Translation of an inbound HTTP request into a proxy-integration event

use crate::authorizer::Authorizer;
use crate::event::{ApiGatewayEvent, ApiGatewayIdentity, ApiGatewayRequestContext};
use crate::route::RouteTable;
use awslocal_core::{AccountRegion, ErrorCode, RequestId};
use chrono::{SecondsFormat, Utc};
use http::{header, HeaderMap, Method, Uri};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Path prefix the dispatcher mounts the gateway under
pub const INVOKE_PREFIX: &str = "/apigateway-invoke";
pub const DEFAULT_STAGE: &str = "v1";

const DEFAULT_HOST: &str = "localhost";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Route not configured {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Authorizer not configured")]
    AuthorizerNotConfigured,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authorizer invocation failed: {0}")]
    AuthorizerFailure(String),

    #[error("Could not serialize event: {0}")]
    Serialization(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RouteNotFound { .. } => ErrorCode::RouteNotFound,
            Self::AuthorizerNotConfigured => ErrorCode::AuthorizerNotConfigured,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::AuthorizerFailure(_) => ErrorCode::AuthorizerFailure,
            Self::Serialization(_) => ErrorCode::Serialization,
        }
    }
}

/// The parts of an HTTP request the builder reads
#[derive(Debug, Clone, Copy)]
pub struct HttpRequestView<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

/// Builds proxy events against an immutable route table
#[derive(Debug, Clone)]
pub struct GatewayEventBuilder {
    routes: Arc<RouteTable>,
    authorizer: Authorizer,
    account: AccountRegion,
    stage: String,
}

impl GatewayEventBuilder {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self {
            routes,
            authorizer: Authorizer::None,
            account: AccountRegion::default(),
            stage: DEFAULT_STAGE.to_string(),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_account(mut self, account: AccountRegion) -> Self {
        self.account = account;
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build the event for `request`, resolving authorizer context when the route needs it
    pub async fn build(
        &self,
        raw_body: Option<String>,
        request: HttpRequestView<'_>,
    ) -> Result<ApiGatewayEvent, GatewayError> {
        let path = strip_prefix(request.uri.path());
        let method = request.method.as_str();

        let matched = self
            .routes
            .match_route(&path, method)
            .ok_or_else(|| GatewayError::RouteNotFound {
                method: method.to_string(),
                path: path.clone(),
            })?;
        let route = matched.route;
        let resource = route.template.to_resource_path();

        let now = Utc::now();
        let host = header_str(request.headers, header::HOST.as_str()).unwrap_or(DEFAULT_HOST);
        let (domain_name, port) = split_host(host);

        let headers = event_headers(request.headers, port, now.timestamp());
        let multi_value_headers = headers
            .iter()
            .map(|(key, value)| (key.clone(), vec![value.clone()]))
            .collect();
        let (query_string_parameters, multi_value_query_string_parameters) =
            query_parameters(request.uri.query());
        let path_parameters = route.template.has_params().then_some(matched.path_parameters);

        let request_id = RequestId::new();
        let mut event = ApiGatewayEvent {
            resource: resource.clone(),
            path: path.clone(),
            http_method: method.to_string(),
            headers,
            multi_value_headers,
            query_string_parameters,
            multi_value_query_string_parameters,
            path_parameters,
            stage_variables: None,
            request_context: ApiGatewayRequestContext {
                account_id: self.account.account_id.clone(),
                api_id: RequestId::short_id(10),
                authorizer: None,
                domain_prefix: domain_name.split('.').next().unwrap_or(domain_name).to_string(),
                domain_name: domain_name.to_string(),
                extended_request_id: request_id.extended_id,
                http_method: method.to_string(),
                identity: ApiGatewayIdentity::local(
                    header_str(request.headers, header::USER_AGENT.as_str()).unwrap_or_default(),
                ),
                path: format!("/{}{}", self.stage, path),
                protocol: "HTTP/1.1".to_string(),
                request_id: request_id.id,
                request_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                request_time_epoch: now.timestamp_millis(),
                resource_id: RequestId::short_id(6),
                resource_path: resource.clone(),
                stage: self.stage.clone(),
            },
            body: raw_body.filter(|body| !body.is_empty()),
            is_base64_encoded: false,
        };

        if route.requires_authorizer {
            let method_arn = self.account.arn(
                "execute-api",
                &format!(
                    "{}/{}/{}{}",
                    event.request_context.api_id, self.stage, method, path
                ),
            );
            event.request_context.authorizer = self.authorizer.resolve(&event, &method_arn).await?;
        }

        Ok(event)
    }
}

/// Request path with the dispatcher prefix removed; never empty
pub fn strip_prefix(path: &str) -> String {
    let stripped = path.strip_prefix(INVOKE_PREFIX).unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn split_host(host: &str) -> (&str, Option<&str>) {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (name, Some(port))
        }
        _ => (host, None),
    }
}

/// Synthetic forwarding headers, overridden by whatever the client sent
fn event_headers(request: &HeaderMap, port: Option<&str>, epoch_secs: i64) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("X-Amzn-Trace-Id".to_string(), RequestId::trace_id(epoch_secs));
    headers.insert("X-Forwarded-For".to_string(), "127.0.0.1".to_string());
    headers.insert("X-Forwarded-Port".to_string(), port.unwrap_or("80").to_string());
    headers.insert("X-Forwarded-Proto".to_string(), "http".to_string());

    for name in request.keys() {
        // first value wins for repeated headers
        let Some(value) = request.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        headers.retain(|key: &String, _| !key.eq_ignore_ascii_case(name.as_str()));
        headers.insert(name.as_str().to_string(), value.to_string());
    }
    headers
}

type QueryMaps = (
    Option<HashMap<String, String>>,
    Option<HashMap<String, Vec<String>>>,
);

fn query_parameters(query: Option<&str>) -> QueryMaps {
    let Some(query) = query else {
        return (None, None);
    };

    let mut single = HashMap::new();
    let mut multi: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        single
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        multi.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    if single.is_empty() {
        (None, None)
    } else {
        (Some(single), Some(multi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::{AuthorizerInvoker, AuthorizerOutput};
    use crate::route::{HttpMethod, Route};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    fn builder(routes: Vec<Route>) -> GatewayEventBuilder {
        GatewayEventBuilder::new(Arc::new(RouteTable::new(routes)))
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                http::HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    async fn build(
        builder: &GatewayEventBuilder,
        method: &str,
        uri: &str,
        header_pairs: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<ApiGatewayEvent, GatewayError> {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        let uri: Uri = uri.parse().unwrap();
        let headers = headers(header_pairs);
        builder
            .build(
                body.map(str::to_string),
                HttpRequestView {
                    method: &method,
                    uri: &uri,
                    headers: &headers,
                },
            )
            .await
    }

    #[tokio::test]
    async fn test_basic_event() {
        let b = builder(vec![Route::new("/users/:id", HttpMethod::Get, false)]);
        let event = build(
            &b,
            "GET",
            "/apigateway-invoke/users/42?tag=a&tag=b&q=1",
            &[("host", "api.example.test:3000"), ("user-agent", "curl/8.0")],
            None,
        )
        .await
        .unwrap();

        assert_eq!(event.path, "/users/42");
        assert_eq!(event.resource, "/users/{id}");
        assert_eq!(event.http_method, "GET");
        assert_eq!(
            event.path_parameters,
            Some(HashMap::from([("id".to_string(), "42".to_string())]))
        );

        let single = event.query_string_parameters.unwrap();
        let multi = event.multi_value_query_string_parameters.unwrap();
        assert_eq!(single["tag"], "a");
        assert_eq!(multi["tag"], vec!["a", "b"]);
        assert_eq!(single["q"], "1");

        assert_eq!(event.headers["X-Forwarded-Port"], "3000");
        assert_eq!(event.headers["X-Forwarded-Proto"], "http");
        assert_eq!(event.headers["X-Forwarded-For"], "127.0.0.1");
        assert!(event.headers["X-Amzn-Trace-Id"].starts_with("Root=1-"));
        assert_eq!(event.headers["user-agent"], "curl/8.0");
        for (key, value) in &event.headers {
            assert_eq!(event.multi_value_headers[key], vec![value.clone()]);
        }
        assert_eq!(event.headers.len(), event.multi_value_headers.len());

        let ctx = &event.request_context;
        assert_eq!(ctx.path, "/v1/users/42");
        assert_eq!(ctx.stage, "v1");
        assert_eq!(ctx.resource_path, "/users/{id}");
        assert_eq!(ctx.domain_name, "api.example.test");
        assert_eq!(ctx.domain_prefix, "api");
        assert_eq!(ctx.api_id.len(), 10);
        assert_eq!(ctx.resource_id.len(), 6);
        assert_eq!(ctx.identity.source_ip, "127.0.0.1");
        assert_eq!(ctx.identity.user_agent, "curl/8.0");
        assert!(ctx.authorizer.is_none());
        assert!(ctx.request_time.ends_with('Z'));
        assert!(ctx.request_time_epoch > 0);
        assert!(event.body.is_none());
        assert!(!event.is_base64_encoded);
    }

    #[tokio::test]
    async fn test_no_query_and_no_params_are_null() {
        let b = builder(vec![Route::new("/health", HttpMethod::Post, false)]);
        let event = build(&b, "POST", "/apigateway-invoke/health", &[], Some("{\"a\":1}"))
            .await
            .unwrap();
        assert!(event.query_string_parameters.is_none());
        assert!(event.multi_value_query_string_parameters.is_none());
        assert!(event.path_parameters.is_none());
        assert_eq!(event.body.as_deref(), Some("{\"a\":1}"));
        assert_eq!(event.headers["X-Forwarded-Port"], "80");
        assert_eq!(event.request_context.domain_name, "localhost");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["queryStringParameters"], Value::Null);
        assert_eq!(value["pathParameters"], Value::Null);
        assert_eq!(value["stageVariables"], Value::Null);
        assert_eq!(value["requestContext"]["authorizer"], Value::Null);
    }

    #[tokio::test]
    async fn test_client_headers_override_synthetic() {
        let b = builder(vec![Route::new("/", HttpMethod::Get, false)]);
        let event = build(
            &b,
            "GET",
            "/apigateway-invoke",
            &[("x-forwarded-for", "10.0.0.1"), ("accept", "a"), ("accept", "b")],
            None,
        )
        .await
        .unwrap();
        assert_eq!(event.path, "/");
        assert_eq!(event.headers["x-forwarded-for"], "10.0.0.1");
        assert!(!event.headers.contains_key("X-Forwarded-For"));
        assert_eq!(event.headers["accept"], "a");
        assert_eq!(event.multi_value_headers["accept"], vec!["a"]);
    }

    #[tokio::test]
    async fn test_unmatched_route() {
        let b = builder(vec![Route::new("/users", HttpMethod::Get, false)]);
        let err = build(&b, "DELETE", "/apigateway-invoke/users", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RouteNotFound { .. }));
        assert_eq!(err.code().http_status(), 403);
    }

    #[tokio::test]
    async fn test_authorizer_required_but_missing() {
        let b = builder(vec![Route::new("/secure", HttpMethod::Get, true)]);
        let err = build(&b, "GET", "/apigateway-invoke/secure", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthorizerNotConfigured));
        assert_eq!(err.code().http_status(), 403);
    }

    #[tokio::test]
    async fn test_static_authorizer_context() {
        let mut context = Map::new();
        context.insert("userId".to_string(), json!("u-1"));
        let b = builder(vec![Route::new("/secure", HttpMethod::Get, true)])
            .with_authorizer(Authorizer::Static(context.clone()));

        let event = build(&b, "GET", "/apigateway-invoke/secure", &[], None)
            .await
            .unwrap();
        assert_eq!(event.request_context.authorizer, Some(context));
    }

    struct FakeAuthorizer {
        response: Value,
        function_error: Option<String>,
        payloads: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl AuthorizerInvoker for FakeAuthorizer {
        async fn invoke(&self, function_name: &str, payload: Value) -> Result<AuthorizerOutput, GatewayError> {
            assert_eq!(function_name, "auth-fn");
            self.payloads.lock().unwrap().push(payload);
            Ok(AuthorizerOutput {
                payload: Some(self.response.clone()),
                function_error: self.function_error.clone(),
            })
        }
    }

    fn fake(response: Value, function_error: Option<&str>) -> Arc<FakeAuthorizer> {
        Arc::new(FakeAuthorizer {
            response,
            function_error: function_error.map(str::to_string),
            payloads: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_remote_authorizer_context() {
        let invoker = fake(
            json!({
                "principalId": "user",
                "policyDocument": { "Statement": [{ "Effect": "Allow" }] },
                "context": { "role": "admin" }
            }),
            None,
        );
        let b = builder(vec![Route::new("/secure/{id}", HttpMethod::Get, true)])
            .with_authorizer(Authorizer::remote("auth-fn", invoker.clone()));

        let event = build(&b, "GET", "/apigateway-invoke/secure/5", &[], None)
            .await
            .unwrap();
        assert_eq!(
            event.request_context.authorizer.unwrap()["role"],
            json!("admin")
        );

        let payloads = invoker.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["type"], "REQUEST");
        assert_eq!(payloads[0]["path"], "/secure/5");
        let method_arn = payloads[0]["methodArn"].as_str().unwrap();
        assert!(method_arn.starts_with("arn:aws:execute-api:us-east-1:000000000000:"));
        assert!(method_arn.ends_with("/v1/GET/secure/5"));
    }

    #[tokio::test]
    async fn test_remote_authorizer_deny() {
        let invoker = fake(
            json!({ "policyDocument": { "Statement": [{ "Effect": "Deny" }] } }),
            None,
        );
        let b = builder(vec![Route::new("/secure", HttpMethod::Get, true)])
            .with_authorizer(Authorizer::remote("auth-fn", invoker));

        let err = build(&b, "GET", "/apigateway-invoke/secure", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_remote_authorizer_function_error() {
        let invoker = fake(json!({ "errorMessage": "Unauthorized" }), Some("Unhandled"));
        let b = builder(vec![Route::new("/secure", HttpMethod::Get, true)])
            .with_authorizer(Authorizer::remote("auth-fn", invoker));

        let err = build(&b, "GET", "/apigateway-invoke/secure", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_authorizer_not_called_for_open_route() {
        let invoker = fake(json!({ "context": { "x": 1 } }), None);
        let b = builder(vec![Route::new("/open", HttpMethod::Get, false)])
            .with_authorizer(Authorizer::remote("auth-fn", invoker.clone()));

        let event = build(&b, "GET", "/apigateway-invoke/open", &[], None)
            .await
            .unwrap();
        assert!(event.request_context.authorizer.is_none());
        assert!(invoker.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/apigateway-invoke/a/b"), "/a/b");
        assert_eq!(strip_prefix("/apigateway-invoke"), "/");
        assert_eq!(strip_prefix("/apigateway-invoke/"), "/");
        assert_eq!(strip_prefix("/other"), "/other");
    }

    #[test]
    fn test_query_without_pairs() {
        assert_eq!(query_parameters(Some("")), (None, None));
        let (single, multi) = query_parameters(Some("a=%20x&b"));
        assert_eq!(single.unwrap()["a"], " x");
        assert_eq!(multi.unwrap()["b"], vec![""]);
    }
}
