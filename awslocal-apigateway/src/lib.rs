//! API Gateway emulation for awslocal
//!
//! Matches requests against a route table, builds REST API proxy-integration events,
//! resolves authorizer context and relays the handler's proxy response.

pub mod authorizer;
pub mod builder;
pub mod discovery;
pub mod event;
pub mod handlers;
pub mod route;
pub mod template;

pub use authorizer::{Authorizer, AuthorizerInvoker, AwsAuthorizerInvoker};
pub use builder::{GatewayError, GatewayEventBuilder, HttpRequestView, DEFAULT_STAGE, INVOKE_PREFIX};
pub use discovery::{discover_routes, AwsResourceLister, DiscoveryError, ResourceLister};
pub use event::{ApiGatewayEvent, ApiGatewayResponse};
pub use handlers::ApiGatewayState;
pub use route::{HttpMethod, MatchResult, Route, RouteDeclaration, RouteError, RouteTable, UnknownMethodError};
pub use template::PathTemplate;
