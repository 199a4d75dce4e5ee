//! Route discovery from a deployed REST API

use crate::route::{HttpMethod, Route};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to list resources of REST API {rest_api_id}: {message}")]
    Remote { rest_api_id: String, message: String },
}

/// A method declared on a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMethod {
    pub http_method: String,
    pub has_authorizer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    pub path: String,
    pub methods: Vec<ResourceMethod>,
}

/// One page of a resource listing
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    pub items: Vec<DiscoveredResource>,
    /// Continuation token; `None` on the last page
    pub position: Option<String>,
}

#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list_resources(
        &self,
        rest_api_id: &str,
        position: Option<String>,
    ) -> Result<ResourcePage, DiscoveryError>;
}

/// Routes of one resource; `OPTIONS` is skipped and `ANY` expanded
pub fn routes_from_resource(resource: &DiscoveredResource) -> Vec<Route> {
    let mut routes = Vec::new();
    for method in &resource.methods {
        if method.http_method.eq_ignore_ascii_case(HttpMethod::Options.as_str()) {
            continue;
        }
        match Route::expanded(&resource.path, &method.http_method, method.has_authorizer) {
            Ok(expanded) => routes.extend(expanded),
            Err(e) => warn!(error = %e, "Skipping discovered method"),
        }
    }
    routes
}

/// Walk every page of the listing and collect the routes in listing order
pub async fn discover_routes(
    lister: &dyn ResourceLister,
    rest_api_id: &str,
) -> Result<Vec<Route>, DiscoveryError> {
    let mut routes = Vec::new();
    let mut position = None;

    loop {
        let page = lister.list_resources(rest_api_id, position).await?;
        debug!(resources = page.items.len(), "Fetched resource page");
        for resource in &page.items {
            routes.extend(routes_from_resource(resource));
        }

        position = page.position.filter(|p| !p.is_empty());
        if position.is_none() {
            break;
        }
    }

    info!(rest_api_id = %rest_api_id, routes = routes.len(), "Discovered API Gateway routes");
    Ok(routes)
}

/// Resource listing through the API Gateway control plane
pub struct AwsResourceLister {
    client: aws_sdk_apigateway::Client,
}

impl AwsResourceLister {
    pub fn new(client: aws_sdk_apigateway::Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_apigateway::Client::new(config))
    }
}

#[async_trait]
impl ResourceLister for AwsResourceLister {
    async fn list_resources(
        &self,
        rest_api_id: &str,
        position: Option<String>,
    ) -> Result<ResourcePage, DiscoveryError> {
        let output = self
            .client
            .get_resources()
            .rest_api_id(rest_api_id)
            .embed("methods")
            .set_position(position)
            .send()
            .await
            .map_err(|e| DiscoveryError::Remote {
                rest_api_id: rest_api_id.to_string(),
                message: aws_sdk_apigateway::error::DisplayErrorContext(&e).to_string(),
            })?;

        let items = output
            .items()
            .iter()
            .map(|resource| DiscoveredResource {
                path: resource.path().unwrap_or_default().to_string(),
                methods: resource
                    .resource_methods()
                    .map(|methods| {
                        methods
                            .iter()
                            .map(|(name, method)| ResourceMethod {
                                http_method: name.clone(),
                                has_authorizer: method.authorizer_id().is_some_and(|id| !id.is_empty()),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        Ok(ResourcePage {
            items,
            position: output.position().map(str::to_string),
        })
    }
}
