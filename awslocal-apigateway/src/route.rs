//! Route model and route table

use crate::template::PathTemplate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Method marker that stands for every concrete method
pub const ANY_METHOD: &str = "ANY";

/// HTTP methods a route can be declared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Methods an `ANY` declaration expands to
    pub const ANY: [HttpMethod; 5] = [Self::Get, Self::Put, Self::Post, Self::Patch, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Concrete methods for a declared method, expanding `ANY`
    pub fn expand(declared: &str) -> Option<Vec<Self>> {
        if declared.eq_ignore_ascii_case(ANY_METHOD) {
            Some(Self::ANY.to_vec())
        } else {
            declared.parse().ok().map(|method| vec![method])
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown HTTP method '{0}'")]
pub struct UnknownMethodError(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethodError;

    /// Case-insensitive; `ANY` is not a concrete method
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(UnknownMethodError(s.to_string())),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Unsupported method '{method}' for resource {resource}")]
    UnknownMethod { resource: String, method: String },
}

/// One invocable endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub template: PathTemplate,
    pub method: HttpMethod,
    pub requires_authorizer: bool,
}

impl Route {
    pub fn new(resource: &str, method: HttpMethod, requires_authorizer: bool) -> Self {
        Self {
            template: PathTemplate::parse(resource),
            method,
            requires_authorizer,
        }
    }

    /// One route per concrete method of `declared`
    pub fn expanded(resource: &str, declared: &str, requires_authorizer: bool) -> Result<Vec<Self>, RouteError> {
        let methods = HttpMethod::expand(declared).ok_or_else(|| RouteError::UnknownMethod {
            resource: resource.to_string(),
            method: declared.to_string(),
        })?;
        Ok(methods
            .into_iter()
            .map(|method| Self::new(resource, method, requires_authorizer))
            .collect())
    }
}

/// Route as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDeclaration {
    pub resource: String,
    pub method: String,
    #[serde(default, alias = "requiresAuthorizer")]
    pub has_authorizer: bool,
}

impl RouteDeclaration {
    pub fn expand(&self) -> Result<Vec<Route>, RouteError> {
        Route::expanded(&self.resource, &self.method, self.has_authorizer)
    }
}

/// A matched route and its path parameters
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub route: &'a Route,
    pub path_parameters: HashMap<String, String>,
}

/// Ordered, immutable-after-build route table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn from_declarations<'a, I>(declarations: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = &'a RouteDeclaration>,
    {
        let mut table = Self::default();
        for declaration in declarations {
            table.routes.extend(declaration.expand()?);
        }
        Ok(table)
    }

    pub fn extend(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route, in table order, with the same method whose template matches `path`
    pub fn match_route(&self, path: &str, method: &str) -> Option<MatchResult<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method.as_str() == method)
            .find_map(|route| {
                route.template.matches(path).map(|path_parameters| MatchResult {
                    route,
                    path_parameters,
                })
            })
    }
}
