//! Configuration management
//!
//! The JSON file (default `.awslocal.json`) is layered under command line / environment
//! overrides. Keys stay case-sensitive since route templates and authorizer context are
//! user data.

use awslocal_apigateway::{RouteDeclaration, DEFAULT_STAGE};
use awslocal_core::DEFAULT_REGION;
use awslocal_lambda::{DEFAULT_FUNCTION_NAME, DEFAULT_HANDLER, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = ".awslocal.json";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Config file {0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No lambda path configured (set lambda.path or --lambda-path)")]
    MissingLambdaPath,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Kept signed so out-of-range values can fall back with a warning
    #[serde(alias = "serverPort")]
    pub port: i64,
    pub host: String,
    pub lambda: LambdaConfig,
    pub aws: AwsConfig,
    pub apigateway: ApiGatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LambdaConfig {
    pub path: Option<String>,
    pub handler: String,
    /// Seconds
    pub timeout: i64,
    #[serde(alias = "envPath")]
    pub env: String,
    pub function_name: String,
    pub memory_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_api_id: Option<String>,
    pub stage: String,
    #[serde(alias = "resources")]
    pub routes: Vec<RouteDeclaration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<AuthorizerConfig>,
}

/// A remote function wins over a static context when both are set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorizerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: i64::from(DEFAULT_PORT),
            host: DEFAULT_HOST.to_string(),
            lambda: LambdaConfig::default(),
            aws: AwsConfig::default(),
            apigateway: ApiGatewayConfig::default(),
        }
    }
}

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            path: None,
            handler: DEFAULT_HANDLER.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS as i64,
            env: DEFAULT_ENV_PATH.to_string(),
            function_name: DEFAULT_FUNCTION_NAME.to_string(),
            memory_size: None,
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl Default for ApiGatewayConfig {
    fn default() -> Self {
        Self {
            rest_api_id: None,
            stage: DEFAULT_STAGE.to_string(),
            routes: Vec::new(),
            authorizer: None,
        }
    }
}

/// Values given on the command line or through `AWSLOCAL_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub lambda_path: Option<String>,
    pub lambda_handler: Option<String>,
    pub timeout: Option<i64>,
    pub env_path: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub port: Option<i64>,
    pub host: Option<String>,
}

impl Config {
    /// Load the file at `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content)
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(path) = overrides.lambda_path {
            self.lambda.path = Some(path);
        }
        if let Some(handler) = overrides.lambda_handler {
            self.lambda.handler = handler;
        }
        if let Some(timeout) = overrides.timeout {
            self.lambda.timeout = timeout;
        }
        if let Some(env) = overrides.env_path {
            self.lambda.env = env;
        }
        if let Some(profile) = overrides.profile {
            self.aws.profile = profile;
        }
        if let Some(region) = overrides.region {
            self.aws.region = region;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        self
    }

    /// Replace out-of-range port and timeout values with the defaults
    pub fn normalized(mut self) -> Self {
        if u16::try_from(self.port).map_or(true, |port| port == 0) {
            warn!(port = self.port, default = DEFAULT_PORT, "Invalid port, using default");
            self.port = i64::from(DEFAULT_PORT);
        }
        if self.lambda.timeout <= 0 {
            warn!(
                timeout = self.lambda.timeout,
                default = DEFAULT_TIMEOUT_SECS,
                "Invalid timeout, using default"
            );
            self.lambda.timeout = DEFAULT_TIMEOUT_SECS as i64;
        }
        self
    }

    pub fn server_port(&self) -> u16 {
        u16::try_from(self.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.lambda.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn lambda_path(&self) -> Result<&str, ConfigError> {
        self.lambda
            .path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .ok_or(ConfigError::MissingLambdaPath)
    }

    /// Whether startup has to talk to the AWS control plane
    pub fn needs_aws(&self) -> bool {
        self.apigateway.rest_api_id.is_some()
            || self
                .apigateway
                .authorizer
                .as_ref()
                .is_some_and(|a| a.function_name.is_some())
    }

    /// Starter file written by `awslocal init`
    pub fn template() -> Self {
        let mut context = Map::new();
        context.insert("yourKey".to_string(), Value::String("your-value".to_string()));

        Self {
            lambda: LambdaConfig {
                path: Some("path/to/handler".to_string()),
                ..LambdaConfig::default()
            },
            apigateway: ApiGatewayConfig {
                rest_api_id: Some("your-rest-api-id".to_string()),
                routes: vec![RouteDeclaration {
                    resource: "/your/path/{id}".to_string(),
                    method: "GET".to_string(),
                    has_authorizer: false,
                }],
                authorizer: Some(AuthorizerConfig {
                    function_name: Some("your-authorizer-function-name".to_string()),
                    context: Some(context),
                }),
                ..ApiGatewayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Write the template to `path`, refusing to replace an existing file unless `force`
    pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let content = serde_json::to_string_pretty(&Self::template()).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content + "\n").map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_port(), 9000);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.apigateway.stage, "v1");
        assert!(!config.needs_aws());
        assert!(matches!(config.lambda_path(), Err(ConfigError::MissingLambdaPath)));
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_json(
            r#"{
                "serverPort": 8080,
                "lambda": { "path": "./handler.sh", "handler": "main", "timeout": 10, "envPath": ".env.local" },
                "aws": { "region": "eu-west-1", "profile": "dev" },
                "apigateway": {
                    "stage": "prod",
                    "resources": [ { "resource": "/users/{id}", "method": "GET", "hasAuthorizer": true } ],
                    "authorizer": { "context": { "UserId": "u-1" } }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.lambda_path().unwrap(), "./handler.sh");
        assert_eq!(config.lambda.handler, "main");
        assert_eq!(config.lambda.env, ".env.local");
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.apigateway.routes.len(), 1);
        assert!(config.apigateway.routes[0].has_authorizer);

        let context = config.apigateway.authorizer.unwrap().context.unwrap();
        assert_eq!(context["UserId"], "u-1");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = Config::from_json(r#"{ "port": 8080, "aws": { "region": "eu-west-1" } }"#)
            .unwrap()
            .with_overrides(ConfigOverrides {
                port: Some(7000),
                lambda_path: Some("bin/handler".to_string()),
                ..ConfigOverrides::default()
            });

        assert_eq!(config.server_port(), 7000);
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.lambda.path.as_deref(), Some("bin/handler"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_json(r#"{ "port": 70000, "lambda": { "timeout": 0 } }"#)
            .unwrap()
            .normalized();
        assert_eq!(config.server_port(), DEFAULT_PORT);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let config = Config::default()
            .with_overrides(ConfigOverrides {
                port: Some(-1),
                ..ConfigOverrides::default()
            })
            .normalized();
        assert_eq!(config.server_port(), DEFAULT_PORT);
    }

    #[test]
    fn test_needs_aws() {
        let mut config = Config::default();
        config.apigateway.authorizer = Some(AuthorizerConfig {
            function_name: None,
            context: Some(Map::new()),
        });
        assert!(!config.needs_aws());

        config.apigateway.rest_api_id = Some("abc123".to_string());
        assert!(config.needs_aws());
    }

    #[test]
    fn test_write_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);

        Config::write_template(&path, false).unwrap();
        let written = Config::load(&path).unwrap();
        assert_eq!(written, Config::template());

        assert!(matches!(
            Config::write_template(&path, false),
            Err(ConfigError::AlreadyExists(_))
        ));
        Config::write_template(&path, true).unwrap();
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
