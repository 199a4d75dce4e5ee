//! Resolution of a module location and export name into a [`SharedHandler`]
//!
//! Handlers compiled into the binary are registered in a [`HandlerRegistry`] under a
//! module location. Any other location must name an executable file, which is run as
//! a [`ProcessHandler`].

use crate::handler::{Handler, SharedHandler};
use crate::process::ProcessHandler;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerResolutionError {
    #[error("Cannot find handler module '{0}'")]
    ModuleNotFound(String),

    #[error("Handler module '{module}' has no export named '{export}'")]
    ExportNotFound { module: String, export: String },

    #[error("Handler module '{0}' is not an executable file")]
    NotExecutable(String),
}

/// Named exports of one module
#[derive(Clone, Default)]
pub struct HandlerModule {
    exports: HashMap<String, SharedHandler>,
    default_export: HashMap<String, SharedHandler>,
}

impl HandlerModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.exports.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register a function that lives on the module's default export
    pub fn with_default_export(
        mut self,
        name: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Self {
        self.default_export.insert(name.into(), Arc::new(handler));
        self
    }

    /// Named exports win over the default export namespace
    pub fn resolve(&self, export: &str) -> Option<SharedHandler> {
        self.exports
            .get(export)
            .or_else(|| self.default_export.get(export))
            .cloned()
    }
}

impl std::fmt::Debug for HandlerModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerModule")
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .field("default_export", &self.default_export.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// In-process handler modules, keyed by location
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    modules: HashMap<String, HandlerModule>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, location: impl Into<String>, module: HandlerModule) -> Self {
        self.modules.insert(location.into(), module);
        self
    }

    pub fn get(&self, location: &str) -> Option<&HandlerModule> {
        self.modules.get(location)
    }
}

/// Loads the function served by this process
#[derive(Debug, Clone, Default)]
pub struct HandlerLoader {
    registry: HandlerRegistry,
    environment: HashMap<String, String>,
}

impl HandlerLoader {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            environment: HashMap::new(),
        }
    }

    /// Environment given to subprocess handlers
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn load(&self, location: &str, export: &str) -> Result<SharedHandler, HandlerResolutionError> {
        if let Some(module) = self.registry.get(location) {
            let handler = module
                .resolve(export)
                .ok_or_else(|| HandlerResolutionError::ExportNotFound {
                    module: location.to_string(),
                    export: export.to_string(),
                })?;
            info!(module = %location, export = %export, "Loaded registered handler");
            return Ok(handler);
        }

        let path = std::fs::canonicalize(Path::new(location))
            .map_err(|_| HandlerResolutionError::ModuleNotFound(location.to_string()))?;
        if !path.is_file() || !is_executable(&path) {
            return Err(HandlerResolutionError::NotExecutable(location.to_string()));
        }

        info!(program = %path.display(), export = %export, "Loaded process handler");
        Ok(Arc::new(
            ProcessHandler::new(path, export).with_environment(self.environment.clone()),
        ))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LambdaContext;
    use crate::function::FunctionConfig;
    use crate::handler::{callback_fn, handler_fn, Callback, HandlerError};
    use serde_json::{json, Value};

    fn registry() -> HandlerRegistry {
        let module = HandlerModule::new()
            .with_export("handler", handler_fn(|_event: Value, _ctx| async {
                Ok::<_, HandlerError>(json!("named"))
            }))
            .with_default_export("legacy", callback_fn(|_event, _ctx, done: Callback| {
                done.succeed(json!("default"));
            }));
        HandlerRegistry::new().register("app/index", module)
    }

    fn context() -> LambdaContext {
        LambdaContext::new(&FunctionConfig::default(), 0)
    }

    #[tokio::test]
    async fn test_load_named_and_default_exports() {
        let loader = HandlerLoader::new(registry());

        let named = loader.load("app/index", "handler").unwrap();
        assert_eq!(named.invoke(Value::Null, context()).await.unwrap(), json!("named"));

        let legacy = loader.load("app/index", "legacy").unwrap();
        assert_eq!(legacy.invoke(Value::Null, context()).await.unwrap(), json!("default"));
    }

    #[test]
    fn test_missing_export() {
        let err = HandlerLoader::new(registry()).load("app/index", "nope").err().unwrap();
        assert_eq!(
            err,
            HandlerResolutionError::ExportNotFound {
                module: "app/index".to_string(),
                export: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_missing_module() {
        let err = HandlerLoader::default()
            .load("/definitely/not/here.js", "handler")
            .err()
            .unwrap();
        assert_eq!(
            err,
            HandlerResolutionError::ModuleNotFound("/definitely/not/here.js".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_file_becomes_process_handler() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "not a program").unwrap();
        let location = plain.to_string_lossy().to_string();
        assert_eq!(
            HandlerLoader::default().load(&location, "handler").err().unwrap(),
            HandlerResolutionError::NotExecutable(location.clone())
        );

        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(HandlerLoader::default().load(&location, "handler").is_ok());

        let dir_location = dir.path().to_string_lossy().to_string();
        assert!(matches!(
            HandlerLoader::default().load(&dir_location, "handler"),
            Err(HandlerResolutionError::NotExecutable(_))
        ));
    }
}
