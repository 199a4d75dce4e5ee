//! Test server management

use awslocal::AppState;
use awslocal_apigateway::{Authorizer, GatewayEventBuilder, Route, RouteTable};
use awslocal_lambda::{FunctionConfig, Handler, Invoker, SharedHandler};
use portpicker::pick_unused_port;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::AwsLocalClient;
use crate::STARTUP_TIMEOUT_SECS;

/// Errors that can occur with test server
#[derive(Debug, Error)]
pub enum TestError {
    #[error("No available port found")]
    NoPortAvailable,

    #[error("Failed to start server: {0}")]
    StartFailed(String),

    #[error("Server startup timed out")]
    StartupTimeout,
}

/// Configures the handler and API Gateway setup of a [`TestServer`]
pub struct TestServerBuilder {
    handler: SharedHandler,
    function: FunctionConfig,
    routes: Vec<Route>,
    authorizer: Authorizer,
}

impl TestServerBuilder {
    pub fn function(mut self, function: FunctionConfig) -> Self {
        self.function = function;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.function.timeout = timeout;
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Start serving on a random available port
    pub async fn start(self) -> Result<TestServer, TestError> {
        let port = pick_unused_port().ok_or(TestError::NoPortAvailable)?;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let invoker = Arc::new(Invoker::new(self.handler, self.function));
        let builder = GatewayEventBuilder::new(Arc::new(RouteTable::new(self.routes)))
            .with_authorizer(self.authorizer)
            .with_account(invoker.config().account.clone());
        let state = AppState::new(invoker, builder);

        info!(port = port, "Starting awslocal test server");
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = awslocal::serve(listener, state, async {
                let _ = signal.await;
            })
            .await;
        });

        let server = TestServer {
            port,
            base_url: format!("http://127.0.0.1:{port}"),
            shutdown: Some(shutdown),
            task,
        };
        server.wait_ready().await?;
        Ok(server)
    }
}

/// The awslocal router served in-process
pub struct TestServer {
    port: u16,
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub fn builder(handler: impl Handler + 'static) -> TestServerBuilder {
        TestServerBuilder {
            handler: Arc::new(handler),
            function: FunctionConfig::default(),
            routes: Vec::new(),
            authorizer: Authorizer::None,
        }
    }

    async fn wait_ready(&self) -> Result<(), TestError> {
        let health = format!("{}/health", self.base_url);
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_secs(STARTUP_TIMEOUT_SECS) {
            if let Ok(response) = reqwest::get(&health).await {
                if response.status().is_success() {
                    info!(port = self.port, "awslocal test server ready");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Err(TestError::StartupTimeout)
    }

    pub fn client(&self) -> AwsLocalClient {
        AwsLocalClient::new(self.base_url.clone())
    }

    /// Stop the server and wait for in-flight requests
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
        info!("awslocal test server stopped");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}
