//! Startup wiring and the HTTP listener

use anyhow::Context;
use awslocal_apigateway::{
    discover_routes, Authorizer, AwsAuthorizerInvoker, AwsResourceLister, GatewayEventBuilder, ResourceLister,
    RouteTable,
};
use awslocal_core::AccountRegion;
use awslocal_lambda::{FunctionConfig, HandlerLoader, HandlerRegistry, Invoker};
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ApiGatewayConfig, Config};
use crate::env::load_environment;
use crate::router::{create_router, AppState, INVOKE_ENDPOINTS};

/// Resolve the configured handler and wrap it in the invocation harness
///
/// A handler that cannot be resolved is fatal.
pub fn build_invoker(config: &Config, registry: HandlerRegistry) -> anyhow::Result<Arc<Invoker>> {
    let environment = load_environment(Path::new(&config.lambda.env), &config.aws);
    let location = config.lambda_path()?;

    let handler = HandlerLoader::new(registry)
        .with_environment(environment)
        .load(location, &config.lambda.handler)
        .with_context(|| format!("Failed to load handler {location}"))?;

    let function = FunctionConfig {
        function_name: config.lambda.function_name.clone(),
        timeout: config.timeout(),
        memory_size: config.lambda.memory_size,
        account: AccountRegion::new(config.aws.region.clone()),
        ..FunctionConfig::default()
    };

    Ok(Arc::new(Invoker::new(handler, function)))
}

/// Discovered routes first, then the configured ones
pub async fn build_route_table(
    apigateway: &ApiGatewayConfig,
    lister: Option<&dyn ResourceLister>,
) -> anyhow::Result<RouteTable> {
    let mut table = RouteTable::default();

    if let (Some(rest_api_id), Some(lister)) = (apigateway.rest_api_id.as_deref(), lister) {
        table.extend(discover_routes(lister, rest_api_id).await?);
    }
    let configured = RouteTable::from_declarations(&apigateway.routes)?;
    table.extend(configured.routes().iter().cloned());

    info!(routes = table.routes().len(), "Route table ready");
    Ok(table)
}

/// The remote function when one is named, else the static context
pub fn build_authorizer(apigateway: &ApiGatewayConfig, sdk: Option<&aws_config::SdkConfig>) -> Authorizer {
    let Some(settings) = &apigateway.authorizer else {
        return Authorizer::None;
    };
    match (&settings.function_name, sdk, &settings.context) {
        (Some(function_name), Some(sdk), _) => {
            Authorizer::remote(function_name.clone(), Arc::new(AwsAuthorizerInvoker::from_sdk_config(sdk)))
        }
        (_, _, Some(context)) => Authorizer::Static(context.clone()),
        _ => Authorizer::None,
    }
}

async fn load_sdk_config(config: &Config) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .profile_name(&config.aws.profile)
        .load()
        .await
}

/// Everything the router needs, built once before the listener starts
pub async fn build_state(config: &Config, registry: HandlerRegistry) -> anyhow::Result<AppState> {
    let invoker = build_invoker(config, registry)?;

    let sdk = if config.needs_aws() {
        Some(load_sdk_config(config).await)
    } else {
        None
    };
    let lister = sdk.as_ref().map(AwsResourceLister::from_sdk_config);
    let routes = build_route_table(&config.apigateway, lister.as_ref().map(|l| l as &dyn ResourceLister))
        .await
        .context("Failed to build route table")?;

    let builder = GatewayEventBuilder::new(Arc::new(routes))
        .with_authorizer(build_authorizer(&config.apigateway, sdk.as_ref()))
        .with_account(AccountRegion::new(config.aws.region.clone()))
        .with_stage(config.apigateway.stage.clone());

    Ok(AppState::new(invoker, builder))
}

/// Serve `state` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log_endpoints(addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

fn log_endpoints(addr: SocketAddr) {
    info!("Started server on http://{addr}");
    for (method, path) in INVOKE_ENDPOINTS {
        info!(method = %method, "  http://{addr}/{path}");
    }
}

/// Build the state from `config` and serve until Ctrl-C
pub async fn run(config: Config, registry: HandlerRegistry) -> anyhow::Result<()> {
    let state = build_state(&config, registry).await?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.server_port())
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.server_port()))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await
}
