//! awslocal - Local AWS Lambda invocation emulator
//!
//! Runs one handler locally behind direct, API Gateway, SNS and SQS invoke endpoints.

use anyhow::Context;
use awslocal::config::{Config, ConfigOverrides, DEFAULT_CONFIG_PATH};
use awslocal::server;
use awslocal_lambda::HandlerRegistry;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "awslocal", version)]
#[command(about = "Local AWS Lambda invocation emulator", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "AWSLOCAL_CONFIG")]
    config: PathBuf,

    /// Path to the handler executable or registered module
    #[arg(short, long, global = true, env = "AWSLOCAL_LAMBDA_PATH")]
    lambda_path: Option<String>,

    /// Handler export name
    #[arg(long, global = true, env = "AWSLOCAL_LAMBDA_HANDLER")]
    lambda_handler: Option<String>,

    /// Handler timeout in seconds
    #[arg(short, long, global = true, allow_negative_numbers = true, env = "AWSLOCAL_TIMEOUT")]
    timeout: Option<i64>,

    /// Path to the .env file
    #[arg(short, long, global = true, env = "AWSLOCAL_ENV_PATH")]
    env_path: Option<String>,

    /// AWS profile
    #[arg(short, long, global = true, env = "AWSLOCAL_PROFILE")]
    profile: Option<String>,

    /// AWS region
    #[arg(short, long, global = true, env = "AWSLOCAL_REGION")]
    region: Option<String>,

    /// Port to listen on
    #[arg(short = 'P', long, global = true, allow_negative_numbers = true, env = "AWSLOCAL_PORT")]
    port: Option<i64>,

    /// Host to bind to
    #[arg(long, global = true, env = "AWSLOCAL_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "AWSLOCAL_LOG_LEVEL")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the invoke endpoints (default)
    Server,

    /// Invoke the handler once with an event file
    Local {
        /// Path to the event file json
        #[arg(short = 'E', long, default_value = "test-event.json")]
        event_path: PathBuf,
    },

    /// Create the awslocal settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl From<&GlobalArgs> for ConfigOverrides {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            lambda_path: args.lambda_path.clone(),
            lambda_handler: args.lambda_handler.clone(),
            timeout: args.timeout,
            env_path: args.env_path.clone(),
            profile: args.profile.clone(),
            region: args.region.clone(),
            port: args.port,
            host: args.host.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("awslocal={level},tower_http=debug", level = cli.global.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(Command::Init { force }) = &cli.command {
        Config::write_template(&cli.global.config, *force)?;
        info!(path = %cli.global.config.display(), "Created config file");
        return Ok(());
    }

    let config = Config::load(&cli.global.config)?
        .with_overrides(ConfigOverrides::from(&cli.global))
        .normalized();

    match cli.command {
        Some(Command::Local { event_path }) => local(&config, &event_path).await,
        _ => {
            info!("Starting awslocal...");
            let result = server::run(config, HandlerRegistry::new()).await;
            if let Err(e) = &result {
                error!(error = %e, "awslocal failed");
            }
            result
        }
    }
}

/// Single invocation; the result goes to stdout, an error envelope exits 1
async fn local(config: &Config, event_path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(event_path)
        .with_context(|| format!("Event file {} not found", event_path.display()))?;
    let event: Value = serde_json::from_str(&content)
        .with_context(|| format!("Event file {} is not valid JSON", event_path.display()))?;

    let invoker = server::build_invoker(config, HandlerRegistry::new())?;
    match invoker.invoke(event).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_envelope().to_value())?);
            std::process::exit(1);
        }
    }
}
