use std::{path::Path, process::ExitCode, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use keel::{
    AppParts, DrainOutcome, LifecycleManager, LiveConnector, SubsystemProvisioner, asset_source,
    build_app,
    config::{AppConfig, ConfigValidator, load_config, loader::STARTER_CONFIG},
    metrics, tracing_setup,
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the dashboard backend (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config),
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve_command(&config).await,
        None => serve_command(&args.config).await,
    }
}

async fn serve_command(config_path: &str) -> Result<ExitCode> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ConfigValidator::validate(&config).map_err(|e| eyre!("Invalid configuration: {e}"))?;

    tracing_setup::init_tracing(config.server.env)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    let metrics_handle = metrics::init_metrics()?;

    tracing::info!(
        config = config_path,
        env = ?config.server.env,
        version = env!("CARGO_PKG_VERSION"),
        "Starting keel"
    );

    let config = Arc::new(config);
    let deps = match SubsystemProvisioner::new(&config, &LiveConnector).provision().await {
        Ok(deps) => Arc::new(deps),
        Err(e) => {
            tracing::error!(subsystem = e.subsystem(), error = %e, "Provisioning failed");
            return Err(e).wrap_err("failed to provision subsystems");
        }
    };

    let lifecycle = LifecycleManager::new(deps.clone(), config.server.grace_period());
    lifecycle.start().await?;

    let app = match build_app(AppParts {
        config: config.clone(),
        deps: deps.clone(),
        assets: asset_source(&config),
        metrics: metrics_handle,
        shutdown: lifecycle.shutdown_token(),
    }) {
        Ok(app) => app,
        Err(e) => {
            deps.close().await;
            return Err(e);
        }
    };

    let bind_address = config.server.bind_address();
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            deps.close().await;
            return Err(e).wrap_err_with(|| format!("Failed to bind {bind_address}"));
        }
    };

    match lifecycle.run(listener, app).await? {
        DrainOutcome::Drained => tracing::info!("Shutdown complete"),
        DrainOutcome::TimedOut { remaining } => {
            tracing::warn!(remaining, "Shutdown complete, some requests were cut off")
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_config_command(config_path: &str) -> Result<ExitCode> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        return Ok(ExitCode::FAILURE);
    }

    let config: AppConfig = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match ConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.server.bind_address());
            println!("   • Mode: {:?}", config.server.env);
            println!("   • Storage: {}", config.server.db_type);
            println!("   • Cache: {}", config.redis.enable);
            println!("   • Containers: {}", config.docker.enable);
            println!("   • Kubernetes: {}", config.kubernetes.enable);
            println!("   • Rate Limits: {}", config.server.rate_limits.len());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn init_config_command(config_path: &str) -> Result<ExitCode> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        return Ok(ExitCode::FAILURE);
    }

    tokio::fs::write(path, STARTER_CONFIG)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'keel serve --config {config_path}' to start the server");
    Ok(ExitCode::SUCCESS)
}
