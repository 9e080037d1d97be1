//! lrms-web - learner records web service entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lrms_common::config::{load_config_file, AppConfig, ConfigOverrides};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lrms_web::{bootstrap, build_router};

/// Command-line arguments for lrms-web
#[derive(Parser, Debug)]
#[command(name = "lrms-web")]
#[command(about = "Learner records management web service")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to the platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Secret used to sign session cookies
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Directory holding uploaded workbooks until they are committed
    #[arg(long, env = "UPLOAD_FOLDER")]
    upload_dir: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "LRMS_BIND")]
    bind: Option<String>,

    /// Password given to the root admin account when it is first created
    #[arg(long, env = "ROOT_ADMIN_PASSWORD", hide_env_values = true)]
    root_admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolved before tracing so the config can set the log level
    let file = load_config_file(args.config.as_deref()).context("Failed to load config file")?;
    let overrides = ConfigOverrides {
        database_url: args.database_url,
        session_secret: args.session_secret,
        upload_dir: args.upload_dir,
        bind_addr: args.bind,
        root_admin_password: args.root_admin_password,
    };
    let config = AppConfig::resolve(overrides, file);
    let level = config.log_level.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lrms_web={level},lrms_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting lrms-web v{}", env!("CARGO_PKG_VERSION"));

    let bind_addr = config.bind_addr.clone();

    let state = bootstrap(config).await.context("Failed to initialize service")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("lrms-web listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
