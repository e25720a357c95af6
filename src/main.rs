use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use drivedesk::config::Config;
use drivedesk::AppState;

#[derive(Parser, Debug)]
#[command(name = "drivedesk")]
#[command(author, version, about = "Website backend and lead management for driving schools", long_about = None)]
struct Cli {
    /// Configuration file location
    #[arg(short, long, default_value = "drivedesk.toml")]
    config: PathBuf,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(short, long)]
    log_level: Option<String>,
}

/// RUST_LOG wins when set, then the CLI flag, then the config file.
fn init_tracing(cli: &Cli, config: &Config) {
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_tracing(&cli, &config);

    tracing::info!("Starting Drivedesk v{}", env!("CARGO_PKG_VERSION"));

    drivedesk::utils::ensure_dir(&config.server.data_dir)?;
    let db = drivedesk::db::init(&config.server.data_dir).await?;

    // Optionally create the configured admin account
    drivedesk::api::auth::ensure_admin_user(&db, &config).await?;

    let report = drivedesk::startup::run_startup_checks(&config, &db).await;
    if !report.all_critical_passed() {
        anyhow::bail!("Startup checks failed: {}", report.summary());
    }

    let mut state = AppState::new(config.clone(), db.clone());
    if config.metrics.enabled {
        state = state.with_metrics(drivedesk::api::metrics::init_metrics());
    }
    let state = Arc::new(state);

    drivedesk::api::rate_limit::spawn_cleanup_task(
        state.rate_limiter.clone(),
        config.rate_limit.cleanup_interval,
    );

    // API routes take priority; everything else falls through to the SPA
    let index_file = config.server.static_dir.join("index.html");
    let assets = ServeDir::new(&config.server.static_dir)
        .not_found_service(ServeFile::new(index_file));
    let app = drivedesk::api::create_router(state.clone()).fallback_service(assets);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Admin token: {}", config.auth.admin_token);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, and on SIGTERM where that exists.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    tracing::info!("Shutdown signal received");
}
