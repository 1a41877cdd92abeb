// Fantasy data server entry point.
//
// Startup sequence:
// 1. Load config (seeding config/ from defaults/ on first run)
// 2. Initialize tracing (log to file, not terminal)
// 3. Open database
// 4. Bind and spawn the WebSocket server task
// 5. Wait for Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use fantasy_core::config;
use fantasy_core::db::Database;
use fantasy_server::api::ApiContext;
use fantasy_server::ws_server;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;

    init_tracing(&config.logging.filter)?;
    info!("Fantasy server starting up");
    info!(
        "Config loaded: port {}, initial budget {}",
        config.server.port,
        config.game.initial_budget()
    );

    let db = Database::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    let ctx = Arc::new(ApiContext::new(db, &config));
    let listener = ws_server::bind(config.server.port)
        .await
        .context("failed to bind WebSocket listener")?;

    let server = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ctx).await {
            error!("WebSocket server error: {e}");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");
    server.abort();

    info!("Fantasy server shut down");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("fantasy-server.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
