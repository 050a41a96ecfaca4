//! Exchange Engine Binary
//!
//! Starts the HTTP façade in front of the multi-tenant exchange manager.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin exchange-engine
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG_PATH`: path to the YAML config file (default: `config.yaml`,
//!   silently skipped if absent — built-in defaults apply).
//! - `HTTP_PORT`: overrides `server.http_port`.
//! - `DATABASE_PATH`: overrides `persistence.database_path`.
//! - `RUST_LOG`: log level (default: `info`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use exchange_engine::config::{self, Config};
use exchange_engine::domain::candle::Timeframe;
use exchange_engine::ledger::InMemoryBalanceLedger;
use exchange_engine::manager::spawn_reaper;
use exchange_engine::matching::{ClockConfig, InMemoryCandleStore};
use exchange_engine::persistence::{InMemorySnapshotStore, InMemoryUserStore, TursoStore, UserStore};
use exchange_engine::{create_router, telemetry, ApiServer, ExchangeManager};
use tokio::net::TcpListener;
use tokio::signal;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }

    let config = load_config();
    telemetry::init_telemetry(&config.observability.logging);

    tracing::info!("starting exchange engine");

    let ledger = Arc::new(InMemoryBalanceLedger::new());
    let candles = Arc::new(InMemoryCandleStore::new());
    let clock = ClockConfig {
        timeframe: Timeframe::OneHour,
        ticks_for_test: 24 * 30,
        seed_asset: exchange_engine::domain::shared::Asset::new("BTC"),
    };

    let users: Arc<dyn UserStore> = if config.persistence.enabled {
        Arc::new(TursoStore::open(&config.persistence.database_path).await?)
    } else {
        Arc::new(InMemoryUserStore::new())
    };
    let snapshots = Arc::new(InMemorySnapshotStore::new());

    let manager = Arc::new(ExchangeManager::new(ledger, candles, snapshots, clock));
    let reaper = spawn_reaper(Arc::clone(&manager));

    let api_server = ApiServer::new(Arc::clone(&manager), users);
    let app = create_router(api_server);

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.http_port)
        .parse()?;
    tracing::info!(%addr, "http server starting");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    tracing::info!("exchange engine stopped");
    Ok(())
}

fn load_config() -> Config {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = if std::path::Path::new(&path).exists() {
        match config::load_config(Some(&path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config from {path}: {e}, using defaults");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(port) = std::env::var("HTTP_PORT").ok().and_then(|v| v.parse().ok()) {
        config.server.http_port = port;
    }
    if let Ok(path) = std::env::var("DATABASE_PATH") {
        config.persistence.database_path = path;
    }

    config
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "graceful shutdown started"
    );
}
