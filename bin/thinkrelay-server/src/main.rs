//! thinkrelay-server – entry point.
//!
//! Startup order:
//! 1. Parse command-line arguments and load configuration (file + env).
//! 2. Initialise structured tracing (JSON in production, pretty in dev),
//!    optionally mirrored to a daily-rolling log file.
//! 3. Open the SQLite credential store and run pending migrations.
//! 4. Build the upstream completion client.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod audit;
mod auth;
mod config;
mod entities;
mod error;
mod middleware;
mod relay;
mod routes;
mod schemas;
mod state;
mod upstream;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::TokenRegistry;
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;
use crate::upstream::OpenAiCompatClient;

/// Authenticated streaming relay for reasoning chat models.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file (default: ./config.json when present).
    #[arg(long, env = "THINKRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding file and environment.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        cfg.bind_address = bind;
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // The guard flushes the file writer on drop, so it lives until main returns.
    let _log_guard = init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "thinkrelay-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Upstream provider ───────────────────────────────────────────────────
    if cfg.upstream_key.is_empty() {
        warn!("no upstream API key configured; the provider will likely reject requests");
    }
    if cfg.models.is_empty() {
        warn!("no models configured; relay requests must name a model explicitly");
    }
    let upstream = OpenAiCompatClient::new(cfg.upstream_url.clone(), cfg.upstream_key.clone())?;
    info!(upstream = %cfg.upstream_url, models = ?cfg.models, "upstream client ready");

    // ── 5. Shared application state ────────────────────────────────────────────
    let state = Arc::new(AppState {
        tokens: Arc::new(TokenRegistry::new(cfg.token_ttl)),
        upstream: Arc::new(upstream),
        store: Arc::new(store),
        config: Arc::new(cfg.clone()),
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();
    info!(%addr, "HTTP server listening");
    info!("open http://{}:{}/ in a browser", cfg.public_host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("thinkrelay-server stopped");
    Ok(())
}

/// Install the global subscriber. Returns the file writer guard when a log
/// directory is configured.
fn init_tracing(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: THINKRELAY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_json = cfg
        .log_json
        .then(|| fmt::layer().json().with_target(true).with_thread_ids(true));
    let stdout_pretty =
        (!cfg.log_json).then(|| fmt::layer().with_target(true).with_thread_ids(true));

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "thinkrelay-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_json)
        .with(stdout_pretty)
        .with(file_layer)
        .init();

    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
