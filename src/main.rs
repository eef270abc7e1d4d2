use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use floodgate::config::FloodgateConfig;
use floodgate::http::{AppState, HttpServer};
use floodgate::metrics::Metrics;
use floodgate::policy::PolicyResolver;
use floodgate::ratelimit::{BucketDefaults, DistributedRateLimiter, HotKeyLimiter, RedisStore};

#[derive(Debug, Parser)]
#[command(name = "floodgate", about = "Hierarchical distributed rate limiting service")]
struct Args {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Floodgate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => FloodgateConfig::from_file(path)?,
        None => FloodgateConfig::default(),
    };
    info!(listen_addr = %config.server.listen_addr, redis_url = %config.redis.url, "Configuration loaded");

    // Process-wide metrics, shared with every component
    let metrics = Arc::new(Metrics::new());

    // Authoritative path: Redis-coordinated hierarchical limiter
    let store = RedisStore::connect(
        &config.redis.url,
        BucketDefaults {
            capacity: config.limits.capacity,
            refill_rate_per_sec: config.limits.refill_rate,
        },
        Duration::from_millis(config.redis.command_timeout_ms),
    )
    .await?;
    let authority = Arc::new(DistributedRateLimiter::new(
        Arc::new(store),
        config.redis.fail_mode,
        metrics.clone(),
    ));
    info!(fail_mode = ?config.redis.fail_mode, "Distributed limiter initialized");

    // Local fast path for skewed keys
    let hot_keys = HotKeyLimiter::new(
        config.hot_keys.shard_count,
        config.hot_keys.capacity,
        config.hot_keys.refill_rate,
        metrics.clone(),
    );

    let state = Arc::new(AppState {
        resolver: PolicyResolver::new(),
        hot_keys,
        authority,
        metrics,
    });

    let server = HttpServer::new(config.server.listen_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Floodgate Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
