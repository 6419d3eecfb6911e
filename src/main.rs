// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use composite_health::{
    config::{self, Config},
    health::{HealthChecker, HealthCheckerOptions},
    metrics::MetricsRegistry,
    probes,
    server::{HealthHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("composite_health=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config: Config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let collector = config
        .metrics
        .enabled
        .then(|| metrics_registry.collector());

    // Build the checker and register configured probes
    let options = HealthCheckerOptions::from(&config.health);
    info!(
        cache_ttl = ?options.effective_cache_ttl(),
        background = ?options.background_interval,
        "Creating health checker"
    );
    let checker = Arc::new(HealthChecker::new(options, collector));
    probes::register_all(&checker, &config.checkers, &config.observers)?;
    if checker.registry().is_empty() {
        warn!("No checkers or observers configured, health will always be UP");
    }

    let mut handler = HealthHandler::new(
        checker.clone(),
        &config.server.health_path,
        config.server.request_timeout(),
    );
    if config.metrics.enabled {
        info!("Serving metrics on {}", config.metrics.path);
        handler = handler.with_metrics(&config.metrics.path, metrics_registry);
    }

    info!(
        "Serving health on http://{}{}",
        config.server.listen, config.server.health_path
    );
    let served = ServerBuilder::new(config.server.listen, handler)
        .serve(shutdown_signal())
        .await;

    checker.shutdown();
    served
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
