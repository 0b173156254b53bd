//! Fraud analytics - query, report and dashboard service

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fraud_analytics::config::{Config, LogFormat};
use fraud_analytics::routes;
use fraud_analytics::state::AppState;
use fraud_analytics::tasks::{dashboard_poll, report_scheduler};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraud_analytics=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);

    let listen_addr = config.listen_addr;
    let dashboard_poll = config.dashboard_poll;
    let scheduler_interval = config.scheduler_interval;

    // Create application state
    let state = match AppState::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialise backends");
            std::process::exit(1);
        }
    };

    // Spawn background tasks
    // 1. Dashboard poll - keeps the live analytics snapshot fresh
    match dashboard_poll {
        Some(period) => {
            tokio::spawn(dashboard_poll::dashboard_poll_task(state.clone(), period));
        }
        None => info!("DASHBOARD_POLL_SECS=0, dashboard polling disabled"),
    }

    // 2. Report scheduler - exports scheduled reports when due
    match scheduler_interval {
        Some(period) => {
            tokio::spawn(report_scheduler::report_scheduler_task(state.clone(), period));
        }
        None => info!("SCHEDULER_INTERVAL_SECS=0, report scheduler disabled"),
    }

    info!(
        "Fraud analytics v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        listen_addr
    );
    info!(
        executor = state.executor.name(),
        store = state.store.name(),
        "Data source configured"
    );

    // Start server
    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
