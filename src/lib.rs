pub mod background;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod state;

use crate::background::start_purge_worker;
use crate::config::Config;
use crate::error::AppError;
use crate::infra::factory::bootstrap_state;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_logging(log_dir: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "eventlink.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("info,eventlink_core=debug"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized. Writing JSON logs to {}", log_dir);
    guard
}

/// Boots the core, keeps the purge worker running until Ctrl-C, then stops it.
pub async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let _guard = init_logging(&config.log_dir);

    let state = Arc::new(bootstrap_state(&config).await?);
    let worker = start_purge_worker(state.clone());

    info!("EventLink core ready");
    let signal = tokio::signal::ctrl_c().await;

    info!("Shutting down...");
    worker.shutdown().await;
    signal.map_err(|e| AppError::InternalWithMsg(format!("Failed to listen for shutdown signal: {}", e)))
}
