use crate::config::defaults::{default_config, Overrides};
use crate::config::parse::{read_config, validate_config};
use crate::config::types::Config;
use crate::pipeline::{Pipeline, PipelineError, Receiver};
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(config_path, &overrides)?;
    run_pipeline(config).await.map_err(|e| e.into())
}

fn resolve_config(config_path: Option<PathBuf>, overrides: &Overrides) -> Result<Config, RunError> {
    let config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            let mut config = read_config(&path)?;
            overrides.apply(&mut config);
            config
        }
        None => {
            info!("No config file found, using defaults");
            default_config(overrides)
        }
    };
    validate_config(&config)?;
    Ok(config)
}

async fn run_pipeline(config: Config) -> Result<(), RunError> {
    for source in &config.sources {
        info!(
            source_id = %source.id,
            path = %source.path.display(),
            filter = ?source.filter,
            replay = ?source.replay,
            watch = ?source.watch,
            "Configured source"
        );
    }
    if let Some(path) = &config.log_config {
        info!(path = %path.display(), "Logging config");
    }

    let pipeline = Pipeline::from_config(&config)?;
    let mut running = pipeline.start().await?;
    info!(
        categories = ?running.server_config().categories,
        existing_data = running.server_config().existing_data_requested,
        "Uploading log data, press Ctrl+C to shutdown"
    );

    let mut loggers = Vec::new();
    if let Some(errors) = running.uploader_mut().errors() {
        loggers.push(spawn_error_logger("uploader".to_string(), errors));
    }
    for tailer in running.tailers_mut() {
        if let Some(errors) = tailer.errors() {
            loggers.push(spawn_error_logger(tailer.source_id().to_string(), errors));
        }
    }

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    match running.shutdown().await {
        Ok(stats) => info!(
            batches = stats.batches_delivered,
            records = stats.records_delivered,
            failed_attempts = stats.failed_attempts,
            "Pipeline shutdown complete"
        ),
        Err(e) => error!(error = %e, "Pipeline shutdown failed"),
    }

    for logger in loggers {
        logger.abort();
    }

    Ok(())
}

/// Log a component's steady-state errors for as long as it runs.
fn spawn_error_logger<E>(component: String, mut errors: Receiver<E>) -> JoinHandle<()>
where
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(e) = errors.recv().await {
            warn!(component = %component, error = %e, "Component error");
        }
    })
}
