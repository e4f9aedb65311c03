use crate::config::types::{Config, LineFilter, SourceConfig};
use crate::setup::{touch_log_file, write_log_config};
use crate::source::line_buffer::DEFAULT_CAPACITY;
use crate::source::tailer::{TailError, Tailer, TailerHandle, TailerOptions};
use crate::upload::{
    CollectorTransport, DeliveryStats, HttpCollector, ServerConfig, UploadError, Uploader,
    UploaderHandle, UploaderOptions,
};
use crate::watch::{create_backend, WatchError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

/// Start-up failures. Any of these leaves the pipeline unable to run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("collector error: {0}")]
    Upload(#[from] UploadError),

    #[error("failed to write logging config {path}: {source}")]
    LogConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create log file {path}: {source}")]
    Touch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source '{source_id}': {source}")]
    Watch {
        source_id: String,
        #[source]
        source: WatchError,
    },

    #[error("source '{source_id}': {source}")]
    Tail {
        source_id: String,
        #[source]
        source: TailError,
    },

    #[error("task join error: {0}")]
    Join(#[from] JoinError),
}

/// Owns every component until [`Pipeline::start`] wires them together.
pub struct Pipeline {
    uploader: Uploader,
    sources: Vec<SourceConfig>,
    log_config: Option<PathBuf>,
    touch_files: bool,
    error_capacity: usize,
}

impl Pipeline {
    /// Build a pipeline talking HTTP to the configured collector.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let transport = Arc::new(HttpCollector::new(&config.collector)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn CollectorTransport>) -> Self {
        let options = UploaderOptions {
            retry_attempts: config.collector.retry_attempts,
            retry_interval: config.collector.retry_interval,
            queue_capacity: config.pipeline.queue_capacity,
            error_capacity: config.pipeline.error_capacity,
        };

        Self {
            uploader: Uploader::new(transport, options),
            sources: config.sources.clone(),
            log_config: config.log_config.clone(),
            touch_files: config.touch_files,
            error_capacity: config.pipeline.error_capacity,
        }
    }

    /// Boot in dependency order:
    /// 1. fetch the collector configuration
    /// 2. write the logging config and create missing log files
    /// 3. start the uploader, so the record queue is drained
    /// 4. start tailers, those replaying old content last
    pub async fn start(mut self) -> Result<RunningPipeline, PipelineError> {
        let server_config = self.uploader.fetch_config().await?;

        if let Some(path) = &self.log_config {
            write_log_config(path, &server_config.categories).map_err(|source| {
                PipelineError::LogConfig {
                    path: path.clone(),
                    source,
                }
            })?;
            info!(path = %path.display(), "Wrote logging config");
        }

        if self.touch_files {
            for source in &self.sources {
                touch_log_file(&source.path).map_err(|e| PipelineError::Touch {
                    path: source.path.clone(),
                    source: e,
                })?;
            }
        }

        let uploader = self.uploader.start();
        let mut running = RunningPipeline {
            server_config: server_config.clone(),
            uploader,
            tailers: Vec::with_capacity(self.sources.len()),
        };

        for (source, replay_existing) in startup_order(&self.sources, &server_config) {
            match start_tailer(&source, replay_existing, &running.uploader, self.error_capacity)
                .await
            {
                Ok(handle) => running.tailers.push(handle),
                Err(e) => {
                    running.stop_tailers();
                    return Err(e);
                }
            }
        }

        info!(tailers = running.tailers.len(), "Pipeline started");
        Ok(running)
    }
}

/// Sources paired with their resolved replay flag. Sources that do not
/// replay come first, each group keeping config order.
fn startup_order(sources: &[SourceConfig], server: &ServerConfig) -> Vec<(SourceConfig, bool)> {
    let (mut ordered, replaying): (Vec<_>, Vec<_>) = sources
        .iter()
        .map(|s| (s.clone(), s.replay.replays(server)))
        .partition(|(_, replay)| !replay);
    ordered.extend(replaying);
    ordered
}

async fn start_tailer(
    source: &SourceConfig,
    replay_existing: bool,
    uploader: &UploaderHandle,
    error_capacity: usize,
) -> Result<TailerHandle, PipelineError> {
    let backend =
        create_backend(source.watch, source.poll_interval).map_err(|e| PipelineError::Watch {
            source_id: source.id.clone(),
            source: e,
        })?;

    let options = TailerOptions {
        filter_bracketed: source.filter == LineFilter::Bracketed,
        replay_existing,
        buffer_capacity: DEFAULT_CAPACITY,
    };
    let tailer = Tailer::new(
        source.id.clone(),
        source.path.clone(),
        options,
        uploader.record_sender(),
    );

    tailer
        .start(backend, error_capacity)
        .await
        .map_err(|e| PipelineError::Tail {
            source_id: source.id.clone(),
            source: e,
        })
}

/// The live pipeline: one uploader and its tailers.
pub struct RunningPipeline {
    server_config: ServerConfig,
    uploader: UploaderHandle,
    tailers: Vec<TailerHandle>,
}

impl RunningPipeline {
    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    pub fn uploader_mut(&mut self) -> &mut UploaderHandle {
        &mut self.uploader
    }

    pub fn tailers_mut(&mut self) -> &mut [TailerHandle] {
        &mut self.tailers
    }

    fn stop_tailers(&self) {
        for tailer in &self.tailers {
            tailer.stop();
        }
    }

    /// Stop every tailer, then let the uploader deliver what is queued.
    pub async fn shutdown(self) -> Result<DeliveryStats, PipelineError> {
        self.stop_tailers();
        for tailer in self.tailers {
            let source_id = tailer.source_id().to_string();
            if let Err(e) = tailer.join().await {
                warn!(source_id = %source_id, error = %e, "Tailer task failed");
            }
        }
        Ok(self.uploader.shutdown().await?)
    }
}
