use crate::upload::ServerConfig;
use crate::watch::{WatchMode, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub collector: CollectorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Where to write the producer's logging configuration. Skipped when unset.
    #[serde(default)]
    pub log_config: Option<PathBuf>,
    /// Create missing log files before tailing them.
    #[serde(default = "default_touch_files")]
    pub touch_files: bool,
    pub sources: Vec<SourceConfig>,
}

fn default_touch_files() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub url: String,
    /// May be left out and given on the command line instead.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

pub const DEFAULT_COLLECTOR_URL: &str = "https://histone.herokuapp.com/hsreporter.json";

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            error_capacity: default_error_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_error_capacity() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub filter: LineFilter,
    #[serde(default)]
    pub replay: ReplayMode,
    #[serde(default)]
    pub watch: WatchMode,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFilter {
    #[default]
    None,
    /// Keep only lines starting with `[`.
    Bracketed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Start at the end of the file.
    #[default]
    Never,
    /// Upload the file's existing content first.
    Always,
    /// Replay only when the collector asks for existing data.
    #[serde(rename = "if_requested")]
    IfRequested,
}

impl ReplayMode {
    pub fn replays(self, server: &ServerConfig) -> bool {
        match self {
            ReplayMode::Never => false,
            ReplayMode::Always => true,
            ReplayMode::IfRequested => server.existing_data_requested,
        }
    }
}
