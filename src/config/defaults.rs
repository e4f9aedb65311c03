//! Default locations for a standard Hearthstone install, and the config used
//! when no config file exists.

use super::types::*;
use crate::watch::{WatchMode, DEFAULT_POLL_INTERVAL};
use std::path::PathBuf;
use std::time::Duration;

/// Hearthstone's logging configuration file.
pub fn default_log_config_file() -> PathBuf {
    if cfg!(windows) {
        dirs::data_local_dir()
            .unwrap_or_default()
            .join("Blizzard")
            .join("Hearthstone")
            .join("log.config")
    } else {
        home()
            .join("Library")
            .join("Preferences")
            .join("Blizzard")
            .join("Hearthstone")
            .join("log.config")
    }
}

/// The game's Unity player log.
pub fn default_game_log_file() -> PathBuf {
    if cfg!(windows) {
        let program_files = if cfg!(target_pointer_width = "64") {
            "Program Files (x86)"
        } else {
            "Program Files"
        };
        PathBuf::from("C:\\")
            .join(program_files)
            .join("Hearthstone")
            .join("Hearthstone_Data")
            .join("output_log.txt")
    } else {
        home().join("Library").join("Logs").join("Unity").join("Player.log")
    }
}

/// The game's network log, written next to the player log.
pub fn default_net_log_file() -> PathBuf {
    default_game_log_file().with_file_name("net.log")
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

/// Values that override the config file, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub server_url: Option<String>,
    pub log_config: Option<PathBuf>,
    pub game_log_file: Option<PathBuf>,
    pub net_log_file: Option<PathBuf>,
}

impl Overrides {
    /// Apply to a loaded config. File paths replace the source with the
    /// matching id.
    pub fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.collector.token = token.clone();
        }
        if let Some(url) = &self.server_url {
            config.collector.url = url.clone();
        }
        if let Some(log_config) = &self.log_config {
            config.log_config = Some(log_config.clone());
        }
        if let Some(path) = &self.game_log_file {
            set_source_path(config, game_source(path.clone()));
        }
        if let Some(path) = &self.net_log_file {
            set_source_path(config, net_source(path.clone()));
        }
    }
}

fn set_source_path(config: &mut Config, source: SourceConfig) {
    match config.sources.iter_mut().find(|s| s.id == source.id) {
        Some(existing) => existing.path = source.path,
        None => config.sources.push(source),
    }
}

/// The game log is noisy. Every useful line starts with a `[Category]`
/// marker, so it is filtered. Old content is uploaded only on request.
pub fn game_source(path: PathBuf) -> SourceConfig {
    SourceConfig {
        id: "game".to_string(),
        path,
        filter: LineFilter::Bracketed,
        replay: ReplayMode::IfRequested,
        watch: WatchMode::Auto,
        poll_interval: DEFAULT_POLL_INTERVAL,
    }
}

/// The network log is short and its category marker follows a date, so it
/// is not filtered. Its beginning holds region information, so it is always
/// replayed.
pub fn net_source(path: PathBuf) -> SourceConfig {
    SourceConfig {
        id: "net".to_string(),
        path,
        filter: LineFilter::None,
        replay: ReplayMode::Always,
        watch: WatchMode::Auto,
        poll_interval: DEFAULT_POLL_INTERVAL,
    }
}

/// Config for running without a config file.
pub fn default_config(overrides: &Overrides) -> Config {
    let mut config = Config {
        collector: CollectorConfig {
            url: DEFAULT_COLLECTOR_URL.to_string(),
            token: String::new(),
            retry_attempts: 3,
            retry_interval: Duration::from_secs(1),
            timeout: None,
        },
        pipeline: PipelineConfig::default(),
        log_config: Some(default_log_config_file()),
        touch_files: true,
        sources: vec![
            game_source(default_game_log_file()),
            net_source(default_net_log_file()),
        ],
    };
    overrides.apply(&mut config);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_ships_game_and_net_logs() {
        let config = default_config(&Overrides::default());
        assert_eq!(config.collector.url, DEFAULT_COLLECTOR_URL);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].id, "game");
        assert_eq!(config.sources[0].filter, LineFilter::Bracketed);
        assert_eq!(config.sources[1].id, "net");
        assert_eq!(config.sources[1].path, default_net_log_file());
        assert_eq!(config.sources[1].replay, ReplayMode::Always);
        assert!(config.log_config.is_some());
    }

    #[test]
    fn test_net_log_beside_game_log() {
        assert_eq!(
            default_net_log_file().parent(),
            default_game_log_file().parent()
        );
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = Overrides {
            token: Some("abc".to_string()),
            server_url: Some("http://localhost:8080/report".to_string()),
            game_log_file: Some(PathBuf::from("/tmp/game.log")),
            net_log_file: Some(PathBuf::from("/tmp/net.log")),
            ..Overrides::default()
        };
        let config = default_config(&overrides);

        assert_eq!(config.collector.token, "abc");
        assert_eq!(config.collector.url, "http://localhost:8080/report");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].path, PathBuf::from("/tmp/game.log"));
        assert_eq!(config.sources[1].id, "net");
        assert_eq!(config.sources[1].replay, ReplayMode::Always);
    }
}
