pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# HSREPORTER CONFIGURATION
# =============================================================================
# Tails log files and uploads new lines to a collector over HTTP.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/hsreporter/config.yml
#   3. /etc/hsreporter/config.yml
#
# Values written as $env{...} are replaced with the named environment
# variable. ~ expands to the home directory in paths.

# =============================================================================
# COLLECTOR
# =============================================================================
collector:
  url: https://histone.herokuapp.com/hsreporter.json
  token: $env{HSREPORTER_TOKEN}
  # POST attempts per batch. A batch that exhausts them is kept and sent
  # again, ahead of newer lines, with the next batch.
  retry_attempts: 3
  retry_interval: 1s
  # Request timeout. Omit to use the HTTP client default.
  # timeout: 30s

# =============================================================================
# PIPELINE
# =============================================================================
pipeline:
  # Lines waiting for upload. Tailers pause when it is full.
  queue_capacity: 1024
  # Unread errors kept per component before new ones are only logged.
  error_capacity: 16

# Hearthstone's logging configuration. It is rewritten with the categories
# the collector asks for. Remove to leave it alone.
log_config: ~/Library/Preferences/Blizzard/Hearthstone/log.config

# Create missing log files so tailers can open them.
touch_files: true

# =============================================================================
# SOURCES
# =============================================================================
# Sources start in this order, except that sources replaying old content
# start after those that do not.
#
#   filter:        none | bracketed (keep lines starting with '[')
#   replay:        never | always | if_requested (by the collector)
#   watch:         auto | native | poll
#   poll_interval: tick for poll mode
sources:
  - id: net
    path: ~/Library/Logs/Unity/net.log
    filter: none
    replay: always
    watch: auto

  - id: game
    path: ~/Library/Logs/Unity/Player.log
    filter: bracketed
    replay: if_requested
    watch: poll
    poll_interval: 500ms
"#
    .to_string()
}
