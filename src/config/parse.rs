use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read a config file without validating it, for callers that adjust it
/// before validation.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    deserialize_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a YAML config string.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config = deserialize_config(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

fn deserialize_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;
    expand_paths(&mut config);
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error.
/// Comment lines are skipped.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| env_var_pattern().captures_iter(line))
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Expands tilde (~) in all PathBuf fields in the config.
fn expand_paths(config: &mut Config) {
    for source in &mut config.sources {
        source.path = expand_tilde(&source.path);
    }
    if let Some(log_config) = config.log_config.as_mut() {
        *log_config = expand_tilde(log_config);
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let url = config.collector.url.trim();
    if url.is_empty() {
        errors.push("collector.url must not be empty".to_string());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("collector.url '{}' must be an http(s) URL", url));
    }
    if config.collector.token.trim().is_empty() {
        errors.push("collector.token must not be empty".to_string());
    }
    if config.collector.retry_attempts == 0 {
        errors.push("collector.retry_attempts must be at least 1".to_string());
    }
    if config.pipeline.queue_capacity == 0 {
        errors.push("pipeline.queue_capacity must be at least 1".to_string());
    }
    if config.pipeline.error_capacity == 0 {
        errors.push("pipeline.error_capacity must be at least 1".to_string());
    }

    if config.sources.is_empty() {
        errors.push("at least one source must be configured".to_string());
    }
    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.id.trim().is_empty() {
            errors.push(format!(
                "source with path '{}' has an empty id",
                source.path.display()
            ));
        } else if !seen.insert(source.id.as_str()) {
            errors.push(format!("duplicate source id '{}'", source.id));
        }
        if source.path.as_os_str().is_empty() {
            errors.push(format!("source '{}' has an empty path", source.id));
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}
