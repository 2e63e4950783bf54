use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{NotifyConfig, RespecConfig, RunnerConfig, SessionConfig, WatchConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("config validation error: {message}")]
    Validation { message: String },
}

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE: &str = "respec.toml";

/// Load and validate a `RespecConfig` from a TOML file path.
///
/// Returns the default config if the file does not exist.
pub fn load_config(path: &Path) -> Result<RespecConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(RespecConfig::default());
    }

    let data = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_config(&data)
}

/// Parse and validate a `RespecConfig` from a TOML string.
pub fn parse_config(data: &str) -> Result<RespecConfig, ConfigError> {
    let config: RespecConfig = toml::from_str(data)?;
    validate(&config)?;
    Ok(config)
}

/// Check invariants serde cannot express.
pub fn validate(config: &RespecConfig) -> Result<(), ConfigError> {
    if config.runner.top_spec.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "runner.top_spec must not be empty".to_string(),
        });
    }

    if config.session.program.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "session.program must not be empty".to_string(),
        });
    }

    if config.session.sandbox_glob.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "session.sandbox_glob must not be empty".to_string(),
        });
    }

    if config.session.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "session.poll_interval_ms must be > 0".to_string(),
        });
    }

    if config.session.quit_grace_ms == 0 {
        return Err(ConfigError::Validation {
            message: "session.quit_grace_ms must be > 0".to_string(),
        });
    }

    if let Some(dot_ghci) = &config.session.dot_ghci {
        if dot_ghci.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "session.dot_ghci must be \"ignore\" or a script path".to_string(),
            });
        }
    }

    if config.watch.extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "watch.extensions must list at least one extension".to_string(),
        });
    }

    Ok(())
}
