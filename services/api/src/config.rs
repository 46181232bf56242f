use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where text received on the debug socket ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    /// One line per message on standard output.
    Console,
    /// One tracing event per message.
    Log,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub sink: SinkKind,
    pub max_message_bytes: usize,
    pub console_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: Level::INFO,
            sink: SinkKind::Console,
            max_message_bytes: 64 * 1024,
            console_buffer: 64,
        }
    }
}

fn positive(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidValue(
                var.to_string(),
                format!("'{}' is not a positive integer", raw),
            )),
        },
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(raw) => raw.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            Err(_) => defaults.bind_address,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let sink_str = std::env::var("DEBUG_SINK").unwrap_or_else(|_| "console".to_string());
        let sink = match sink_str.to_lowercase().as_str() {
            "console" => SinkKind::Console,
            "log" => SinkKind::Log,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "DEBUG_SINK".to_string(),
                    format!("'{}' is not one of 'console', 'log'", sink_str),
                ));
            }
        };

        let max_message_bytes = positive("WS_MAX_MESSAGE_BYTES", defaults.max_message_bytes)?;
        let console_buffer = positive("CONSOLE_BUFFER", defaults.console_buffer)?;

        Ok(Self {
            bind_address,
            log_level,
            sink,
            max_message_bytes,
            console_buffer,
        })
    }
}
