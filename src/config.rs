//! Process configuration loaded from the environment.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub listen_path: String,
    pub upstream_url: String,
    pub upstream_api_key: String,
    pub audio_commit_debounce: Duration,
    pub audio_commit_min_bytes: usize,
    pub session_updated_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let listen_address_str =
            std::env::var("LISTEN_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let listen_address = listen_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("LISTEN_ADDRESS".to_string(), e.to_string()))?;

        let listen_path = std::env::var("LISTEN_PATH").unwrap_or_else(|_| "/openai".to_string());

        let upstream_url = std::env::var("UPSTREAM_URL").unwrap_or_else(|_| {
            "wss://api.openai.com/v1/realtime?model=gpt-realtime".to_string()
        });

        let upstream_api_key = std::env::var("UPSTREAM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("UPSTREAM_API_KEY".to_string()))?;

        let audio_commit_debounce_ms = parse_env_u64("AUDIO_COMMIT_DEBOUNCE_MS", 300)?;
        let audio_commit_min_bytes = parse_env_usize("AUDIO_COMMIT_MIN_BYTES", 3200)?;
        let session_updated_timeout_secs = parse_env_u64("SESSION_UPDATED_TIMEOUT_SECS", 20)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            listen_address,
            listen_path,
            upstream_url,
            upstream_api_key,
            audio_commit_debounce: Duration::from_millis(audio_commit_debounce_ms),
            audio_commit_min_bytes,
            session_updated_timeout: Duration::from_secs(session_updated_timeout_secs),
            log_level,
        })
    }
}

fn parse_env_u64(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_env_usize(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("LISTEN_ADDRESS");
            env::remove_var("LISTEN_PATH");
            env::remove_var("UPSTREAM_URL");
            env::remove_var("UPSTREAM_API_KEY");
            env::remove_var("AUDIO_COMMIT_DEBOUNCE_MS");
            env::remove_var("AUDIO_COMMIT_MIN_BYTES");
            env::remove_var("SESSION_UPDATED_TIMEOUT_SECS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("UPSTREAM_API_KEY", "test-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.listen_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.listen_path, "/openai");
        assert_eq!(config.upstream_api_key, "test-key");
        assert_eq!(config.audio_commit_debounce, Duration::from_millis(300));
        assert_eq!(config.audio_commit_min_bytes, 3200);
        assert_eq!(config.session_updated_timeout, Duration::from_secs(20));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("LISTEN_ADDRESS", "127.0.0.1:9000");
            env::set_var("LISTEN_PATH", "/voice");
            env::set_var("UPSTREAM_URL", "wss://example.test/realtime");
            env::set_var("UPSTREAM_API_KEY", "custom-key");
            env::set_var("AUDIO_COMMIT_DEBOUNCE_MS", "150");
            env::set_var("AUDIO_COMMIT_MIN_BYTES", "1600");
            env::set_var("SESSION_UPDATED_TIMEOUT_SECS", "10");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.listen_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.listen_path, "/voice");
        assert_eq!(config.upstream_url, "wss://example.test/realtime");
        assert_eq!(config.upstream_api_key, "custom-key");
        assert_eq!(config.audio_commit_debounce, Duration::from_millis(150));
        assert_eq!(config.audio_commit_min_bytes, 1600);
        assert_eq!(config.session_updated_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("UPSTREAM_API_KEY")),
            _ => panic!("Expected MissingVar for UPSTREAM_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_listen_address() {
        clear_env_vars();
        unsafe {
            env::set_var("LISTEN_ADDRESS", "not-an-address");
            env::set_var("UPSTREAM_API_KEY", "test-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LISTEN_ADDRESS"),
            _ => panic!("Expected InvalidValue for LISTEN_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("UPSTREAM_API_KEY", "test-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
