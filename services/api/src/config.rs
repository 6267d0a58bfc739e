use std::net::SocketAddr;
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
pub struct ApiConfig {
    pub bind_address: SocketAddr,
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub log_level: Level,
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ApiConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("API_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("API_BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let livekit_api_key = non_empty("LIVEKIT_API_KEY")
            .ok_or_else(|| ConfigError::MissingVar("LIVEKIT_API_KEY".to_string()))?;
        let livekit_api_secret = non_empty("LIVEKIT_API_SECRET")
            .ok_or_else(|| ConfigError::MissingVar("LIVEKIT_API_SECRET".to_string()))?;
        let livekit_url = non_empty("LIVEKIT_WS_URL")
            .or_else(|| non_empty("LIVEKIT_URL"))
            .ok_or_else(|| ConfigError::MissingVar("LIVEKIT_WS_URL or LIVEKIT_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("API_BIND_ADDRESS");
            env::remove_var("LIVEKIT_API_KEY");
            env::remove_var("LIVEKIT_API_SECRET");
            env::remove_var("LIVEKIT_WS_URL");
            env::remove_var("LIVEKIT_URL");
            env::remove_var("RUST_LOG");
        }
    }

    fn set_credentials() {
        unsafe {
            env::set_var("LIVEKIT_API_KEY", "lk-key");
            env::set_var("LIVEKIT_API_SECRET", "lk-secret");
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_credentials();
        unsafe {
            env::set_var("LIVEKIT_URL", "wss://fallback.livekit.cloud");
        }

        let config = ApiConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.livekit_url, "wss://fallback.livekit.cloud");
        assert_eq!(config.livekit_api_key, "lk-key");
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_ws_url_takes_precedence() {
        clear_env_vars();
        set_credentials();
        unsafe {
            env::set_var("LIVEKIT_URL", "wss://fallback.livekit.cloud");
            env::set_var("LIVEKIT_WS_URL", "wss://preferred.livekit.cloud");
            env::set_var("API_BIND_ADDRESS", "127.0.0.1:4000");
        }

        let config = ApiConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.livekit_url, "wss://preferred.livekit.cloud");
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:4000");
    }

    #[test]
    #[serial]
    fn test_config_missing_url() {
        clear_env_vars();
        set_credentials();

        match ApiConfig::from_env().unwrap_err() {
            ConfigError::MissingVar(var) => assert!(var.contains("LIVEKIT_WS_URL")),
            _ => panic!("Expected MissingVar for the server URL"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_secret() {
        clear_env_vars();
        unsafe {
            env::set_var("LIVEKIT_API_KEY", "lk-key");
            env::set_var("LIVEKIT_URL", "wss://x.livekit.cloud");
        }

        match ApiConfig::from_env().unwrap_err() {
            ConfigError::MissingVar(var) => assert_eq!(var, "LIVEKIT_API_SECRET"),
            _ => panic!("Expected MissingVar for LIVEKIT_API_SECRET"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_credentials();
        unsafe {
            env::set_var("LIVEKIT_URL", "wss://x.livekit.cloud");
            env::set_var("RUST_LOG", "loud");
        }

        match ApiConfig::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
