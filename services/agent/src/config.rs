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

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_AGENT_IDENTITY: &str = "livepersona-agent";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub tavus_replica_id: String,
    pub tavus_persona_id: String,
    pub tavus_api_key: String,
    pub openai_api_key: String,
    pub system_prompt: String,
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub agent_identity: String,
    pub bind_address: SocketAddr,
    pub log_level: Level,
}

/// Returns the value of `key`, or `default` when the variable is unset.
/// An empty result (after trimming) is treated as missing.
pub fn required(key: &str, default: Option<&str>) -> Result<String, ConfigError> {
    let value = std::env::var(key)
        .ok()
        .or_else(|| default.map(str::to_string))
        .unwrap_or_default();

    if value.trim().is_empty() {
        return Err(ConfigError::MissingVar(key.to_string()));
    }
    Ok(value)
}

impl AgentConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let tavus_replica_id = required("TAVUS_REPLICA_ID", None)?;
        let tavus_persona_id = required("TAVUS_PERSONA_ID", None)?;
        let openai_api_key = required("OPENAI_API_KEY", None)?;
        let system_prompt = required("ASSISTANT_SYSTEM_PROMPT", Some(DEFAULT_SYSTEM_PROMPT))?;
        let tavus_api_key = required("TAVUS_API_KEY", None)?;
        let livekit_url = required("LIVEKIT_URL", None)?;
        let livekit_api_key = required("LIVEKIT_API_KEY", None)?;
        let livekit_api_secret = required("LIVEKIT_API_SECRET", None)?;
        let agent_identity = required("AGENT_IDENTITY", Some(DEFAULT_AGENT_IDENTITY))?;

        let bind_address_str = required("AGENT_BIND_ADDRESS", Some("0.0.0.0:8081"))?;
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("AGENT_BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            tavus_replica_id,
            tavus_persona_id,
            tavus_api_key,
            openai_api_key,
            system_prompt,
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            agent_identity,
            bind_address,
            log_level,
        })
    }
}
