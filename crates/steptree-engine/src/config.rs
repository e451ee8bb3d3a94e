//! Engine configuration.
//!
//! Loaded from environment variables with the `STEPTREE` prefix, nested
//! values separated by `__`:
//!
//! - `STEPTREE__KEY_PREFIX=threads:` -> `key_prefix = "threads:"`
//! - `STEPTREE__STATE_TTL_SECS=86400` -> `state_ttl_secs = 86400`
//! - `STEPTREE__REDIS__URL=redis://localhost:6379` -> `redis.url = ...`

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_hops must be at least 1")]
    InvalidMaxHops,

    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,
}

/// Participant-facing notices sent by the engine itself.
#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
    /// Sent when a text message arrives while a reaction is expected.
    #[serde(default = "default_react_to_continue")]
    pub react_to_continue: String,

    /// Sent when a reaction lands on a superseded message.
    #[serde(default = "default_stale_reaction")]
    pub stale_reaction: String,

    /// Sent when the active step rejects a reaction.
    #[serde(default = "default_invalid_reaction")]
    pub invalid_reaction: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            react_to_continue: default_react_to_continue(),
            stale_reaction: default_stale_reaction(),
            invalid_reaction: default_invalid_reaction(),
        }
    }
}

fn default_react_to_continue() -> String {
    "Please react with one of the above emojis to continue!".to_string()
}

fn default_stale_reaction() -> String {
    "Emoji reaction on the wrong message. Please react to your most recent message".to_string()
}

fn default_invalid_reaction() -> String {
    "In order to move to the following step please react with one of the already existing emojis"
        .to_string()
}

/// Redis configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

impl RedisConfig {
    /// Validate Redis configuration.
    ///
    /// # Errors
    /// Returns error if the URL is missing or not a redis URL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("STEPTREE__REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        Ok(())
    }
}

/// Conversation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Prepended to the participant id to form the cache key.
    #[serde(default)]
    pub key_prefix: String,

    /// Expiry of persisted state; no expiry when absent.
    #[serde(default)]
    pub state_ttl_secs: Option<u64>,

    /// Upper bound on redirects and auto-advances within one turn.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    #[serde(default)]
    pub prompts: Prompts,

    /// Redis cache settings, when the Redis backend is used.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

const fn default_max_hops() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            state_ttl_secs: None,
            max_hops: default_max_hops(),
            prompts: Prompts::default(),
            redis: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `.env` and `STEPTREE__*` environment variables.
    ///
    /// # Errors
    /// Returns error if values cannot be parsed or fail validation.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STEPTREE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns error if any value is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_hops == 0 {
            return Err(ValidationError::InvalidMaxHops);
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        Ok(())
    }

    /// State expiry as a `Duration`.
    #[must_use]
    pub fn state_ttl(&self) -> Option<Duration> {
        self.state_ttl_secs.map(Duration::from_secs)
    }

    /// Cache key for a participant.
    #[must_use]
    pub fn state_key(&self, user_id: u64) -> String {
        format!("{}{user_id}", self.key_prefix)
    }
}
