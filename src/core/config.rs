//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Environment variable holding the upstream bearer credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Longest accepted rate limit window (one day)
pub const MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration for the translation proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Chat completions URL
    pub api_endpoint: String,
    /// Model id sent upstream
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Upstream request timeout
    pub timeout_ms: u64,
    /// Per-client request limit
    pub rate_limit: RateLimitConfig,
}

/// Fixed-window rate limit settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window
    pub max_requests: u32,
    /// Window length, at most [`MAX_WINDOW_MS`]
    pub window_ms: u64,
    /// Interval between sweeps of expired records
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    /// Window length as a signed duration, clamped to [`MAX_WINDOW_MS`]
    pub fn window(&self) -> chrono::Duration {
        let millis = i64::try_from(self.window_ms.min(MAX_WINDOW_MS)).unwrap_or(i64::MAX);
        chrono::Duration::milliseconds(millis)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_ms: 60_000,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            timeout_ms: 30_000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// The API key is not stored here; see [`ProxyConfig::api_key`].
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            api_endpoint: std::env::var("API_ENDPOINT").unwrap_or(defaults.api_endpoint),
            model: std::env::var("TRANSLATION_MODEL").unwrap_or(defaults.model),
            max_tokens: env_or("MAX_TOKENS", defaults.max_tokens)?,
            temperature: env_or("TEMPERATURE", defaults.temperature)?,
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.timeout_ms)?,
            rate_limit: RateLimitConfig {
                max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit.max_requests)?,
                window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.rate_limit.window_ms)?,
                sweep_interval_secs: env_or(
                    "RATE_LIMIT_SWEEP_SECS",
                    defaults.rate_limit.sweep_interval_secs,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_endpoint.is_empty() {
            return Err(anyhow::anyhow!("API endpoint is required"));
        }

        if self.model.is_empty() {
            return Err(anyhow::anyhow!("Model is required"));
        }

        if self.max_tokens == 0 {
            return Err(anyhow::anyhow!("max_tokens must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("temperature must be between 0.0 and 2.0"));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(anyhow::anyhow!("rate limit must allow at least one request"));
        }

        if self.rate_limit.window_ms == 0 {
            return Err(anyhow::anyhow!("rate limit window must be greater than 0"));
        }

        if self.rate_limit.window_ms > MAX_WINDOW_MS {
            return Err(anyhow::anyhow!(
                "rate limit window must be at most {} ms",
                MAX_WINDOW_MS
            ));
        }

        if self.timeout_ms == 0 {
            warn!("Upstream timeout is 0; requests will fail immediately");
        }

        Ok(())
    }

    /// Read the upstream credential from the process environment
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_VAR)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}
