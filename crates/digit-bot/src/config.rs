//! Application configuration.

use crate::error::{AppError, AppResult};
use digit_strategy::StrategyConfig;
use digit_ws::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection settings, mapped onto the client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Application id appended to the endpoint query.
    pub app_id: u32,
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff (ms). Default: 2,000.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff (ms). Default: 30,000.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Keep-alive ping interval (ms). Default: 30,000.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Per-call timeout (ms). Default: 10,000.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

impl ConnectionSettings {
    /// Build the client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.url.clone(),
            app_id: self.app_id,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            ping_interval_ms: self.ping_interval_ms,
            call_timeout_ms: self.call_timeout_ms,
        }
    }
}

/// Statistics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    /// Per-symbol rolling window capacity. Default: 1,000.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

fn default_window_capacity() -> usize {
    1_000
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection settings.
    pub connection: ConnectionSettings,
    /// Statistics settings.
    #[serde(default)]
    pub stats: StatsSettings,
    /// Strategy settings.
    pub strategy: StrategyConfig,
    /// API token. Prefer the DIGITBOT_TOKEN environment variable; this
    /// field exists for development setups.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from a file when it exists, otherwise fail with a clear
    /// message; there are no usable defaults for endpoint and strategy.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            Err(AppError::Config(format!("Config file not found: {path}")))
        }
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> AppResult<()> {
        if self.connection.url.is_empty() {
            return Err(AppError::Config("connection.url must be set".to_string()));
        }
        if self.strategy.initial_stake.is_zero()
            || self.strategy.initial_stake.is_sign_negative()
        {
            return Err(AppError::Config(
                "strategy.initial_stake must be positive".to_string(),
            ));
        }
        if let Some(digit) = self.strategy.prediction {
            if digit > 9 {
                return Err(AppError::Config(
                    "strategy.prediction must be a digit 0-9".to_string(),
                ));
            }
        }
        if self.stats.window_capacity == 0 {
            return Err(AppError::Config(
                "stats.window_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
