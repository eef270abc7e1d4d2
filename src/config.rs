//! Configuration management for Floodgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::ratelimit::FailMode;

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Coordination store configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Limits applied to keys with no config record in the store
    #[serde(default)]
    pub limits: DefaultLimits,

    /// Hot-key mitigation layer configuration
    #[serde(default)]
    pub hot_keys: HotKeyConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP API to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Coordination store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Deadline for a single store call in milliseconds; expiry is treated
    /// as a store failure
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Behavior when the store is unreachable
    #[serde(default)]
    pub fail_mode: FailMode,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            command_timeout_ms: default_command_timeout_ms(),
            fail_mode: FailMode::default(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_command_timeout_ms() -> u64 {
    2000
}

/// Bucket parameters for keys with no `<key>:config` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLimits {
    /// Bucket capacity in tokens
    #[serde(default = "default_capacity")]
    pub capacity: u64,

    /// Refill rate in tokens per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
}

impl Default for DefaultLimits {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_rate: default_refill_rate(),
        }
    }
}

fn default_capacity() -> u64 {
    10
}

fn default_refill_rate() -> f64 {
    5.0
}

/// Hot-key mitigation layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotKeyConfig {
    /// Shards per logical key
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,

    /// Capacity of each local shard bucket
    #[serde(default = "default_shard_capacity")]
    pub capacity: u64,

    /// Refill rate of each local shard bucket in tokens per second
    #[serde(default = "default_shard_refill_rate")]
    pub refill_rate: f64,
}

impl Default for HotKeyConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            capacity: default_shard_capacity(),
            refill_rate: default_shard_refill_rate(),
        }
    }
}

fn default_shard_count() -> u32 {
    4
}

fn default_shard_capacity() -> u64 {
    5
}

fn default_shard_refill_rate() -> f64 {
    5.0
}

impl FloodgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FloodgateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::FloodgateError::Config(e.to_string()))?;
        Ok(config)
    }
}
