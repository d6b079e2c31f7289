//! Process configuration shared by all four binaries, loaded via figment.

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_store_path() -> String {
    "todo-core.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 shared secret used to verify inbound bearer tokens.
    #[serde(default)]
    pub jwt_secret: String,
    /// Shared secret internal callers (regenerator, scheduler) present instead of a user token.
    #[serde(default)]
    pub internal_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            internal_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_cap")]
    pub retry_cap: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_cap: default_retry_cap(),
        }
    }
}

fn default_batch_size() -> u32 {
    50
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_retry_cap() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_cap")]
    pub retry_cap: u32,
    /// Base URL the scheduler POSTs fired jobs to; normally the Task API's own address.
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            retry_cap: default_retry_cap(),
            callback_base_url: default_callback_base_url(),
        }
    }
}

fn default_callback_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LogConfig,
}
