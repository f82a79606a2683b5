use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::worker::decoder::SchemaVersion;

/// Chain node endpoints.
///
/// The monitor holds two connections to the node:
/// - WebSocket: the long-lived log subscription session
/// - HTTP: block header reads and auxiliary contract calls
#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    pub ws_url: String,
    pub rpc_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// A monitored launchpad contract and the event schema it emits.
#[derive(Debug, Deserialize, Clone)]
pub struct ContractSettings {
    pub address: String,
    pub schema: SchemaVersion,
}

/// Monitored contract set.
///
/// `contracts` are launchpad deployments (one filter per event signature
/// each); `pairs` are external AMM pool addresses watched for third-party
/// swap events on migrated tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorSettings {
    pub contracts: Vec<ContractSettings>,
    #[serde(default)]
    pub pairs: Vec<String>,
}

/// Connection lifecycle configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionSettings {
    /// Health probe period against the live session
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// How long a fresh session may take to confirm liveness before the
    /// connect attempt is treated as failed
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    /// Reconnect attempts before the connection is declared unrecoverable
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay between reconnect attempts (backoff base)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Backoff cap; equal to the base by default, which makes the
    /// reconnect delay fixed rather than exponential
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_max_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_delay_max_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_confirm_timeout_secs() -> u64 {
    10
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

/// Block metadata cache configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    /// Maximum number of block timestamps retained
    #[serde(default = "default_block_cache_capacity")]
    pub block_cache_capacity: usize,
    /// Fetch attempts per cache miss
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Backoff base between failed fetch attempts
    #[serde(default = "default_fetch_retry_base_ms")]
    pub fetch_retry_base_ms: u64,
    /// Backoff cap between failed fetch attempts
    #[serde(default = "default_fetch_retry_max_ms")]
    pub fetch_retry_max_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            block_cache_capacity: default_block_cache_capacity(),
            fetch_retries: default_fetch_retries(),
            fetch_retry_base_ms: default_fetch_retry_base_ms(),
            fetch_retry_max_ms: default_fetch_retry_max_ms(),
        }
    }
}

fn default_block_cache_capacity() -> usize {
    100
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_retry_base_ms() -> u64 {
    1000
}

fn default_fetch_retry_max_ms() -> u64 {
    10_000
}

/// Redpanda (Kafka-compatible) pub/sub configuration.
///
/// When enabled, canonical token events stream to Redpanda topics for
/// external consumers.
#[derive(Debug, Deserialize, Clone)]
pub struct RedpandaSettings {
    /// Enable/disable Redpanda publishing
    #[serde(default)]
    pub enabled: bool,
    /// Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[serde(default = "default_redpanda_brokers")]
    pub brokers: String,
    /// Topic name prefix (topics: {prefix}.created, {prefix}.trade, {prefix}.migrated)
    #[serde(default = "default_redpanda_topic_prefix")]
    pub topic_prefix: String,
}

fn default_redpanda_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_redpanda_topic_prefix() -> String {
    "curvecast".to_string()
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub node: NodeSettings,
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub redpanda: Option<RedpandaSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
