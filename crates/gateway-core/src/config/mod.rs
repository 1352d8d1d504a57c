//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `GATEWAY_CONFIG` env var
//! 3. **Environment variables**: `GATEWAY__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP server settings (bind address, concurrency)
//! - [`PocketConfig`]: Full node host and network
//! - [`SessionConfig`]: Session caching, priming and dispatch limits
//! - [`QosConfig`]: Health-check cadence, tolerances and penalties
//! - [`AltruistConfig`]: Fallback endpoint defaults
//! - [`ChainConfiguration`]: Per-chain altruist URL and check overrides
//! - [`ApplicationConfig`]: Staked applications the gateway relays for
//! - [`MetricsConfig`], [`LoggingConfig`]
//!
//! # Example
//!
//! ```toml
//! [pocket]
//! full_node_host = "https://full-node.example.com"
//! chain_network = "mainnet"
//!
//! [[chains]]
//! chain_id = "0021"
//! altruist_url = "https://eth-archive.example.com"
//! altruist_request_timeout = "5s"
//!
//! [[applications]]
//! id = "app-1"
//! public_key = "a1b2..."
//! address = "f00d..."
//! chains = ["0021"]
//! ```

use crate::{
    qos::{family::ChainNetwork, punish::ErrorBucket},
    registry::ChainConfiguration,
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `8080`.
    pub bind_port: u16,

    /// Maximum number of in-flight HTTP requests. Defaults to `1000`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Largest accepted relay body in bytes. Defaults to 1 MiB.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_max_concurrent_requests() -> usize {
    1000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Prometheus metrics configuration. Metrics are served at `/metrics` on the main port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the `/metrics` route is exposed. Defaults to `true`.
    pub enabled: bool,
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

/// Connection to the trusted full node used for dispatch and block height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocketConfig {
    /// Base URL of the full node.
    pub full_node_host: String,

    /// Default timeout for dispatch, height and relay calls in milliseconds.
    #[serde(default = "default_pocket_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Network the gateway serves; selects chain family ids.
    #[serde(default)]
    pub chain_network: ChainNetwork,
}

fn default_pocket_request_timeout_ms() -> u64 {
    10_000
}

impl PocketConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Session caching and priming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of blocks a session lasts. Defaults to `4`.
    #[serde(default = "default_blocks_per_session")]
    pub blocks_per_session: u64,

    /// Interval between primer rounds in milliseconds. Defaults to `5000`.
    #[serde(default = "default_primer_interval_ms")]
    pub primer_interval_ms: u64,

    /// Interval between expired-entry sweeps in milliseconds. Defaults to `15000`.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// How long cold misses fail fast after a dispatch failure, in milliseconds.
    /// Defaults to `2000`.
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,

    /// Upper bound on simultaneous dispatch calls to the full node. Defaults to `50`.
    #[serde(default = "default_max_concurrent_dispatch")]
    pub max_concurrent_dispatch: usize,

    /// Lifetime of cached sessions and node lists in seconds. Defaults to `4500`.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
}

fn default_blocks_per_session() -> u64 {
    4
}

fn default_primer_interval_ms() -> u64 {
    5_000
}

fn default_sweep_interval_ms() -> u64 {
    15_000
}

fn default_failure_backoff_ms() -> u64 {
    2_000
}

fn default_max_concurrent_dispatch() -> usize {
    50
}

fn default_session_ttl_seconds() -> u64 {
    4_500
}

impl SessionConfig {
    #[must_use]
    pub fn primer_interval(&self) -> Duration {
        Duration::from_millis(self.primer_interval_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    #[must_use]
    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }
}

/// Timeouts applied to nodes, by cause, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// Kickable errors: evidence sealed, over-service, wrong servicer, certificates.
    #[serde(default = "default_kick_seconds")]
    pub kick_seconds: u64,

    /// Connection errors, 5xx, timeouts and stale heights.
    #[serde(default = "default_transient_seconds")]
    pub transient_seconds: u64,

    #[serde(default = "default_out_of_sync_seconds")]
    pub out_of_sync_seconds: u64,

    #[serde(default = "default_data_integrity_seconds")]
    pub data_integrity_seconds: u64,
}

fn default_kick_seconds() -> u64 {
    3_600
}

fn default_transient_seconds() -> u64 {
    15
}

fn default_out_of_sync_seconds() -> u64 {
    300
}

fn default_data_integrity_seconds() -> u64 {
    900
}

/// Chain ids served by non-EVM families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainFamilyConfig {
    #[serde(default = "default_solana_mainnet")]
    pub solana_mainnet: Vec<String>,
    #[serde(default = "default_solana_testnet")]
    pub solana_testnet: Vec<String>,
    #[serde(default = "default_pokt_mainnet")]
    pub pokt_mainnet: Vec<String>,
    #[serde(default = "default_pokt_testnet")]
    pub pokt_testnet: Vec<String>,
}

fn default_solana_mainnet() -> Vec<String> {
    vec!["0006".to_string(), "C006".to_string()]
}

fn default_solana_testnet() -> Vec<String> {
    vec!["0008".to_string()]
}

fn default_pokt_mainnet() -> Vec<String> {
    vec!["0001".to_string()]
}

fn default_pokt_testnet() -> Vec<String> {
    vec!["0013".to_string()]
}

/// Extra classification rule matched against the error text before the built-in table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOverride {
    /// Case-insensitive substring of the error message.
    pub contains: String,
    pub bucket: ErrorBucket,
}

/// Health-check scheduling and node punishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QosConfig {
    /// Tick of the check scheduler in milliseconds. Defaults to `1000`.
    #[serde(default = "default_scheduler_interval_ms")]
    pub scheduler_interval_ms: u64,

    /// Minimum spacing between two runs of the same check job. Defaults to `1000`.
    #[serde(default = "default_job_interval_ms")]
    pub job_interval_ms: u64,

    /// How long a node's height result stays fresh, in seconds. Defaults to `300`.
    #[serde(default = "default_height_check_interval_seconds")]
    pub height_check_interval_seconds: u64,

    /// How long a node's data-integrity result stays fresh, in seconds. Defaults to `600`.
    #[serde(default = "default_data_integrity_check_interval_seconds")]
    pub data_integrity_check_interval_seconds: u64,

    /// Robust z-score above which a reported height is discarded. Defaults to `3.0`.
    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,

    /// Blocks a node may trail consensus before it is out of sync. Defaults to `100`.
    #[serde(default = "default_height_tolerance")]
    pub default_height_tolerance: u64,

    /// Blocks behind the source node used for data-integrity checks. Defaults to `25`.
    #[serde(default = "default_lookback_height")]
    pub default_lookback_height: u64,

    #[serde(default)]
    pub penalties: PenaltyConfig,

    #[serde(default)]
    pub families: ChainFamilyConfig,

    #[serde(default)]
    pub classification: Vec<ClassificationOverride>,
}

fn default_scheduler_interval_ms() -> u64 {
    1_000
}

fn default_job_interval_ms() -> u64 {
    1_000
}

fn default_height_check_interval_seconds() -> u64 {
    300
}

fn default_data_integrity_check_interval_seconds() -> u64 {
    600
}

fn default_zscore_threshold() -> f64 {
    3.0
}

fn default_height_tolerance() -> u64 {
    100
}

fn default_lookback_height() -> u64 {
    25
}

impl QosConfig {
    #[must_use]
    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }

    #[must_use]
    pub fn job_interval(&self) -> Duration {
        Duration::from_millis(self.job_interval_ms)
    }
}

/// Defaults for the trusted fallback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AltruistConfig {
    /// Timeout when a chain has no override, in milliseconds. Defaults to `10000`.
    #[serde(default = "default_altruist_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_altruist_user_agent")]
    pub user_agent: String,
}

fn default_altruist_request_timeout_ms() -> u64 {
    10_000
}

fn default_altruist_user_agent() -> String {
    "pokt-gateway".to_string()
}

impl AltruistConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// A staked application the gateway relays on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub id: String,
    pub public_key: String,
    pub address: String,
    /// Chains the application is staked for.
    #[serde(default)]
    pub chains: Vec<String>,
}

/// Root application configuration containing all subsystem settings.
///
/// Loaded with the `GATEWAY` prefix for environment overrides using `__` as a separator,
/// e.g. `GATEWAY__POCKET__FULL_NODE_HOST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment (e.g., "development", "production"). Defaults to `"development"`.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub pocket: PocketConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub qos: QosConfig,

    #[serde(default)]
    pub altruist: AltruistConfig,

    #[serde(default)]
    pub chains: Vec<ChainConfiguration>,

    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: 8080,
            max_concurrent_requests: default_max_concurrent_requests(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            full_node_host: "http://127.0.0.1:8081".to_string(),
            request_timeout_ms: default_pocket_request_timeout_ms(),
            chain_network: ChainNetwork::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            blocks_per_session: default_blocks_per_session(),
            primer_interval_ms: default_primer_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            max_concurrent_dispatch: default_max_concurrent_dispatch(),
            session_ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            kick_seconds: default_kick_seconds(),
            transient_seconds: default_transient_seconds(),
            out_of_sync_seconds: default_out_of_sync_seconds(),
            data_integrity_seconds: default_data_integrity_seconds(),
        }
    }
}

impl Default for ChainFamilyConfig {
    fn default() -> Self {
        Self {
            solana_mainnet: default_solana_mainnet(),
            solana_testnet: default_solana_testnet(),
            pokt_mainnet: default_pokt_mainnet(),
            pokt_testnet: default_pokt_testnet(),
        }
    }
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_ms: default_scheduler_interval_ms(),
            job_interval_ms: default_job_interval_ms(),
            height_check_interval_seconds: default_height_check_interval_seconds(),
            data_integrity_check_interval_seconds: default_data_integrity_check_interval_seconds(),
            zscore_threshold: default_zscore_threshold(),
            default_height_tolerance: default_height_tolerance(),
            default_lookback_height: default_lookback_height(),
            penalties: PenaltyConfig::default(),
            families: ChainFamilyConfig::default(),
            classification: Vec::new(),
        }
    }
}

impl Default for AltruistConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_altruist_request_timeout_ms(),
            user_agent: default_altruist_user_agent(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            pocket: PocketConfig::default(),
            session: SessionConfig::default(),
            qos: QosConfig::default(),
            altruist: AltruistConfig::default(),
            chains: Vec::new(),
            applications: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `GATEWAY__` prefix can override any configuration
    /// value. Use `__` as a separator for nested fields (e.g., `GATEWAY__SERVER__BIND_PORT=8080`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.bind_address", "127.0.0.1")?
            .set_default("server.bind_port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.enabled", true)?
            .set_default("pocket.full_node_host", "http://127.0.0.1:8081")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `GATEWAY_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.pocket.full_node_host.is_empty() {
            return Err("Full node host must be configured".to_string());
        }
        url::Url::parse(&self.pocket.full_node_host)
            .map_err(|e| format!("Invalid full node host {}: {e}", self.pocket.full_node_host))?;

        if self.pocket.request_timeout_ms == 0 {
            return Err("Pocket request timeout must be greater than 0".to_string());
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if self.session.blocks_per_session == 0 {
            return Err("Blocks per session must be greater than 0".to_string());
        }

        if self.session.primer_interval_ms == 0 || self.session.sweep_interval_ms == 0 {
            return Err("Session primer and sweep intervals must be greater than 0".to_string());
        }

        if self.session.max_concurrent_dispatch == 0 {
            return Err("Max concurrent dispatch must be greater than 0".to_string());
        }

        if self.session.session_ttl_seconds == 0 {
            return Err("Session TTL must be greater than 0".to_string());
        }

        if self.qos.scheduler_interval_ms == 0 || self.qos.job_interval_ms == 0 {
            return Err("QoS scheduler and job intervals must be greater than 0".to_string());
        }

        if !self.qos.zscore_threshold.is_finite() || self.qos.zscore_threshold <= 0.0 {
            return Err("Z-score threshold must be a positive number".to_string());
        }

        if self.altruist.request_timeout_ms == 0 {
            return Err("Altruist request timeout must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            chain.validate()?;
            if !chain_ids.insert(chain.chain_id.as_str()) {
                return Err(format!("Duplicate chain configuration: {}", chain.chain_id));
            }
        }

        let mut public_keys = HashSet::new();
        for app in &self.applications {
            if app.public_key.is_empty() {
                return Err(format!("Empty public key for application: {}", app.id));
            }
            if !public_keys.insert(app.public_key.as_str()) {
                return Err(format!("Duplicate application public key: {}", app.public_key));
            }
        }

        for rule in &self.qos.classification {
            if rule.contains.trim().is_empty() {
                return Err("Classification override must match a non-empty string".to_string());
            }
        }

        Ok(())
    }
}
