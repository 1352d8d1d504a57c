use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Per-chain settings. Every field except `chain_id` is optional and falls back to the
/// global default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfiguration {
    pub chain_id: String,

    /// Trusted fallback endpoint for this chain.
    #[serde(default)]
    pub altruist_url: Option<String>,

    /// Humantime duration, e.g. `"5s"`.
    #[serde(default)]
    pub altruist_request_timeout: Option<String>,

    /// Humantime duration applied to relays sent to servicers.
    #[serde(default)]
    pub pocket_request_timeout: Option<String>,

    #[serde(default)]
    pub height_check_block_tolerance: Option<u64>,

    #[serde(default)]
    pub data_integrity_check_lookback_height: Option<u64>,
}

impl ChainConfiguration {
    #[must_use]
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            altruist_url: None,
            altruist_request_timeout: None,
            pocket_request_timeout: None,
            height_check_block_tolerance: None,
            data_integrity_check_lookback_height: None,
        }
    }

    #[must_use]
    pub fn with_altruist_url(mut self, url: impl Into<String>) -> Self {
        self.altruist_url = Some(url.into());
        self
    }

    /// Altruist URL, ignoring blank values.
    #[must_use]
    pub fn altruist_url(&self) -> Option<&str> {
        self.altruist_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    /// Parsed altruist timeout; `None` when missing or unparseable.
    #[must_use]
    pub fn altruist_timeout(&self) -> Option<Duration> {
        parse_duration(self.altruist_request_timeout.as_deref())
    }

    #[must_use]
    pub fn pocket_timeout(&self) -> Option<Duration> {
        parse_duration(self.pocket_request_timeout.as_deref())
    }

    /// # Errors
    ///
    /// Returns a description of the first malformed field.
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id.trim().is_empty() {
            return Err("Chain configuration with empty chain_id".to_string());
        }

        if let Some(url) = self.altruist_url() {
            url::Url::parse(url)
                .map_err(|e| format!("Invalid altruist URL for chain {}: {e}", self.chain_id))?;
        }

        for (field, value) in [
            ("altruist_request_timeout", &self.altruist_request_timeout),
            ("pocket_request_timeout", &self.pocket_request_timeout),
        ] {
            if let Some(value) = value {
                humantime::parse_duration(value).map_err(|e| {
                    format!("Invalid {field} for chain {}: {value} ({e})", self.chain_id)
                })?;
            }
        }

        Ok(())
    }
}

fn parse_duration(value: Option<&str>) -> Option<Duration> {
    value.and_then(|v| humantime::parse_duration(v.trim()).ok())
}

pub trait ChainConfigurations: Send + Sync {
    fn get_chain_configuration(&self, chain: &str) -> Option<Arc<ChainConfiguration>>;
}

/// Chain configurations held in a swappable snapshot so they can be reloaded without
/// blocking readers on the relay path.
#[derive(Debug)]
pub struct ChainConfigurationRegistry {
    configurations: ArcSwap<HashMap<String, Arc<ChainConfiguration>>>,
}

impl ChainConfigurationRegistry {
    #[must_use]
    pub fn new(configurations: Vec<ChainConfiguration>) -> Self {
        Self { configurations: ArcSwap::from_pointee(Self::index(configurations)) }
    }

    /// Atomically replaces every configuration.
    pub fn replace(&self, configurations: Vec<ChainConfiguration>) {
        let count = configurations.len();
        self.configurations.store(Arc::new(Self::index(configurations)));
        tracing::info!(chains = count, "chain configurations replaced");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configurations.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configurations.load().is_empty()
    }

    fn index(configurations: Vec<ChainConfiguration>) -> HashMap<String, Arc<ChainConfiguration>> {
        configurations.into_iter().map(|c| (c.chain_id.clone(), Arc::new(c))).collect()
    }
}

impl ChainConfigurations for ChainConfigurationRegistry {
    fn get_chain_configuration(&self, chain: &str) -> Option<Arc<ChainConfiguration>> {
        self.configurations.load().get(chain).cloned()
    }
}
