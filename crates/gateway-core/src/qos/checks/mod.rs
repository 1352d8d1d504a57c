//! Background QoS checks.
//!
//! Each [`CheckJob`] probes one chain family. Jobs share a [`CheckContext`] holding the
//! relayer, chain configuration and punisher; the scheduler in
//! [`NodeSelector`](crate::qos::NodeSelector) hands every job the current node list of a
//! cached session and calls [`CheckJob::perform`].

pub mod consensus;
pub mod data_integrity;
pub mod height;

pub use data_integrity::DataIntegrityCheck;
pub use height::HeightCheck;

use super::{family::ChainFamilies, family::ChainFamily, node::QosNode, punish::NodePunisher};
use crate::{
    config::QosConfig, metrics::MetricsCollector, pocket::PocketRelayer,
    registry::ChainConfigurations,
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};

/// Tunables shared by every check.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub job_interval: Duration,
    pub height_check_interval: Duration,
    pub data_integrity_check_interval: Duration,
    pub zscore_threshold: f64,
    pub default_height_tolerance: u64,
    pub default_lookback_height: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self::from(&QosConfig::default())
    }
}

impl From<&QosConfig> for CheckSettings {
    fn from(config: &QosConfig) -> Self {
        Self {
            job_interval: config.job_interval(),
            height_check_interval: Duration::from_secs(config.height_check_interval_seconds),
            data_integrity_check_interval: Duration::from_secs(
                config.data_integrity_check_interval_seconds,
            ),
            zscore_threshold: config.zscore_threshold,
            default_height_tolerance: config.default_height_tolerance,
            default_lookback_height: config.default_lookback_height,
        }
    }
}

/// Dependencies shared by all checks.
pub struct CheckContext {
    pub relayer: Arc<dyn PocketRelayer>,
    pub chain_configurations: Arc<dyn ChainConfigurations>,
    pub families: ChainFamilies,
    pub punisher: Arc<NodePunisher>,
    pub metrics: Arc<MetricsCollector>,
    pub settings: CheckSettings,
}

impl CheckContext {
    /// Blocks a node may trail consensus on `chain`.
    #[must_use]
    pub fn height_tolerance(&self, chain: &str) -> u64 {
        self.chain_configurations
            .get_chain_configuration(chain)
            .and_then(|c| c.height_check_block_tolerance)
            .unwrap_or(self.settings.default_height_tolerance)
    }

    #[must_use]
    pub fn lookback_height(&self, chain: &str) -> u64 {
        self.chain_configurations
            .get_chain_configuration(chain)
            .and_then(|c| c.data_integrity_check_lookback_height)
            .unwrap_or(self.settings.default_lookback_height)
    }

    /// Per-chain relay timeout override; `None` uses the client default.
    #[must_use]
    pub fn relay_timeout(&self, chain: &str) -> Option<Duration> {
        self.chain_configurations.get_chain_configuration(chain).and_then(|c| c.pocket_timeout())
    }

    /// Whether `nodes` belong to `family`. All nodes in a list share one chain.
    fn serves(&self, nodes: &[Arc<QosNode>], family: ChainFamily) -> bool {
        nodes.first().is_some_and(|node| self.families.family_of(node.chain()) == family)
    }
}

/// `true` if `last` is unset or at least `interval` old.
pub(crate) fn is_due(last: Option<DateTime<Utc>>, interval: Duration) -> bool {
    let Some(last) = last else {
        return true;
    };
    chrono::Duration::from_std(interval).is_ok_and(|interval| Utc::now() - last >= interval)
}

/// A schedulable unit of QoS work.
pub enum CheckJob {
    Height(HeightCheck),
    DataIntegrity(DataIntegrityCheck),
}

impl CheckJob {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Height(check) => check.name(),
            Self::DataIntegrity(check) => check.name(),
        }
    }

    #[must_use]
    pub fn should_run(&self) -> bool {
        match self {
            Self::Height(check) => check.should_run(),
            Self::DataIntegrity(check) => check.should_run(),
        }
    }

    pub fn set_nodes(&mut self, nodes: Vec<Arc<QosNode>>) {
        match self {
            Self::Height(check) => check.set_nodes(nodes),
            Self::DataIntegrity(check) => check.set_nodes(nodes),
        }
    }

    pub async fn perform(&mut self) {
        match self {
            Self::Height(check) => check.perform().await,
            Self::DataIntegrity(check) => check.perform().await,
        }
    }
}

/// Height and data-integrity checks for every chain family.
#[must_use]
pub fn default_jobs(context: &Arc<CheckContext>) -> Vec<CheckJob> {
    ChainFamily::ALL
        .into_iter()
        .flat_map(|family| {
            [
                CheckJob::Height(HeightCheck::new(context.clone(), family)),
                CheckJob::DataIntegrity(DataIntegrityCheck::new(context.clone(), family)),
            ]
        })
        .collect()
}
