//! Core component container for the gateway runtime.

use crate::{
    metrics::MetricsCollector,
    qos::{punish::NodePunisher, selector::NodeSelector},
    registry::{ChainConfigurationRegistry, StaticAppsRegistry},
    relayer::Relayer,
    session::CachedSessionRegistry,
};
use std::sync::Arc;

/// Container for all initialized gateway components.
///
/// Components are shared behind `Arc` and use interior mutability where needed.
#[derive(Clone)]
pub struct GatewayComponents {
    metrics_collector: Arc<MetricsCollector>,
    apps_registry: Arc<StaticAppsRegistry>,
    chain_configurations: Arc<ChainConfigurationRegistry>,
    session_registry: Arc<CachedSessionRegistry>,
    node_selector: Arc<NodeSelector>,
    punisher: Arc<NodePunisher>,
    relayer: Arc<Relayer>,
}

impl GatewayComponents {
    /// Called by `GatewayRuntimeBuilder` during initialization.
    #[must_use]
    pub fn new(
        metrics_collector: Arc<MetricsCollector>,
        apps_registry: Arc<StaticAppsRegistry>,
        chain_configurations: Arc<ChainConfigurationRegistry>,
        session_registry: Arc<CachedSessionRegistry>,
        node_selector: Arc<NodeSelector>,
        punisher: Arc<NodePunisher>,
        relayer: Arc<Relayer>,
    ) -> Self {
        Self {
            metrics_collector,
            apps_registry,
            chain_configurations,
            session_registry,
            node_selector,
            punisher,
            relayer,
        }
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    #[must_use]
    pub fn apps_registry(&self) -> &Arc<StaticAppsRegistry> {
        &self.apps_registry
    }

    /// Chain configurations; [`ChainConfigurationRegistry::replace`] swaps them at runtime.
    #[must_use]
    pub fn chain_configurations(&self) -> &Arc<ChainConfigurationRegistry> {
        &self.chain_configurations
    }

    #[must_use]
    pub fn session_registry(&self) -> &Arc<CachedSessionRegistry> {
        &self.session_registry
    }

    #[must_use]
    pub fn node_selector(&self) -> &Arc<NodeSelector> {
        &self.node_selector
    }

    #[must_use]
    pub fn punisher(&self) -> &Arc<NodePunisher> {
        &self.punisher
    }

    #[must_use]
    pub fn relayer(&self) -> &Arc<Relayer> {
        &self.relayer
    }
}
