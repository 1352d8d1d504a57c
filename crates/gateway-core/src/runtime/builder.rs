//! Builder pattern for initializing the gateway runtime.

use crate::{
    config::AppConfig,
    metrics::MetricsCollector,
    pocket::{BlockHeightProvider, HttpPocketClient, PocketDispatcher, PocketRelayer},
    qos::{
        checks::{default_jobs, CheckContext, CheckSettings},
        family::ChainFamilies,
        punish::{ErrorClassifier, NodePunisher, Penalties},
        selector::NodeSelector,
    },
    registry::{ChainConfigurationRegistry, StaticAppsRegistry},
    relayer::{AltruistClient, Relayer},
    session::CachedSessionRegistry,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{lifecycle::GatewayRuntime, GatewayComponents};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Metrics collector initialization failed
    #[error("Failed to initialize metrics collector: {0}")]
    MetricsInitialization(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The pocket client could not be created
    #[error("Failed to initialize pocket client: {0}")]
    PocketClient(String),

    /// Generic initialization error
    #[error("Runtime initialization failed: {0}")]
    Initialization(String),
}

/// Network collaborators the runtime talks through.
#[derive(Clone)]
struct PocketClients {
    dispatcher: Arc<dyn PocketDispatcher>,
    relayer: Arc<dyn PocketRelayer>,
    height_provider: Arc<dyn BlockHeightProvider>,
}

#[derive(Clone)]
struct RuntimeOptions {
    enable_session_primer: bool,
    enable_cache_sweeper: bool,
    enable_qos_checks: bool,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            enable_session_primer: true,
            enable_cache_sweeper: true,
            enable_qos_checks: true,
            shutdown_channel_capacity: 16,
        }
    }
}

/// Builder for constructing a [`GatewayRuntime`].
///
/// Without [`with_pocket_client`](Self::with_pocket_client) an [`HttpPocketClient`] is
/// created against `pocket.full_node_host`.
pub struct GatewayRuntimeBuilder {
    config: Option<AppConfig>,
    clients: Option<PocketClients>,
    options: RuntimeOptions,
}

impl GatewayRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, clients: None, options: RuntimeOptions::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `client` for dispatch, relays and block height.
    #[must_use]
    pub fn with_pocket_client<C>(mut self, client: Arc<C>) -> Self
    where
        C: PocketDispatcher + PocketRelayer + BlockHeightProvider + 'static,
    {
        self.clients = Some(PocketClients {
            dispatcher: client.clone(),
            relayer: client.clone(),
            height_provider: client,
        });
        self
    }

    #[must_use]
    pub fn disable_session_primer(mut self) -> Self {
        self.options.enable_session_primer = false;
        self
    }

    #[must_use]
    pub fn disable_cache_sweeper(mut self) -> Self {
        self.options.enable_cache_sweeper = false;
        self
    }

    /// Disables the QoS check scheduler. Nodes then stay unsynced, so every relay goes to
    /// the altruist unless checks are run by hand.
    #[must_use]
    pub fn disable_qos_checks(mut self) -> Self {
        self.options.enable_qos_checks = false;
        self
    }

    /// Disables every background loop.
    #[must_use]
    pub fn disable_background_tasks(self) -> Self {
        self.disable_session_primer().disable_cache_sweeper().disable_qos_checks()
    }

    /// Sets custom shutdown channel capacity (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    /// Builds the runtime, initializing all components and starting background tasks.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError` if configuration is missing or invalid, or a component
    /// fails to initialize.
    pub fn build(self) -> Result<GatewayRuntime, RuntimeError> {
        let config = self.config.ok_or_else(|| {
            RuntimeError::ConfigValidation("No configuration provided".to_string())
        })?;

        config.validate().map_err(RuntimeError::ConfigValidation)?;

        info!(
            applications_count = config.applications.len(),
            chains_count = config.chains.len(),
            chain_network = ?config.pocket.chain_network,
            session_primer_enabled = self.options.enable_session_primer,
            qos_checks_enabled = self.options.enable_qos_checks,
            "Initializing gateway runtime"
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(self.options.shutdown_channel_capacity);

        let metrics_collector = Arc::new(
            MetricsCollector::new()
                .map_err(|e| RuntimeError::MetricsInitialization(e.to_string()))?,
        );
        debug!("Metrics collector initialized");

        let clients = match self.clients {
            Some(clients) => clients,
            None => {
                let client = Arc::new(
                    HttpPocketClient::new(
                        &config.pocket.full_node_host,
                        config.pocket.request_timeout(),
                    )
                    .map_err(|e| RuntimeError::PocketClient(e.to_string()))?,
                );
                PocketClients {
                    dispatcher: client.clone(),
                    relayer: client.clone(),
                    height_provider: client,
                }
            }
        };
        debug!(full_node_host = %config.pocket.full_node_host, "Pocket client initialized");

        let apps_registry = Arc::new(StaticAppsRegistry::from_config(&config.applications));
        let chain_configurations = Arc::new(ChainConfigurationRegistry::new(config.chains.clone()));
        debug!(
            applications = apps_registry.len(),
            chains = chain_configurations.len(),
            "Registries initialized"
        );

        let session_registry = Arc::new(CachedSessionRegistry::new(
            clients.dispatcher.clone(),
            clients.height_provider.clone(),
            apps_registry.clone(),
            metrics_collector.clone(),
            &config.session,
        ));
        debug!("Session registry initialized");

        let classifier = ErrorClassifier::with_overrides(&config.qos.classification);
        debug!(
            classifier_version = classifier.version(),
            rules = classifier.rules().len(),
            "Error classifier initialized"
        );
        let punisher = Arc::new(NodePunisher::new(
            classifier,
            Penalties::from(&config.qos.penalties),
            metrics_collector.clone(),
        ));

        let check_context = Arc::new(CheckContext {
            relayer: clients.relayer.clone(),
            chain_configurations: chain_configurations.clone(),
            families: ChainFamilies::new(config.pocket.chain_network, &config.qos.families),
            punisher: punisher.clone(),
            metrics: metrics_collector.clone(),
            settings: CheckSettings::from(&config.qos),
        });
        let node_selector = Arc::new(NodeSelector::new(
            session_registry.clone(),
            default_jobs(&check_context),
            metrics_collector.clone(),
            config.qos.scheduler_interval(),
        ));
        debug!("Node selector initialized");

        let altruist = AltruistClient::new(
            config.altruist.user_agent.clone(),
            config.altruist.request_timeout(),
        )
        .map_err(|e| RuntimeError::Initialization(format!("Altruist client: {e}")))?;
        let relayer = Arc::new(Relayer::new(
            clients.relayer,
            node_selector.clone(),
            chain_configurations.clone(),
            punisher.clone(),
            altruist,
            metrics_collector.clone(),
        ));
        debug!("Relayer initialized");

        let components = GatewayComponents::new(
            metrics_collector,
            apps_registry,
            chain_configurations,
            session_registry,
            node_selector,
            punisher,
            relayer,
        );
        let runtime = GatewayRuntime::new(
            components,
            shutdown_tx,
            config,
            self.options.enable_session_primer,
            self.options.enable_cache_sweeper,
            self.options.enable_qos_checks,
        );

        info!("Gateway runtime initialization complete");

        Ok(runtime)
    }
}

impl Default for GatewayRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
