//! Runtime lifecycle management including background tasks and graceful shutdown.

use crate::{
    config::AppConfig,
    metrics::MetricsCollector,
    qos::selector::NodeSelector,
    relayer::Relayer,
    session::CachedSessionRegistry,
};
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{builder::GatewayRuntimeBuilder, GatewayComponents};

/// Owns the gateway components and their background loops.
///
/// `shutdown()` broadcasts on the shutdown channel and waits for every loop to exit.
pub struct GatewayRuntime {
    components: GatewayComponents,
    shutdown_tx: broadcast::Sender<()>,
    config: AppConfig,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl GatewayRuntime {
    #[must_use]
    pub fn builder() -> GatewayRuntimeBuilder {
        GatewayRuntimeBuilder::new()
    }

    pub(super) fn new(
        components: GatewayComponents,
        shutdown_tx: broadcast::Sender<()>,
        config: AppConfig,
        enable_session_primer: bool,
        enable_cache_sweeper: bool,
        enable_qos_checks: bool,
    ) -> Self {
        let mut tasks = Vec::new();

        if enable_session_primer {
            let handle = components.session_registry().start_primer(shutdown_tx.subscribe());
            debug!("Session primer task started");
            tasks.push(("session_primer", handle));
        }
        if enable_cache_sweeper {
            let handle = components.session_registry().start_sweeper(shutdown_tx.subscribe());
            debug!("Session cache sweeper task started");
            tasks.push(("cache_sweeper", handle));
        }
        if enable_qos_checks {
            let handle = components.node_selector().start_with_shutdown(shutdown_tx.subscribe());
            debug!("QoS check scheduler task started");
            tasks.push(("qos_scheduler", handle));
        }

        Self { components, shutdown_tx, config, tasks }
    }

    #[must_use]
    pub fn components(&self) -> &GatewayComponents {
        &self.components
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn relayer(&self) -> &Arc<Relayer> {
        self.components.relayer()
    }

    #[must_use]
    pub fn session_registry(&self) -> &Arc<CachedSessionRegistry> {
        self.components.session_registry()
    }

    #[must_use]
    pub fn node_selector(&self) -> &Arc<NodeSelector> {
        self.components.node_selector()
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        self.components.metrics_collector()
    }

    /// Number of background loops started by this runtime.
    #[must_use]
    pub fn background_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Useful for listening to shutdown signals in custom background tasks.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Sender half of the shutdown channel, for triggering shutdown from a signal handler.
    #[must_use]
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Signals every background loop to stop and waits for them. Consumes the runtime, so
    /// it runs at most once; a round in progress is abandoned rather than awaited.
    pub async fn shutdown(self) {
        info!("Initiating gateway runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!(error = %e, "Failed to send shutdown signal (no receivers)");
        }

        for (name, task) in self.tasks {
            match task.await {
                Ok(()) => debug!(task = name, "Background task completed"),
                Err(e) if e.is_cancelled() => debug!(task = name, "Background task cancelled"),
                Err(e) => error!(task = name, error = %e, "Background task failed"),
            }
        }

        info!("Gateway runtime shutdown complete");
    }

    /// Waits for a shutdown signal on the runtime's channel, then performs cleanup.
    ///
    /// The receiver is subscribed when this is called, not when the future is first
    /// polled, so a signal sent right after spawning it is not missed.
    pub fn wait_for_shutdown(self) -> impl std::future::Future<Output = ()> + Send {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, runtime terminating");
            self.shutdown().await;
        }
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<GatewayRuntime>;
    let _ = assert_sync::<GatewayRuntime>;
};
