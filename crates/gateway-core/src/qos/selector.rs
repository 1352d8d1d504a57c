use super::{checks::CheckJob, node::QosNode};
use crate::{metrics::MetricsCollector, session::SessionRegistryService};
use rand::seq::IndexedRandom;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

pub trait NodeSelectorService: Send + Sync {
    /// Picks a healthy node for `chain`, preferring the newest session.
    fn find_node(&self, chain: &str) -> Option<Arc<QosNode>>;
}

/// Picks a node uniformly at random from the healthy nodes of the highest session height
/// that has any.
#[must_use]
pub fn select_node(nodes: &[Arc<QosNode>]) -> Option<Arc<QosNode>> {
    let mut by_height: BTreeMap<u64, Vec<&Arc<QosNode>>> = BTreeMap::new();
    for node in nodes.iter().filter(|node| node.is_healthy()) {
        by_height.entry(node.session_height()).or_default().push(node);
    }

    let mut rng = rand::rng();
    by_height
        .values()
        .rev()
        .find_map(|group| group.choose(&mut rng))
        .map(|node| Arc::clone(node))
}

/// Node selection plus the scheduler that keeps node health current.
pub struct NodeSelector {
    session_registry: Arc<dyn SessionRegistryService>,
    jobs: Mutex<Vec<CheckJob>>,
    metrics: Arc<MetricsCollector>,
    interval: Duration,
}

impl NodeSelector {
    #[must_use]
    pub fn new(
        session_registry: Arc<dyn SessionRegistryService>,
        jobs: Vec<CheckJob>,
        metrics: Arc<MetricsCollector>,
        interval: Duration,
    ) -> Self {
        Self { session_registry, jobs: Mutex::new(jobs), metrics, interval }
    }

    /// Runs every due job once against each cached node list.
    pub async fn run_checks_once(&self) {
        let mut entries: Vec<_> = self.session_registry.get_nodes_map().into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        {
            let mut jobs = self.jobs.lock().await;
            for job in jobs.iter_mut() {
                if !job.should_run() {
                    continue;
                }
                for (key, nodes) in &entries {
                    debug!(
                        check = job.name(),
                        chain_id = %key.chain,
                        session_height = key.session_height,
                        "running qos check"
                    );
                    job.set_nodes(nodes.as_ref().clone());
                    job.perform().await;
                }
            }
        }

        let mut healthy: HashMap<&str, usize> = HashMap::new();
        for (key, nodes) in &entries {
            *healthy.entry(key.chain.as_str()).or_default() +=
                nodes.iter().filter(|node| node.is_healthy()).count();
        }
        for (chain, count) in healthy {
            self.metrics.record_healthy_nodes(chain, count);
        }
    }

    /// Runs [`run_checks_once`](Self::run_checks_once) every scheduler tick until shutdown.
    pub fn start_with_shutdown(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let selector = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(selector.interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // A round can wait on slow relays for a long time; shutdown aborts it.
                        tokio::select! {
                            () = selector.run_checks_once() => {}
                            _ = shutdown_rx.recv() => {
                                tracing::info!("qos check scheduler shutting down mid-round");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("qos check scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }
}

impl NodeSelectorService for NodeSelector {
    fn find_node(&self, chain: &str) -> Option<Arc<QosNode>> {
        select_node(&self.session_registry.get_nodes_by_chain(chain))
    }
}
