use super::errors::SessionError;
use crate::{
    config::SessionConfig,
    metrics::{MetricsCollector, SESSION_CACHED, SESSION_COLD_HIT},
    pocket::{BlockHeightProvider, PocketDispatcher},
    qos::node::{PublicQosNode, QosNode},
    registry::AppsRegistry,
    types::{GetSessionRequest, PocketSession},
};
use async_trait::async_trait;
use futures::future::join_all;
use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

/// A dispatched session plus the QoS wrapper of each of its nodes.
#[derive(Debug)]
pub struct Session {
    pub is_valid: bool,
    pub pocket_session: Arc<PocketSession>,
    pub nodes: Vec<Arc<QosNode>>,
}

/// Key of the node cache. Nodes of every application sharing a chain and session height
/// accumulate under one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionChainKey {
    pub chain: String,
    pub session_height: u64,
}

type SessionKey = (String, String, u64);
pub type NodeList = Arc<Vec<Arc<QosNode>>>;

#[async_trait]
pub trait SessionRegistryService: Send + Sync {
    /// Returns the cached session for the request or dispatches a new one.
    async fn get_session(&self, req: &GetSessionRequest) -> Result<Arc<Session>, SessionError>;

    /// Every cached node serving `chain`, across all session heights.
    fn get_nodes_by_chain(&self, chain: &str) -> Vec<Arc<QosNode>>;

    /// Snapshot of the node cache.
    fn get_nodes_map(&self) -> HashMap<SessionChainKey, NodeList>;
}

/// First block of the session containing `block_height`.
///
/// A height that is an exact multiple of `blocks_per_session` still belongs to the
/// previous session.
#[must_use]
pub fn latest_session_height(block_height: u64, blocks_per_session: u64) -> u64 {
    let bps = blocks_per_session.max(1);
    if block_height % bps == 0 {
        block_height.saturating_sub(bps) + 1
    } else {
        (block_height / bps) * bps + 1
    }
}

/// Session registry backed by TTL caches.
///
/// Sessions are cached per `(app, chain, requested height)`. Dispatch calls are bounded by
/// a semaphore, and a failed dispatch makes cache misses fail fast for the backoff
/// window so a struggling full node is not hammered during session rollover.
pub struct CachedSessionRegistry {
    dispatcher: Arc<dyn PocketDispatcher>,
    height_provider: Arc<dyn BlockHeightProvider>,
    apps: Arc<dyn AppsRegistry>,
    metrics: Arc<MetricsCollector>,
    sessions: Cache<SessionKey, Arc<Session>>,
    chain_nodes: Cache<SessionChainKey, NodeList>,
    // Held for write while a session and its nodes are inserted, and while sweeping.
    cache_lock: RwLock<()>,
    dispatch_pool: Semaphore,
    last_failure: Mutex<Option<Instant>>,
    last_primed_session_height: AtomicU64,
    blocks_per_session: u64,
    failure_backoff: Duration,
    primer_interval: Duration,
    sweep_interval: Duration,
}

impl CachedSessionRegistry {
    #[must_use]
    pub fn new(
        dispatcher: Arc<dyn PocketDispatcher>,
        height_provider: Arc<dyn BlockHeightProvider>,
        apps: Arc<dyn AppsRegistry>,
        metrics: Arc<MetricsCollector>,
        config: &SessionConfig,
    ) -> Self {
        let ttl = config.session_ttl();
        Self {
            dispatcher,
            height_provider,
            apps,
            metrics,
            sessions: Cache::builder().time_to_live(ttl).build(),
            chain_nodes: Cache::builder().time_to_live(ttl).build(),
            cache_lock: RwLock::new(()),
            dispatch_pool: Semaphore::new(config.max_concurrent_dispatch.max(1)),
            last_failure: Mutex::new(None),
            last_primed_session_height: AtomicU64::new(0),
            blocks_per_session: config.blocks_per_session,
            failure_backoff: config.failure_backoff(),
            primer_interval: config.primer_interval(),
            sweep_interval: config.sweep_interval(),
        }
    }

    #[must_use]
    pub fn last_primed_session_height(&self) -> u64 {
        self.last_primed_session_height.load(Ordering::Acquire)
    }

    /// Number of cached sessions, after pending evictions are applied.
    #[must_use]
    pub fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }

    /// Public view of every cached node.
    #[must_use]
    pub fn qos_nodes(&self) -> Vec<PublicQosNode> {
        let mut entries: Vec<(SessionChainKey, NodeList)> = self.get_nodes_map().into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries.iter().flat_map(|(_, nodes)| nodes.iter().map(|node| node.snapshot())).collect()
    }

    fn should_backoff(&self) -> bool {
        self.last_failure.lock().is_some_and(|at| at.elapsed() < self.failure_backoff)
    }

    fn record(
        &self,
        started: Instant,
        cached: bool,
        result: Result<Arc<Session>, SessionError>,
    ) -> Result<Arc<Session>, SessionError> {
        match &result {
            Ok(_) => self
                .metrics
                .record_session_request(true, if cached { SESSION_CACHED } else { SESSION_COLD_HIT }),
            Err(e) => self.metrics.record_session_request(false, e.metric_reason()),
        }
        self.metrics.record_session_latency(cached, started.elapsed());
        result
    }

    async fn dispatch(&self, req: &GetSessionRequest, key: SessionKey) -> Result<Arc<Session>, SessionError> {
        if self.should_backoff() {
            return Err(SessionError::RecentlyFailed);
        }

        let application = self
            .apps
            .get_application_by_public_key(&req.app_public_key)
            .ok_or_else(|| SessionError::SignerNotFound(req.app_public_key.clone()))?;

        let response = {
            let _permit =
                self.dispatch_pool.acquire().await.map_err(|_| SessionError::DispatchPoolClosed)?;
            match self.dispatcher.get_session(req).await {
                Ok(response) => response,
                Err(e) => {
                    *self.last_failure.lock() = Some(Instant::now());
                    return Err(e.into());
                }
            }
        };

        let pocket_session = Arc::new(response.session);
        let nodes: Vec<Arc<QosNode>> = pocket_session
            .nodes
            .iter()
            .map(|node| {
                Arc::new(QosNode::new(node.clone(), pocket_session.clone(), application.signer.clone()))
            })
            .collect();

        let session = Arc::new(Session { is_valid: true, pocket_session, nodes });
        self.insert(key, &req.chain, &session);
        *self.last_failure.lock() = None;

        debug!(
            chain_id = %req.chain,
            session_height = session.pocket_session.session_height(),
            nodes = session.nodes.len(),
            "dispatched session"
        );
        Ok(session)
    }

    fn insert(&self, key: SessionKey, chain: &str, session: &Arc<Session>) {
        let _guard = self.cache_lock.write();
        self.sessions.insert(key, session.clone());

        let node_key = SessionChainKey {
            chain: chain.to_string(),
            session_height: session.pocket_session.session_height(),
        };
        let fresh = &session.nodes;
        let _ = self.chain_nodes.entry(node_key).and_upsert_with(|existing| match existing {
            None => Arc::new(fresh.clone()),
            Some(entry) => {
                // A re-dispatch of a session that is already cached keeps the existing
                // wrappers so their QoS state survives.
                let current = entry.into_value();
                let mut merged: Vec<Arc<QosNode>> = current.as_ref().clone();
                for node in fresh {
                    let known = merged.iter().any(|n| {
                        n.public_key() == node.public_key() && n.app_public_key() == node.app_public_key()
                    });
                    if !known {
                        merged.push(node.clone());
                    }
                }
                Arc::new(merged)
            }
        });
    }

    /// Dispatches the current session of every application and chain, once per session
    /// height. Returns the session height a round was attempted for, if any.
    ///
    /// # Errors
    ///
    /// Returns the height provider's error when the latest block height is unavailable.
    pub async fn prime_sessions(&self) -> Result<Option<u64>, crate::pocket::PocketError> {
        let block_height = self.height_provider.get_latest_block_height().await?;
        let session_height = latest_session_height(block_height, self.blocks_per_session);
        let last_primed = self.last_primed_session_height();
        let should_prime = last_primed == 0 || session_height > last_primed;

        info!(
            block_height,
            session_height,
            last_primed_session_height = last_primed,
            should_prime,
            "priming sessions"
        );

        if !should_prime {
            return Ok(None);
        }

        let requests: Vec<GetSessionRequest> = self
            .apps
            .get_applications()
            .iter()
            .flat_map(|app| {
                app.chains.iter().map(|chain| {
                    GetSessionRequest::new(app.public_key(), chain.clone()).at_height(session_height)
                })
            })
            .collect();

        let results = join_all(requests.iter().map(|req| self.get_session(req))).await;

        let mut successes = 0usize;
        for (req, result) in requests.iter().zip(&results) {
            match result {
                Ok(_) => successes += 1,
                Err(e) => warn!(
                    chain_id = %req.chain,
                    app_public_key = %req.app_public_key,
                    session_height,
                    error = %e,
                    "failed to prime session"
                ),
            }
        }
        let failures = results.len() - successes;

        if successes > 0 {
            info!(successes, failures, session_height, "primed sessions");
            self.last_primed_session_height.fetch_max(session_height, Ordering::AcqRel);
        }

        Ok(Some(session_height))
    }

    /// Evicts expired sessions and node lists.
    pub fn sweep_expired(&self) {
        let _guard = self.cache_lock.write();
        self.sessions.run_pending_tasks();
        self.chain_nodes.run_pending_tasks();
    }

    /// Runs [`prime_sessions`](Self::prime_sessions) every primer interval until shutdown.
    pub fn start_primer(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.primer_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tokio::select! {
                            result = registry.prime_sessions() => {
                                if let Err(e) = result {
                                    error!(error = %e, "session primer failed");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                tracing::info!("session primer shutting down mid-round");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("session primer shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Runs [`sweep_expired`](Self::sweep_expired) every sweep interval until shutdown.
    pub fn start_sweeper(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.sweep_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => registry.sweep_expired(),
                    _ = shutdown_rx.recv() => {
                        tracing::info!("session cache sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SessionRegistryService for CachedSessionRegistry {
    async fn get_session(&self, req: &GetSessionRequest) -> Result<Arc<Session>, SessionError> {
        let started = Instant::now();
        let key = (req.app_public_key.clone(), req.chain.clone(), req.session_height);

        if let Some(session) = self.sessions.get(&key) {
            return self.record(started, true, Ok(session));
        }

        let result = self.dispatch(req, key).await;
        self.record(started, false, result)
    }

    fn get_nodes_by_chain(&self, chain: &str) -> Vec<Arc<QosNode>> {
        self.get_nodes_map()
            .into_iter()
            .filter(|(key, _)| key.chain == chain)
            .flat_map(|(_, nodes)| nodes.iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    fn get_nodes_map(&self) -> HashMap<SessionChainKey, NodeList> {
        let _guard = self.cache_lock.read();
        self.chain_nodes.iter().map(|(key, nodes)| (key.as_ref().clone(), nodes)).collect()
    }
}
