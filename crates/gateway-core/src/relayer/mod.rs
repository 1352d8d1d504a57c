//! Relay routing: a healthy session node first, the chain's altruist second.
//!
//! # Flow
//!
//! 1. Ask the [`NodeSelectorService`] for a healthy node of the chain
//! 2. Pin the relay to that node's session and signer and send it
//! 3. On success return immediately; on failure punish the node
//! 4. Fall back to the altruist configured for the chain
//!
//! When both paths fail the node error is returned, since it says more about the state of
//! the network than the altruist error does. If no node was available the altruist error
//! is returned instead.

pub mod altruist;
pub mod errors;

pub use altruist::AltruistClient;
pub use errors::RelayError;

use crate::{
    metrics::MetricsCollector,
    pocket::PocketRelayer,
    qos::{node::QosNode, punish::NodePunisher, selector::NodeSelectorService},
    registry::ChainConfigurations,
    types::{RelayRequest, RelayResponse},
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, warn};

pub const REASON_SESSION_FAILURE: &str = "relay_session_failure";
pub const REASON_POCKET_ERROR: &str = "relay_pocket_error";

/// Root domain of a service URL (`node.eu.example.com` → `example.com`), used as a
/// low-cardinality metric label. Returns an empty string for unparseable URLs.
#[must_use]
pub fn service_host(service_url: &str) -> String {
    let Ok(url) = url::Url::parse(service_url) else {
        return String::new();
    };

    match url.host() {
        Some(url::Host::Domain(domain)) => {
            let labels: Vec<&str> = domain.rsplitn(3, '.').collect();
            match labels.as_slice() {
                [tld, root, _] | [tld, root] if !root.is_empty() => format!("{root}.{tld}"),
                _ => domain.to_string(),
            }
        }
        Some(host) => host.to_string(),
        None => String::new(),
    }
}

pub struct Relayer {
    pocket_client: Arc<dyn PocketRelayer>,
    node_selector: Arc<dyn NodeSelectorService>,
    chain_configurations: Arc<dyn ChainConfigurations>,
    punisher: Arc<NodePunisher>,
    altruist: AltruistClient,
    metrics: Arc<MetricsCollector>,
}

impl Relayer {
    #[must_use]
    pub fn new(
        pocket_client: Arc<dyn PocketRelayer>,
        node_selector: Arc<dyn NodeSelectorService>,
        chain_configurations: Arc<dyn ChainConfigurations>,
        punisher: Arc<NodePunisher>,
        altruist: AltruistClient,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { pocket_client, node_selector, chain_configurations, punisher, altruist, metrics }
    }

    /// Relays `req` through a session node, falling back to the altruist.
    ///
    /// # Errors
    ///
    /// Returns an error only when both paths fail. See the module docs for which error
    /// is reported.
    pub async fn send_relay(&self, req: RelayRequest) -> Result<RelayResponse, RelayError> {
        let started = Instant::now();
        let chain = req.chain.clone();

        let node_error = match self.send_node_relay(req.clone()).await {
            Ok((response, host)) => {
                self.metrics.record_relay(true, false, "", &chain, &host);
                self.metrics.record_relay_latency(true, false, &chain, &host, started.elapsed());
                return Ok(response);
            }
            Err(e) => e,
        };

        let reason = match node_error {
            RelayError::NodeNotFound => REASON_SESSION_FAILURE,
            _ => REASON_POCKET_ERROR,
        };
        warn!(chain_id = %chain, error = %node_error, "node relay failed, falling back to altruist");

        let result = self.altruist_relay(&req).await;
        self.metrics.record_relay(result.is_ok(), true, reason, &chain, "");
        self.metrics.record_relay_latency(result.is_ok(), true, &chain, "", started.elapsed());

        match result {
            Ok(response) => Ok(response),
            Err(altruist_error) => {
                error!(chain_id = %chain, error = %altruist_error, "altruist relay failed");
                match node_error {
                    RelayError::NodeNotFound => Err(altruist_error),
                    node_error => Err(node_error),
                }
            }
        }
    }

    async fn send_node_relay(
        &self,
        mut req: RelayRequest,
    ) -> Result<(RelayResponse, String), RelayError> {
        let node = self.node_selector.find_node(&req.chain).ok_or(RelayError::NodeNotFound)?;
        Self::pin_to_node(&mut req, &node);
        if req.timeout.is_none() {
            req.timeout = self
                .chain_configurations
                .get_chain_configuration(&req.chain)
                .and_then(|c| c.pocket_timeout());
        }
        req.validate().map_err(RelayError::MalformedRequest)?;

        let host = service_host(node.service_url());
        debug!(chain_id = %req.chain, node = %node.public_key(), "sending relay to node");

        let started = Instant::now();
        let result = self.pocket_client.send_relay(&req).await;
        let latency = started.elapsed();

        self.metrics.record_pocket_client_relay_latency(result.is_ok(), &req.chain, &host, latency);
        node.record_latency(latency);

        match result {
            Ok(response) => Ok((response, host)),
            Err(e) => {
                self.punisher.punish(&e, &node);
                Err(RelayError::Pocket(e))
            }
        }
    }

    fn pin_to_node(req: &mut RelayRequest, node: &QosNode) {
        req.signer = Some(node.signer().clone());
        req.session = Some(node.session().clone());
        req.selected_node_pub_key = Some(node.public_key().to_string());
    }

    async fn altruist_relay(&self, req: &RelayRequest) -> Result<RelayResponse, RelayError> {
        let config = self.chain_configurations.get_chain_configuration(&req.chain);
        let url = config
            .as_ref()
            .and_then(|c| c.altruist_url())
            .ok_or(RelayError::AltruistNotFound)?;
        let timeout = config.as_ref().and_then(|c| c.altruist_timeout());
        let payload = req.payload.clone().unwrap_or_default();

        self.altruist.relay(url, &payload, timeout).await.map(RelayResponse::new)
    }
}
