use super::node::QosNode;
use crate::{
    pocket::{PocketError, PocketRelayer},
    types::{Payload, RelayRequest, RelayResponse},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// Result of one relay in a fan-out.
#[derive(Debug)]
pub struct NodeRelayResponse {
    pub node: Arc<QosNode>,
    pub result: Result<RelayResponse, PocketError>,
}

/// Builds a relay pinned to `node`'s session and signer.
#[must_use]
pub fn relay_request_for(node: &QosNode, payload: Payload, timeout: Option<Duration>) -> RelayRequest {
    RelayRequest {
        payload: Some(payload),
        signer: Some(node.signer().clone()),
        chain: node.chain().to_string(),
        selected_node_pub_key: Some(node.public_key().to_string()),
        session: Some(node.session().clone()),
        timeout,
    }
}

/// Sends `payload` to every node concurrently.
///
/// The returned channel has room for every result, yields exactly one
/// [`NodeRelayResponse`] per node, and closes once the last relay has completed.
/// Must be called from within a tokio runtime.
#[must_use]
pub fn send_relays_async(
    relayer: &Arc<dyn PocketRelayer>,
    nodes: &[Arc<QosNode>],
    payload: &Payload,
    timeout: Option<Duration>,
) -> mpsc::Receiver<NodeRelayResponse> {
    let (tx, rx) = mpsc::channel(nodes.len().max(1));

    for node in nodes {
        let tx = tx.clone();
        let relayer = relayer.clone();
        let node = node.clone();
        let request = relay_request_for(&node, payload.clone(), timeout);

        tokio::spawn(async move {
            let result = relayer.send_relay(&request).await;
            // Capacity equals the node count, so this never waits.
            let _ = tx.send(NodeRelayResponse { node, result }).await;
        });
    }

    rx
}

/// Drains a fan-out channel until it closes.
pub async fn collect_relay_responses(
    mut rx: mpsc::Receiver<NodeRelayResponse>,
) -> Vec<NodeRelayResponse> {
    let mut responses = Vec::with_capacity(rx.max_capacity());
    while let Some(response) = rx.recv().await {
        responses.push(response);
    }
    responses
}
