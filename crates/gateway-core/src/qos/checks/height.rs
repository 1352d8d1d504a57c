use super::{consensus::consensus_height, is_due, CheckContext};
use crate::qos::{
    fanout::{collect_relay_responses, send_relays_async},
    family::ChainFamily,
    node::{QosNode, TimeoutReason},
};
use chrono::Utc;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Marks nodes synced or out of sync against the consensus height of their session.
///
/// 1. Probe every node whose last height result is stale
/// 2. Punish nodes that error; bench nodes that return garbage
/// 3. Drop outlier heights and take the highest remaining as consensus
/// 4. Nodes trailing consensus by more than the chain tolerance go out of sync
pub struct HeightCheck {
    context: Arc<CheckContext>,
    family: ChainFamily,
    nodes: Vec<Arc<QosNode>>,
    next_check_time: Option<Instant>,
}

impl HeightCheck {
    #[must_use]
    pub fn new(context: Arc<CheckContext>, family: ChainFamily) -> Self {
        Self { context, family, nodes: Vec::new(), next_check_time: None }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.family {
            ChainFamily::Evm => "evm_height_check",
            ChainFamily::Solana => "solana_height_check",
            ChainFamily::Pokt => "pokt_height_check",
        }
    }

    #[must_use]
    pub fn should_run(&self) -> bool {
        self.next_check_time.is_none_or(|next| Instant::now() >= next)
    }

    pub fn set_nodes(&mut self, nodes: Vec<Arc<QosNode>>) {
        self.nodes = nodes;
    }

    pub async fn perform(&mut self) {
        if !self.context.serves(&self.nodes, self.family) {
            return;
        }

        self.check_heights().await;
        self.context.metrics.record_check_run(self.name());
        self.next_check_time = Some(Instant::now() + self.context.settings.job_interval);
    }

    async fn check_heights(&self) {
        let interval = self.context.settings.height_check_interval;
        let eligible: Vec<Arc<QosNode>> = self
            .nodes
            .iter()
            .filter(|node| is_due(node.last_height_check_time(), interval))
            .cloned()
            .collect();

        let Some(first) = eligible.first() else {
            return;
        };
        let chain = first.chain().to_string();
        debug!(chain_id = %chain, nodes = eligible.len(), check = self.name(), "checking node heights");

        let rx = send_relays_async(
            &self.context.relayer,
            &eligible,
            &self.family.height_payload(),
            self.context.relay_timeout(&chain),
        );

        let mut responded = Vec::with_capacity(eligible.len());
        for response in collect_relay_responses(rx).await {
            let node = response.node;
            let relay = match response.result {
                Ok(relay) => relay,
                Err(e) => {
                    self.context.punisher.punish(&e, &node);
                    continue;
                }
            };

            match self.family.parse_height(&relay.response) {
                Ok(height) => {
                    node.set_last_height_check_time(Utc::now());
                    node.set_last_known_height(height);
                    responded.push(node);
                }
                Err(e) => {
                    warn!(node = %node.service_url(), error = %e, "failed to parse height response");
                    self.context.punisher.timeout(&node, TimeoutReason::NodeResponse, Some(e.to_string()));
                }
            }
        }

        let heights: Vec<u64> = responded.iter().map(|node| node.last_known_height()).collect();
        let Some(highest) = consensus_height(&heights, self.context.settings.zscore_threshold) else {
            return;
        };

        for node in responded {
            let node_height = node.last_known_height();
            let difference = highest.saturating_sub(node_height);
            let tolerance = self.context.height_tolerance(node.chain());

            if difference > tolerance {
                info!(
                    node = %node.service_url(),
                    chain_id = %node.chain(),
                    height_difference = difference,
                    node_synced_height = node_height,
                    highest_node_height = highest,
                    "node is out of sync"
                );
                node.set_synced(false);
                self.context.punisher.timeout(
                    &node,
                    TimeoutReason::OutOfSync,
                    Some(format!(
                        "heightDifference: {difference}, nodeSyncedHeight: {node_height}, highestNodeHeight: {highest}"
                    )),
                );
            } else {
                node.set_synced(true);
            }
        }
    }
}
