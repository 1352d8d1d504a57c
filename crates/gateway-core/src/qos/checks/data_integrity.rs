use super::{consensus::majority_identifier, is_due, CheckContext};
use crate::qos::{
    fanout::{collect_relay_responses, send_relays_async},
    family::ChainFamily,
    node::{QosNode, TimeoutReason},
};
use chrono::Utc;
use rand::seq::IndexedRandom;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, error, warn};

/// Compares a historical block identifier across healthy nodes and benches the ones that
/// disagree with the majority.
pub struct DataIntegrityCheck {
    context: Arc<CheckContext>,
    family: ChainFamily,
    nodes: Vec<Arc<QosNode>>,
    next_check_time: Option<Instant>,
}

impl DataIntegrityCheck {
    #[must_use]
    pub fn new(context: Arc<CheckContext>, family: ChainFamily) -> Self {
        Self { context, family, nodes: Vec::new(), next_check_time: None }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.family {
            ChainFamily::Evm => "evm_data_integrity_check",
            ChainFamily::Solana => "solana_data_integrity_check",
            ChainFamily::Pokt => "pokt_data_integrity_check",
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

        self.check_integrity().await;
        self.context.metrics.record_check_run(self.name());
        self.next_check_time = Some(Instant::now() + self.context.settings.job_interval);
    }

    fn source_of_truth(&self) -> Option<Arc<QosNode>> {
        let healthy: Vec<&Arc<QosNode>> = self.nodes.iter().filter(|n| n.is_healthy()).collect();
        healthy.choose(&mut rand::rng()).map(|node| Arc::clone(node))
    }

    async fn check_integrity(&self) {
        let Some(source) = self.source_of_truth() else {
            warn!(
                chain_id = %self.nodes.first().map(|n| n.chain()).unwrap_or_default(),
                "cannot find source of truth for data integrity check"
            );
            return;
        };

        let chain = source.chain().to_string();
        let target = source.last_known_height().saturating_sub(self.context.lookback_height(&chain));

        let interval = self.context.settings.data_integrity_check_interval;
        let eligible: Vec<Arc<QosNode>> = self
            .nodes
            .iter()
            .filter(|n| n.is_healthy() && is_due(n.last_data_integrity_check_time(), interval))
            .cloned()
            .collect();

        if eligible.is_empty() {
            return;
        }
        debug!(chain_id = %chain, block = target, nodes = eligible.len(), "checking data integrity");

        let rx = send_relays_async(
            &self.context.relayer,
            &eligible,
            &self.family.block_identifier_payload(target),
            self.context.relay_timeout(&chain),
        );

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut reports: Vec<(Arc<QosNode>, String)> = Vec::with_capacity(eligible.len());

        for response in collect_relay_responses(rx).await {
            let node = response.node;
            let relay = match response.result {
                Ok(relay) => relay,
                Err(e) => {
                    self.context.punisher.punish(&e, &node);
                    continue;
                }
            };

            match self.family.parse_block_identifier(&relay.response) {
                Ok(identifier) => {
                    node.set_last_data_integrity_check_time(Utc::now());
                    *counts.entry(identifier.clone()).or_default() += 1;
                    reports.push((node, identifier));
                }
                Err(e) => {
                    warn!(node = %node.service_url(), error = %e, "failed to parse block identifier");
                    self.context.punisher.timeout(&node, TimeoutReason::NodeResponse, Some(e.to_string()));
                }
            }
        }

        let Some(majority) = majority_identifier(&counts) else {
            return;
        };

        for (node, identifier) in reports {
            if identifier != majority {
                error!(
                    node = %node.service_url(),
                    node_block_hash = %identifier,
                    trusted_source_block_hash = %majority,
                    "punishing node for failed data integrity check"
                );
                self.context.punisher.timeout(
                    &node,
                    TimeoutReason::DataIntegrity,
                    Some(format!(
                        "nodeBlockHash {identifier}, trustedSourceBlockHash {majority}"
                    )),
                );
            }
        }
    }
}
