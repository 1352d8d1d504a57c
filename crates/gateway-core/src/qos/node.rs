//! Per-node health record.
//!
//! A [`QosNode`] is written by the relay hot path (errors, latency) and by the background
//! checks (height, data integrity). Each group of fields lives behind one
//! `parking_lot::RwLock`, so writers never interleave inside a group and readers never see
//! a half-applied timeout.

use super::latency::LatencyTracker;
use crate::types::{ApplicationSigner, Node, PocketSession};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

const MAX_ERROR_LEN: usize = 100;

/// Why a node was taken out of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutReason {
    #[serde(rename = "out_of_sync_timeout")]
    OutOfSync,
    #[serde(rename = "invalid_data_timeout")]
    DataIntegrity,
    #[serde(rename = "maximum_relays_timeout")]
    MaximumRelays,
    #[serde(rename = "node_response_timeout")]
    NodeResponse,
}

impl TimeoutReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfSync => "out_of_sync_timeout",
            Self::DataIntegrity => "invalid_data_timeout",
            Self::MaximumRelays => "maximum_relays_timeout",
            Self::NodeResponse => "node_response_timeout",
        }
    }
}

impl std::fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct QosState {
    timeout_until: Option<DateTime<Utc>>,
    timeout_reason: Option<TimeoutReason>,
    last_known_error: Option<String>,
    synced: bool,
}

#[derive(Debug, Default)]
struct CheckState {
    last_known_height: u64,
    last_height_check_time: Option<DateTime<Utc>>,
    last_data_integrity_check_time: Option<DateTime<Utc>>,
}

/// A servicer in a session plus everything the gateway has learned about it.
///
/// New nodes start unsynced and therefore unhealthy until a height check vouches for them.
#[derive(Debug)]
pub struct QosNode {
    node: Node,
    session: Arc<PocketSession>,
    signer: Arc<ApplicationSigner>,
    qos: RwLock<QosState>,
    checks: RwLock<CheckState>,
    latency: LatencyTracker,
}

impl QosNode {
    #[must_use]
    pub fn new(node: Node, session: Arc<PocketSession>, signer: Arc<ApplicationSigner>) -> Self {
        Self {
            node,
            session,
            signer,
            qos: RwLock::new(QosState::default()),
            checks: RwLock::new(CheckState::default()),
            latency: LatencyTracker::new(),
        }
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.node.public_key
    }

    #[must_use]
    pub fn service_url(&self) -> &str {
        &self.node.service_url
    }

    #[must_use]
    pub fn chain(&self) -> &str {
        self.session.chain()
    }

    #[must_use]
    pub fn session_height(&self) -> u64 {
        self.session.session_height()
    }

    #[must_use]
    pub fn session(&self) -> &Arc<PocketSession> {
        &self.session
    }

    #[must_use]
    pub fn signer(&self) -> &Arc<ApplicationSigner> {
        &self.signer
    }

    #[must_use]
    pub fn app_public_key(&self) -> &str {
        &self.signer.public_key
    }

    /// Eligible for relays: synced and not serving a timeout.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let qos = self.qos.read();
        qos.synced && !Self::timeout_active(&qos)
    }

    #[must_use]
    pub fn is_in_timeout(&self) -> bool {
        Self::timeout_active(&self.qos.read())
    }

    fn timeout_active(qos: &QosState) -> bool {
        qos.timeout_until.is_some_and(|until| Utc::now() < until)
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.qos.read().synced
    }

    pub fn set_synced(&self, synced: bool) {
        self.qos.write().synced = synced;
    }

    /// Takes the node out of rotation until `until`.
    pub fn set_timeout_until(
        &self,
        until: DateTime<Utc>,
        reason: TimeoutReason,
        error: Option<String>,
    ) {
        let mut qos = self.qos.write();
        qos.timeout_until = Some(until);
        qos.timeout_reason = Some(reason);
        qos.last_known_error = error;
    }

    /// Takes the node out of rotation for `penalty` from now.
    pub fn punish_for(&self, penalty: Duration, reason: TimeoutReason, error: Option<String>) {
        let until = chrono::Duration::from_std(penalty)
            .ok()
            .and_then(|penalty| Utc::now().checked_add_signed(penalty))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.set_timeout_until(until, reason, error);
    }

    #[must_use]
    pub fn timeout_until(&self) -> Option<DateTime<Utc>> {
        self.qos.read().timeout_until
    }

    #[must_use]
    pub fn timeout_reason(&self) -> Option<TimeoutReason> {
        self.qos.read().timeout_reason
    }

    /// Last error attached to a timeout, truncated to 100 characters.
    #[must_use]
    pub fn last_known_error(&self) -> String {
        self.qos
            .read()
            .last_known_error
            .as_deref()
            .map(|err| err.chars().take(MAX_ERROR_LEN).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn last_known_height(&self) -> u64 {
        self.checks.read().last_known_height
    }

    pub fn set_last_known_height(&self, height: u64) {
        self.checks.write().last_known_height = height;
    }

    #[must_use]
    pub fn last_height_check_time(&self) -> Option<DateTime<Utc>> {
        self.checks.read().last_height_check_time
    }

    pub fn set_last_height_check_time(&self, time: DateTime<Utc>) {
        self.checks.write().last_height_check_time = Some(time);
    }

    #[must_use]
    pub fn last_data_integrity_check_time(&self) -> Option<DateTime<Utc>> {
        self.checks.read().last_data_integrity_check_time
    }

    pub fn set_last_data_integrity_check_time(&self, time: DateTime<Utc>) {
        self.checks.write().last_data_integrity_check_time = Some(time);
    }

    pub fn record_latency(&self, latency: Duration) {
        self.latency.record(latency);
    }

    #[must_use]
    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    #[must_use]
    pub fn snapshot(&self) -> PublicQosNode {
        let qos = self.qos.read();
        let is_healthy = qos.synced && !Self::timeout_active(&qos);

        PublicQosNode {
            node_public_key: self.node.public_key.clone(),
            service_url: self.node.service_url.clone(),
            chain: self.chain().to_string(),
            session_height: self.session_height(),
            app_public_key: self.signer.public_key.clone(),
            timeout_until: qos.timeout_until,
            timeout_reason: qos.timeout_reason,
            last_known_err: qos
                .last_known_error
                .as_deref()
                .map(|err| err.chars().take(MAX_ERROR_LEN).collect())
                .unwrap_or_default(),
            is_healthy,
            is_synced: qos.synced,
            last_known_height: self.last_known_height(),
            p90_latency: self.latency.p90_ms(),
        }
    }
}

/// Read-only view of a node for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicQosNode {
    pub node_public_key: String,
    pub service_url: String,
    pub chain: String,
    pub session_height: u64,
    pub app_public_key: String,
    pub timeout_until: Option<DateTime<Utc>>,
    pub timeout_reason: Option<TimeoutReason>,
    pub last_known_err: String,
    pub is_healthy: bool,
    pub is_synced: bool,
    pub last_known_height: u64,
    /// Milliseconds.
    pub p90_latency: f64,
}
