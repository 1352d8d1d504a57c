//! Error classification and node punishment.
//!
//! Errors reported by the wire client are matched against an ordered, versioned table of
//! [`ClassificationRule`]s. The first matching rule decides the [`ErrorBucket`]:
//!
//! | Bucket | Examples | Penalty |
//! |--------|----------|---------|
//! | [`ErrorBucket::Kickable`] | evidence sealed, over-service, wrong servicer, TLS | `kick` (1h) |
//! | [`ErrorBucket::Transient`] | 5xx, timeouts, connection errors, invalid height | `transient` (15s) |
//!
//! Errors that match no rule are logged and the node is left alone.

use super::node::{QosNode, TimeoutReason};
use crate::{
    config::{ClassificationOverride, PenaltyConfig},
    metrics::MetricsCollector,
    pocket::{PocketError, PocketSdkError},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error};

const OVER_SERVICE_MSG: &str = "the max number of relays serviced for this node is exceeded";
const EVIDENCE_SEALED_MSG: &str =
    "the evidence is sealed, either max relays reached or claim already submitted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorBucket {
    /// Node is removed for the rest of the session.
    Kickable,
    /// Node is benched briefly and retried.
    Transient,
}

/// Predicate over a [`PocketError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMatcher {
    /// Structured SDK error by `(codespace, code)`.
    Sdk { codespace: String, code: u64 },
    /// Uncoded SDK error by its message.
    SdkMessage(String),
    /// Case-insensitive substring of the error text.
    MessageContains(String),
    HttpStatusAtLeast(u16),
    Timeout,
    ConnectionFailed,
    InvalidCertificate,
    MalformedResponse,
}

impl ErrorMatcher {
    fn matches(&self, error: &PocketError, sdk: Option<&PocketSdkError>, text: &str) -> bool {
        match self {
            Self::Sdk { codespace, code } => sdk.is_some_and(|sdk| sdk.matches(codespace, *code)),
            Self::SdkMessage(message) => {
                sdk.is_some_and(|sdk| sdk.code == 0 && sdk.message.eq_ignore_ascii_case(message))
            }
            Self::MessageContains(needle) => text.contains(needle.as_str()),
            Self::HttpStatusAtLeast(threshold) => {
                matches!(error, PocketError::Rpc(rpc) if rpc.code >= *threshold)
            }
            Self::Timeout => matches!(error, PocketError::Timeout),
            Self::ConnectionFailed => matches!(error, PocketError::ConnectionFailed(_)),
            Self::InvalidCertificate => matches!(error, PocketError::InvalidCertificate(_)),
            Self::MalformedResponse => matches!(error, PocketError::MalformedResponse(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub matcher: ErrorMatcher,
    pub bucket: ErrorBucket,
}

impl ClassificationRule {
    #[must_use]
    pub fn new(matcher: ErrorMatcher, bucket: ErrorBucket) -> Self {
        Self { matcher, bucket }
    }
}

/// Ordered rule table; first match wins.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    version: u32,
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::v1()
    }
}

impl ErrorClassifier {
    #[must_use]
    pub fn v1() -> Self {
        use ErrorBucket::{Kickable, Transient};
        use ErrorMatcher as M;

        let sdk = |sdk: PocketSdkError| M::Sdk { codespace: sdk.codespace, code: sdk.code };

        let rules = vec![
            ClassificationRule::new(sdk(PocketSdkError::evidence_sealed()), Kickable),
            ClassificationRule::new(sdk(PocketSdkError::over_service()), Kickable),
            ClassificationRule::new(M::MessageContains(OVER_SERVICE_MSG.to_string()), Kickable),
            ClassificationRule::new(M::MessageContains(EVIDENCE_SEALED_MSG.to_string()), Kickable),
            ClassificationRule::new(
                M::SdkMessage(PocketSdkError::servicer_not_found().message),
                Kickable,
            ),
            ClassificationRule::new(M::InvalidCertificate, Kickable),
            ClassificationRule::new(sdk(PocketSdkError::invalid_block_height()), Transient),
            ClassificationRule::new(M::MessageContains("invalid block height".to_string()), Transient),
            ClassificationRule::new(M::MessageContains("stale height".to_string()), Transient),
            ClassificationRule::new(M::HttpStatusAtLeast(500), Transient),
            ClassificationRule::new(M::MessageContains("request timeout".to_string()), Transient),
            ClassificationRule::new(M::Timeout, Transient),
            ClassificationRule::new(M::ConnectionFailed, Transient),
            ClassificationRule::new(M::MalformedResponse, Transient),
        ];

        Self { version: 1, rules }
    }

    /// The v1 table with operator rules evaluated first.
    #[must_use]
    pub fn with_overrides(overrides: &[ClassificationOverride]) -> Self {
        let mut classifier = Self::v1();
        let mut rules: Vec<ClassificationRule> = overrides
            .iter()
            .map(|o| {
                ClassificationRule::new(
                    ErrorMatcher::MessageContains(o.contains.to_lowercase()),
                    o.bucket,
                )
            })
            .collect();
        rules.append(&mut classifier.rules);
        classifier.rules = rules;
        classifier
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    #[must_use]
    pub fn classify(&self, error: &PocketError) -> Option<ErrorBucket> {
        let sdk = error.sdk_error();
        let text = match error {
            PocketError::Rpc(rpc) => rpc.message.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };

        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(error, sdk.as_ref(), &text))
            .map(|rule| rule.bucket)
    }
}

/// Timeout lengths per cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalties {
    pub kick: Duration,
    pub transient: Duration,
    pub out_of_sync: Duration,
    pub data_integrity: Duration,
}

impl Default for Penalties {
    fn default() -> Self {
        Self::from(&PenaltyConfig::default())
    }
}

impl From<&PenaltyConfig> for Penalties {
    fn from(config: &PenaltyConfig) -> Self {
        Self {
            kick: Duration::from_secs(config.kick_seconds),
            transient: Duration::from_secs(config.transient_seconds),
            out_of_sync: Duration::from_secs(config.out_of_sync_seconds),
            data_integrity: Duration::from_secs(config.data_integrity_seconds),
        }
    }
}

impl Penalties {
    #[must_use]
    pub fn for_reason(&self, reason: TimeoutReason) -> Duration {
        match reason {
            TimeoutReason::MaximumRelays => self.kick,
            TimeoutReason::NodeResponse => self.transient,
            TimeoutReason::OutOfSync => self.out_of_sync,
            TimeoutReason::DataIntegrity => self.data_integrity,
        }
    }
}

/// Applies timeouts to nodes, shared by the relayer and every check.
#[derive(Debug)]
pub struct NodePunisher {
    classifier: ErrorClassifier,
    penalties: Penalties,
    metrics: Arc<MetricsCollector>,
}

impl NodePunisher {
    #[must_use]
    pub fn new(
        classifier: ErrorClassifier,
        penalties: Penalties,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { classifier, penalties, metrics }
    }

    #[must_use]
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn penalties(&self) -> &Penalties {
        &self.penalties
    }

    /// Classifies `error` and benches `node` accordingly.
    ///
    /// Returns `false` when the error is unrecognized and the node was left untouched.
    pub fn punish(&self, error: &PocketError, node: &QosNode) -> bool {
        let reason = match self.classifier.classify(error) {
            Some(ErrorBucket::Kickable) => TimeoutReason::MaximumRelays,
            Some(ErrorBucket::Transient) => TimeoutReason::NodeResponse,
            None => {
                error!(
                    node = %node.service_url(),
                    chain_id = %node.chain(),
                    error = %error,
                    "unknown error for punishing node"
                );
                return false;
            }
        };

        self.timeout(node, reason, Some(error.to_string()));
        true
    }

    /// Benches `node` for the penalty configured for `reason`.
    pub fn timeout(&self, node: &QosNode, reason: TimeoutReason, error: Option<String>) {
        let penalty = self.penalties.for_reason(reason);
        debug!(
            node = %node.service_url(),
            chain_id = %node.chain(),
            reason = %reason,
            penalty_secs = penalty.as_secs(),
            "node timed out"
        );
        node.punish_for(penalty, reason, error);
        self.metrics.record_node_punished(reason.as_str());
    }
}
