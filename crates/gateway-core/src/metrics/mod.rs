//! # Metrics
//!
//! Prometheus series for the relay path, the session cache and the QoS engine.
//!
//! Every [`MetricsCollector`] owns its own [`PrometheusRecorder`]. Recording goes through
//! [`metrics::with_local_recorder`], so no process-global recorder is installed and two
//! runtimes in one process (as in tests) never share counters.
//!
//! ## Series
//!
//! | Name | Kind | Labels |
//! |------|------|--------|
//! | `relay_counter` | counter | `success`, `altruist`, `reason`, `chain_id`, `service_host` |
//! | `relay_latency` | histogram | `success`, `altruist`, `chain_id`, `service_host` |
//! | `pocket_client_relay_latency` | histogram | `success`, `chain_id`, `service_host` |
//! | `cached_client_session_request_counter` | counter | `success`, `reason` |
//! | `cached_client_session_request_latency` | histogram | `cached` |
//! | `qos_check_runs_total` | counter | `check` |
//! | `qos_node_punished_total` | counter | `reason` |
//! | `qos_healthy_nodes` | gauge | `chain_id` |

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;

/// Histogram buckets in seconds, shared by every latency series.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0,
    60.0,
];

pub const SESSION_CACHED: &str = "session_cached";
pub const SESSION_COLD_HIT: &str = "session_cold_hit";
pub const SESSION_FAILED_BACKOFF: &str = "session_failed_backoff";
pub const SESSION_FAILED_FROM_CLIENT: &str = "session_failed_from_client";
pub const SESSION_FAILED_SIGNER_NOT_FOUND: &str = "session_failed_signer_not_found";

#[inline]
fn bool_label(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

pub struct MetricsCollector {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

impl MetricsCollector {
    /// # Errors
    ///
    /// Returns an error if the Prometheus recorder cannot be built.
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let recorder = PrometheusBuilder::new().set_buckets(LATENCY_BUCKETS)?.build_recorder();
        let handle = recorder.handle();

        Ok(Self { recorder, handle })
    }

    /// Record the outcome of a relay, primary or altruist.
    pub fn record_relay(
        &self,
        success: bool,
        altruist: bool,
        reason: &str,
        chain_id: &str,
        service_host: &str,
    ) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(
                "relay_counter",
                "success" => bool_label(success),
                "altruist" => bool_label(altruist),
                "reason" => reason.to_string(),
                "chain_id" => chain_id.to_string(),
                "service_host" => service_host.to_string()
            )
            .increment(1);
        });
    }

    pub fn record_relay_latency(
        &self,
        success: bool,
        altruist: bool,
        chain_id: &str,
        service_host: &str,
        latency: Duration,
    ) {
        metrics::with_local_recorder(&self.recorder, || {
            histogram!(
                "relay_latency",
                "success" => bool_label(success),
                "altruist" => bool_label(altruist),
                "chain_id" => chain_id.to_string(),
                "service_host" => service_host.to_string()
            )
            .record(latency.as_secs_f64());
        });
    }

    /// Round trip of the wire client alone, excluding node selection.
    pub fn record_pocket_client_relay_latency(
        &self,
        success: bool,
        chain_id: &str,
        service_host: &str,
        latency: Duration,
    ) {
        metrics::with_local_recorder(&self.recorder, || {
            histogram!(
                "pocket_client_relay_latency",
                "success" => bool_label(success),
                "chain_id" => chain_id.to_string(),
                "service_host" => service_host.to_string()
            )
            .record(latency.as_secs_f64());
        });
    }

    /// Record a session lookup. `reason` is one of the `SESSION_*` constants.
    pub fn record_session_request(&self, success: bool, reason: &'static str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(
                "cached_client_session_request_counter",
                "success" => bool_label(success),
                "reason" => reason
            )
            .increment(1);
        });
    }

    pub fn record_session_latency(&self, cached: bool, latency: Duration) {
        metrics::with_local_recorder(&self.recorder, || {
            histogram!("cached_client_session_request_latency", "cached" => bool_label(cached))
                .record(latency.as_secs_f64());
        });
    }

    pub fn record_check_run(&self, check: &'static str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!("qos_check_runs_total", "check" => check).increment(1);
        });
    }

    pub fn record_node_punished(&self, reason: &'static str) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!("qos_node_punished_total", "reason" => reason).increment(1);
        });
    }

    pub fn record_healthy_nodes(&self, chain_id: &str, count: usize) {
        #[allow(clippy::cast_precision_loss)]
        let value = count as f64;
        metrics::with_local_recorder(&self.recorder, || {
            gauge!("qos_healthy_nodes", "chain_id" => chain_id.to_string()).set(value);
        });
    }

    /// Renders the Prometheus text exposition of everything recorded so far.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
