//! End-to-end relay routing through a runtime wired to a scripted network.
//!
//! Each test primes sessions and runs one round of QoS checks by hand, then relays:
//! - a healthy node serves and the altruist is never called
//! - a failing node is punished and the altruist answers instead
//! - with no healthy node the altruist is the only path
//! - when both paths fail the node error wins over the altruist error

use crate::mock_infrastructure::{
    evm_responder, failing_responder, gateway_config, AltruistMockBuilder, ScriptedPocketClient,
    EVM_CHAIN,
};
use gateway_core::{
    config::AppConfig,
    pocket::{PocketError, PocketSdkError},
    qos::TimeoutReason,
    relayer::RelayError,
    runtime::GatewayRuntime,
    types::{Payload, RelayRequest},
};
use std::sync::Arc;

const CHAIN_ID_CALL: &str = r#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":1}"#;

fn runtime(network: &Arc<ScriptedPocketClient>, config: AppConfig) -> GatewayRuntime {
    GatewayRuntime::builder()
        .with_config(config)
        .with_pocket_client(network.clone())
        .disable_background_tasks()
        .build()
        .expect("valid test runtime")
}

async fn primed_runtime(network: &Arc<ScriptedPocketClient>, config: AppConfig) -> GatewayRuntime {
    let runtime = runtime(network, config);
    runtime.session_registry().prime_sessions().await.expect("block height available");
    runtime.node_selector().run_checks_once().await;
    network.clear_relays();
    runtime
}

/// Sum of every `relay_counter` sample in a Prometheus text rendering.
fn relay_count(metrics: &str) -> u64 {
    metrics
        .lines()
        .filter(|line| line.starts_with("relay_counter{"))
        .filter_map(|line| line.rsplit(' ').next()?.parse::<u64>().ok())
        .sum()
}

fn chain_id_relay() -> RelayRequest {
    RelayRequest::new(EVM_CHAIN, Payload::post(CHAIN_ID_CALL, ""))
}

#[tokio::test]
async fn test_healthy_node_serves_relay() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.expect_method("eth_chainId", "0xaltruist", 0).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));
    network.add_node(EVM_CHAIN, "node-b", evm_responder(101, "0xaaa"));
    network.add_node(EVM_CHAIN, "node-c", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;

    let response = runtime.relayer().send_relay(chain_id_relay()).await.unwrap();

    assert!(response.response.contains("0xaaa"));
    assert_eq!(network.relays().len(), 1);
    altruist.assert_all().await;

    let metrics = runtime.metrics_collector().render();
    assert!(metrics.contains("relay_counter"));
    assert!(metrics.contains("pocket_client_relay_latency"));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_failing_node_is_punished_and_altruist_answers() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.expect_method("eth_chainId", "0xaltruist", 1).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;
    assert!(runtime.session_registry().qos_nodes()[0].is_healthy);

    network.set_responder("node-a", failing_responder(PocketSdkError::over_service().into()));
    let response = runtime.relayer().send_relay(chain_id_relay()).await.unwrap();

    assert!(response.response.contains("0xaltruist"));
    assert_eq!(network.relays(), vec!["node-a".to_string()]);
    altruist.assert_all().await;

    let node = &runtime.session_registry().qos_nodes()[0];
    assert!(!node.is_healthy);
    assert_eq!(node.timeout_reason, Some(TimeoutReason::MaximumRelays));
    assert!(!node.last_known_err.is_empty());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_punished_node_leaves_rotation() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.respond("/", 200, r#"{"jsonrpc":"2.0","id":1,"result":"0xaltruist"}"#).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));
    network.add_node(EVM_CHAIN, "node-b", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;
    network.set_responder("node-a", failing_responder(PocketError::Timeout));

    for _ in 0..20 {
        runtime.relayer().send_relay(chain_id_relay()).await.unwrap();
    }

    let relays = network.relays();
    assert!(relays.iter().filter(|key| *key == "node-a").count() <= 1);
    assert!(relays.iter().filter(|key| *key == "node-b").count() >= 19);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_altruist_serves_when_no_node_is_healthy() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.expect_method("eth_chainId", "0xaltruist", 1).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));

    // Sessions are primed but never checked, so no node is synced yet.
    let runtime = runtime(&network, gateway_config(&[EVM_CHAIN], Some(&altruist.url())));
    runtime.session_registry().prime_sessions().await.unwrap();

    let response = runtime.relayer().send_relay(chain_id_relay()).await.unwrap();

    assert!(response.response.contains("0xaltruist"));
    assert!(network.relays().is_empty());
    assert!(runtime.metrics_collector().render().contains("relay_session_failure"));
    altruist.assert_all().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_both_paths_failing_returns_node_error() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.respond("/", 502, "bad gateway").await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;
    network.set_responder("node-a", failing_responder(PocketError::Timeout));

    let error = runtime.relayer().send_relay(chain_id_relay()).await.unwrap_err();

    assert!(matches!(error, RelayError::Pocket(PocketError::Timeout)));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_no_node_and_failing_altruist_returns_altruist_error() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.respond("/", 503, "unavailable").await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;

    let error = runtime.relayer().send_relay(chain_id_relay()).await.unwrap_err();

    assert!(matches!(error, RelayError::AltruistStatus { status: 503 }));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_missing_altruist_configuration() {
    let network = Arc::new(ScriptedPocketClient::new(10));
    let runtime = primed_runtime(&network, gateway_config(&[EVM_CHAIN], None)).await;

    let error = runtime.relayer().send_relay(chain_id_relay()).await.unwrap_err();

    assert!(matches!(error, RelayError::AltruistNotFound));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_relay_path_is_forwarded_to_altruist() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.respond("/v1/query/height", 200, r#"{"height":42}"#).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    let runtime = runtime(&network, gateway_config(&[EVM_CHAIN], Some(&altruist.url())));

    let request = RelayRequest::new(EVM_CHAIN, Payload::post("{}", "/v1/query/height"));
    let response = runtime.relayer().send_relay(request).await.unwrap();

    assert_eq!(response.response, r#"{"height":42}"#);
    altruist.assert_all().await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_timed_out_node_is_benched_and_altruist_answers() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.expect_method("eth_chainId", "0xaltruist", 1).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;
    network.set_responder("node-a", failing_responder(PocketError::Timeout));

    let response = runtime.relayer().send_relay(chain_id_relay()).await.unwrap();

    assert!(response.response.contains("0xaltruist"));
    altruist.assert_all().await;

    let node = &runtime.session_registry().qos_nodes()[0];
    assert!(!node.is_healthy);
    assert_eq!(node.timeout_reason, Some(TimeoutReason::NodeResponse));
    assert!(node.timeout_until.is_some_and(|until| until > chrono::Utc::now()));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_each_relay_is_counted_once() {
    let mut altruist = AltruistMockBuilder::new().await;
    altruist.respond("/", 200, r#"{"jsonrpc":"2.0","id":1,"result":"0xaltruist"}"#).await;

    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));

    let config = gateway_config(&[EVM_CHAIN], Some(&altruist.url()));
    let runtime = primed_runtime(&network, config).await;

    // Served by the node.
    runtime.relayer().send_relay(chain_id_relay()).await.unwrap();
    assert_eq!(relay_count(&runtime.metrics_collector().render()), 1);

    // Node times out, the altruist serves.
    network.set_responder("node-a", failing_responder(PocketError::Timeout));
    runtime.relayer().send_relay(chain_id_relay()).await.unwrap();
    let metrics = runtime.metrics_collector().render();
    assert_eq!(relay_count(&metrics), 2);
    let samples: Vec<&str> =
        metrics.lines().filter(|line| line.starts_with("relay_counter{")).collect();
    assert!(samples.iter().any(|line| {
        line.contains(r#"altruist="true""#) && line.contains(r#"reason="relay_pocket_error""#)
    }));
    assert!(samples.iter().all(|line| line.contains(r#"success="true""#)));

    // No healthy node left, the altruist serves again.
    runtime.relayer().send_relay(chain_id_relay()).await.unwrap();
    assert_eq!(relay_count(&runtime.metrics_collector().render()), 3);

    runtime.shutdown().await;
}
