//! Node selection across session rollovers and the check scheduler loop.

use crate::mock_infrastructure::{evm_responder, gateway_config, ScriptedPocketClient, EVM_CHAIN};
use gateway_core::{qos::NodeSelectorService, runtime::GatewayRuntime};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

fn network() -> Arc<ScriptedPocketClient> {
    let network = Arc::new(ScriptedPocketClient::new(10));
    network.add_node(EVM_CHAIN, "node-a", evm_responder(100, "0xaaa"));
    network.add_node(EVM_CHAIN, "node-b", evm_responder(100, "0xaaa"));
    network
}

fn runtime(network: &Arc<ScriptedPocketClient>) -> GatewayRuntime {
    let mut config = gateway_config(&[EVM_CHAIN], None);
    config.qos.job_interval_ms = 1;

    GatewayRuntime::builder()
        .with_config(config)
        .with_pocket_client(network.clone())
        .disable_background_tasks()
        .build()
        .expect("valid test runtime")
}

#[tokio::test]
async fn test_find_node_prefers_newest_session() {
    let network = network();
    let runtime = runtime(&network);
    let selector = runtime.node_selector();

    runtime.session_registry().prime_sessions().await.unwrap();
    selector.run_checks_once().await;
    assert_eq!(selector.find_node(EVM_CHAIN).unwrap().session_height(), 9);

    network.set_block_height(13);
    runtime.session_registry().prime_sessions().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    selector.run_checks_once().await;

    for _ in 0..20 {
        assert_eq!(selector.find_node(EVM_CHAIN).unwrap().session_height(), 13);
    }

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_find_node_falls_back_to_older_healthy_session() {
    let network = network();
    let runtime = runtime(&network);
    let selector = runtime.node_selector();

    runtime.session_registry().prime_sessions().await.unwrap();
    selector.run_checks_once().await;

    // The new session is cached but its nodes have not been checked yet.
    network.set_block_height(13);
    runtime.session_registry().prime_sessions().await.unwrap();

    for _ in 0..20 {
        assert_eq!(selector.find_node(EVM_CHAIN).unwrap().session_height(), 9);
    }

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_find_node_unknown_chain() {
    let network = network();
    let runtime = runtime(&network);

    runtime.session_registry().prime_sessions().await.unwrap();
    runtime.node_selector().run_checks_once().await;

    assert!(runtime.node_selector().find_node("9999").is_none());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_check_round_records_metrics() {
    let network = network();
    let runtime = runtime(&network);

    runtime.session_registry().prime_sessions().await.unwrap();
    runtime.node_selector().run_checks_once().await;

    let metrics = runtime.metrics_collector().render();
    assert!(metrics.contains("qos_check_runs_total"));
    assert!(metrics.contains("evm_height_check"));
    assert!(metrics.contains("qos_healthy_nodes"));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_scheduler_loop_syncs_nodes_until_shutdown() {
    let network = network();
    let runtime = GatewayRuntime::builder()
        .with_config(gateway_config(&[EVM_CHAIN], None))
        .with_pocket_client(network.clone())
        .disable_session_primer()
        .disable_cache_sweeper()
        .build()
        .expect("valid test runtime");
    assert_eq!(runtime.background_task_count(), 1);

    runtime.session_registry().prime_sessions().await.unwrap();

    let selector = runtime.node_selector().clone();
    timeout(Duration::from_secs(5), async {
        while selector.find_node(EVM_CHAIN).is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("scheduler should sync the primed nodes");

    timeout(Duration::from_secs(2), runtime.shutdown())
        .await
        .expect("scheduler should stop on shutdown");
}
