//! Integration tests for session dispatch, caching and priming.

use crate::mock_infrastructure::{application, evm_responder, ScriptedPocketClient, EVM_CHAIN};
use gateway_core::{
    config::SessionConfig,
    metrics::MetricsCollector,
    pocket::PocketError,
    registry::StaticAppsRegistry,
    session::{CachedSessionRegistry, SessionChainKey, SessionError, SessionRegistryService},
    types::GetSessionRequest,
};
use std::{sync::Arc, time::Duration};

const OTHER_EVM_CHAIN: &str = "0027";

fn registry_with(
    network: &Arc<ScriptedPocketClient>,
    app_keys: &[&str],
    config: &SessionConfig,
) -> CachedSessionRegistry {
    let apps: Vec<_> =
        app_keys.iter().map(|key| application(key, &[EVM_CHAIN, OTHER_EVM_CHAIN])).collect();
    CachedSessionRegistry::new(
        network.clone(),
        network.clone(),
        Arc::new(StaticAppsRegistry::from_config(&apps)),
        Arc::new(MetricsCollector::new().expect("valid test metrics")),
        config,
    )
}

fn network_with_nodes() -> Arc<ScriptedPocketClient> {
    let network = Arc::new(ScriptedPocketClient::new(10));
    for key in ["node-a", "node-b"] {
        network.add_node(EVM_CHAIN, key, evm_responder(100, "0xaaa"));
        network.add_node(OTHER_EVM_CHAIN, key, evm_responder(100, "0xaaa"));
    }
    network
}

#[tokio::test]
async fn test_primer_runs_once_per_session_height() {
    let network = network_with_nodes();
    let registry = registry_with(&network, &["app1"], &SessionConfig::default());

    assert_eq!(registry.prime_sessions().await.unwrap(), Some(9));
    assert_eq!(registry.last_primed_session_height(), 9);
    assert_eq!(network.dispatch_calls(), 2);

    // Same session window: nothing to do.
    network.set_block_height(12);
    assert_eq!(registry.prime_sessions().await.unwrap(), None);
    assert_eq!(network.dispatch_calls(), 2);

    network.set_block_height(13);
    assert_eq!(registry.prime_sessions().await.unwrap(), Some(13));
    assert_eq!(registry.last_primed_session_height(), 13);
    assert_eq!(network.dispatch_calls(), 4);

    let keys: Vec<SessionChainKey> = registry.get_nodes_map().into_keys().collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(registry.get_nodes_by_chain(EVM_CHAIN).len(), 4);
}

#[tokio::test]
async fn test_primer_keeps_height_when_every_dispatch_fails() {
    let network = network_with_nodes();
    network.fail_dispatch(Some(PocketError::Timeout));
    let registry = registry_with(&network, &["app1"], &SessionConfig::default());

    assert_eq!(registry.prime_sessions().await.unwrap(), Some(9));
    assert_eq!(registry.last_primed_session_height(), 0);
    assert!(registry.get_nodes_map().is_empty());
}

#[tokio::test]
async fn test_primer_propagates_height_error() {
    let network = network_with_nodes();
    network.fail_height(Some(PocketError::ConnectionFailed("refused".to_string())));
    let registry = registry_with(&network, &["app1"], &SessionConfig::default());

    assert!(registry.prime_sessions().await.is_err());
    assert_eq!(network.dispatch_calls(), 0);
}

#[tokio::test]
async fn test_nodes_of_all_applications_share_a_key() {
    let network = network_with_nodes();
    let registry = registry_with(&network, &["app1", "app2"], &SessionConfig::default());

    registry.prime_sessions().await.unwrap();

    let key = SessionChainKey { chain: EVM_CHAIN.to_string(), session_height: 9 };
    let nodes = registry.get_nodes_map().remove(&key).expect("node list for the chain");
    assert_eq!(nodes.len(), 4);

    let mut apps: Vec<&str> = nodes.iter().map(|node| node.app_public_key()).collect();
    apps.sort_unstable();
    apps.dedup();
    assert_eq!(apps, vec!["app1", "app2"]);
}

#[tokio::test]
async fn test_cached_session_skips_dispatch() {
    let network = network_with_nodes();
    let registry = registry_with(&network, &["app1"], &SessionConfig::default());
    let request = GetSessionRequest::new("app1", EVM_CHAIN);

    let first = registry.get_session(&request).await.unwrap();
    let second = registry.get_session(&request).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(network.dispatch_calls(), 1);
    assert_eq!(registry.session_count(), 1);
}

#[tokio::test]
async fn test_failed_dispatch_backs_off() {
    let network = network_with_nodes();
    let config = SessionConfig { failure_backoff_ms: 100, ..SessionConfig::default() };
    let registry = registry_with(&network, &["app1"], &config);

    network.fail_dispatch(Some(PocketError::Timeout));
    let first = registry.get_session(&GetSessionRequest::new("app1", EVM_CHAIN)).await;
    assert!(matches!(first, Err(SessionError::Dispatch(PocketError::Timeout))));

    network.fail_dispatch(None);
    let second = registry.get_session(&GetSessionRequest::new("app1", OTHER_EVM_CHAIN)).await;
    assert!(matches!(second, Err(SessionError::RecentlyFailed)));
    assert_eq!(network.dispatch_calls(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let third = registry.get_session(&GetSessionRequest::new("app1", OTHER_EVM_CHAIN)).await;
    assert!(third.is_ok());
    assert_eq!(network.dispatch_calls(), 2);
}

#[tokio::test]
async fn test_unknown_application_is_not_dispatched() {
    let network = network_with_nodes();
    let registry = registry_with(&network, &["app1"], &SessionConfig::default());

    let result = registry.get_session(&GetSessionRequest::new("stranger", EVM_CHAIN)).await;

    assert!(matches!(result, Err(SessionError::SignerNotFound(key)) if key == "stranger"));
    assert_eq!(network.dispatch_calls(), 0);
}

#[tokio::test]
async fn test_sessions_expire_after_ttl() {
    let network = network_with_nodes();
    let config = SessionConfig { session_ttl_seconds: 1, ..SessionConfig::default() };
    let registry = registry_with(&network, &["app1"], &config);

    registry.prime_sessions().await.unwrap();
    assert_eq!(registry.get_nodes_by_chain(EVM_CHAIN).len(), 2);

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    registry.sweep_expired();

    assert_eq!(registry.session_count(), 0);
    assert!(registry.get_nodes_map().is_empty());
    assert!(registry.qos_nodes().is_empty());
}

#[tokio::test]
async fn test_redispatch_keeps_node_state() {
    let network = network_with_nodes();
    let config = SessionConfig { session_ttl_seconds: 60, ..SessionConfig::default() };
    let registry = registry_with(&network, &["app1"], &config);

    let at_height = GetSessionRequest::new("app1", EVM_CHAIN).at_height(9);
    let current = GetSessionRequest::new("app1", EVM_CHAIN);

    let first = registry.get_session(&at_height).await.unwrap();
    first.nodes[0].set_synced(true);

    // A different cache key for the same session merges into the existing node list.
    registry.get_session(&current).await.unwrap();

    let nodes = registry.get_nodes_by_chain(EVM_CHAIN);
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().any(|node| Arc::ptr_eq(node, &first.nodes[0]) && node.is_synced()));
}
