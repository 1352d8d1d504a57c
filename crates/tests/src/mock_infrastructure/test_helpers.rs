//! Test fixtures: configs, applications and canned servicer behaviors.

use super::scripted_pocket::NodeResponder;
use gateway_core::{
    config::{AppConfig, ApplicationConfig},
    pocket::PocketError,
    registry::ChainConfiguration,
    types::Payload,
};
use std::sync::Arc;

pub const EVM_CHAIN: &str = "0021";
pub const SOLANA_CHAIN: &str = "0006";
pub const POKT_CHAIN: &str = "0001";

#[must_use]
pub fn application(public_key: &str, chains: &[&str]) -> ApplicationConfig {
    ApplicationConfig {
        id: format!("app-{public_key}"),
        public_key: public_key.to_string(),
        address: format!("addr-{public_key}"),
        chains: chains.iter().map(ToString::to_string).collect(),
    }
}

/// Default config with one application staked for `chains` and an altruist per chain
/// when `altruist_url` is given.
#[must_use]
pub fn gateway_config(chains: &[&str], altruist_url: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.applications = vec![application("app1", chains)];
    config.chains = chains
        .iter()
        .map(|chain| match altruist_url {
            Some(url) => ChainConfiguration::new(*chain).with_altruist_url(url),
            None => ChainConfiguration::new(*chain),
        })
        .collect();
    config
}

fn json_rpc_result(result: &str) -> String {
    format!(r#"{{"jsonrpc":"2.0","id":1,"result":{result}}}"#)
}

/// An EVM servicer at `height` whose blocks hash to `block_hash`.
///
/// Calls other than `eth_blockNumber` and `eth_getBlockByNumber` are answered with
/// `block_hash` as the result, so tests can tell which node served a relay.
#[must_use]
pub fn evm_responder(height: u64, block_hash: &'static str) -> NodeResponder {
    Arc::new(move |payload: &Payload| {
        if payload.data.contains("eth_blockNumber") {
            Ok(json_rpc_result(&format!(r#""{height:#x}""#)))
        } else if payload.data.contains("eth_getBlockByNumber") {
            Ok(json_rpc_result(&format!(r#"{{"hash":"{block_hash}","number":"{height:#x}"}}"#)))
        } else {
            Ok(json_rpc_result(&format!(r#""{block_hash}""#)))
        }
    })
}

/// A Solana servicer at slot `slot` whose blocks hash to `block_hash`.
#[must_use]
pub fn solana_responder(slot: u64, block_hash: &'static str) -> NodeResponder {
    Arc::new(move |payload: &Payload| {
        if payload.data.contains("getSlot") {
            Ok(json_rpc_result(&slot.to_string()))
        } else {
            Ok(json_rpc_result(&format!(r#"{{"blockhash":"{block_hash}"}}"#)))
        }
    })
}

/// A POKT servicer at `height` reporting `total_txs` for every block.
#[must_use]
pub fn pokt_responder(height: u64, total_txs: u64) -> NodeResponder {
    Arc::new(move |payload: &Payload| {
        if payload.path.ends_with("/height") {
            Ok(format!(r#"{{"height":{height}}}"#))
        } else {
            Ok(format!(r#"{{"total_txs":{total_txs},"txs":[]}}"#))
        }
    })
}

/// A servicer that fails every relay with `error`.
#[must_use]
pub fn failing_responder(error: PocketError) -> NodeResponder {
    Arc::new(move |_: &Payload| Err(error.clone()))
}

/// A servicer that answers every relay with `body`.
#[must_use]
pub fn fixed_responder(body: &'static str) -> NodeResponder {
    Arc::new(move |_: &Payload| Ok(body.to_string()))
}
