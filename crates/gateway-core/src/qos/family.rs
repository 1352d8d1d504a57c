//! Chain families and the probe payloads each one understands.
//!
//! Health checks need two probes per chain: "what is your height" and "what is the
//! identifier of block N". Their shape depends on the family:
//!
//! | Family | Height | Block identifier |
//! |--------|--------|------------------|
//! | EVM | `eth_blockNumber` (hex) | `eth_getBlockByNumber` → `result.hash` |
//! | Solana | `getSlot` | `getBlock` → `result.blockhash` |
//! | POKT | `POST /v1/query/height` | `POST /v1/query/blocktxs` → `total_txs` |

use crate::{config::ChainFamilyConfig, pocket::PocketError, types::Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const POKT_HEIGHT_PATH: &str = "/v1/query/height";
const POKT_BLOCK_TXS_PATH: &str = "/v1/query/blocktxs";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNetwork {
    #[default]
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
    Pokt,
}

#[derive(Deserialize)]
struct JsonRpcResult<T> {
    result: T,
}

#[derive(Deserialize)]
struct EvmBlock {
    hash: String,
}

#[derive(Deserialize)]
struct SolanaBlock {
    blockhash: String,
}

#[derive(Deserialize)]
struct PoktHeight {
    height: u64,
}

#[derive(Deserialize)]
struct PoktBlockTxs {
    total_txs: u64,
}

fn malformed(e: impl std::fmt::Display) -> PocketError {
    PocketError::MalformedResponse(e.to_string())
}

impl ChainFamily {
    pub const ALL: [Self; 3] = [Self::Evm, Self::Solana, Self::Pokt];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Solana => "solana",
            Self::Pokt => "pokt",
        }
    }

    #[must_use]
    pub fn height_payload(&self) -> Payload {
        match self {
            Self::Evm => {
                Payload::post(r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#, "")
            }
            Self::Solana => {
                Payload::post(r#"{"jsonrpc":"2.0","method":"getSlot","params":[],"id":1}"#, "")
            }
            Self::Pokt => Payload::post("{}", POKT_HEIGHT_PATH),
        }
    }

    /// # Errors
    ///
    /// Returns [`PocketError::MalformedResponse`] if the body is not a height response.
    pub fn parse_height(&self, response: &str) -> Result<u64, PocketError> {
        match self {
            Self::Evm => {
                let rsp: JsonRpcResult<String> = serde_json::from_str(response).map_err(malformed)?;
                let digits = rsp.result.trim_start_matches("0x").trim_start_matches("0X");
                u64::from_str_radix(digits, 16).map_err(malformed)
            }
            Self::Solana => {
                let rsp: JsonRpcResult<u64> = serde_json::from_str(response).map_err(malformed)?;
                Ok(rsp.result)
            }
            Self::Pokt => {
                let rsp: PoktHeight = serde_json::from_str(response).map_err(malformed)?;
                Ok(rsp.height)
            }
        }
    }

    #[must_use]
    pub fn block_identifier_payload(&self, height: u64) -> Payload {
        match self {
            Self::Evm => Payload::post(
                format!(
                    r#"{{"jsonrpc":"2.0","method":"eth_getBlockByNumber","params":["{height:#x}",false],"id":1}}"#
                ),
                "",
            ),
            Self::Solana => Payload::post(
                format!(
                    r#"{{"jsonrpc":"2.0","method":"getBlock","params":[{height},{{"encoding":"json","transactionDetails":"none","rewards":false}}],"id":1}}"#
                ),
                "",
            ),
            Self::Pokt => Payload::post(format!(r#"{{"height": {height}}}"#), POKT_BLOCK_TXS_PATH),
        }
    }

    /// Extracts the identifier used to compare nodes: the block hash, or the transaction
    /// count for POKT where full blocks are too large to fetch from every node.
    ///
    /// # Errors
    ///
    /// Returns [`PocketError::MalformedResponse`] if the body cannot be parsed.
    pub fn parse_block_identifier(&self, response: &str) -> Result<String, PocketError> {
        match self {
            Self::Evm => {
                let rsp: JsonRpcResult<EvmBlock> =
                    serde_json::from_str(response).map_err(malformed)?;
                Ok(rsp.result.hash)
            }
            Self::Solana => {
                let rsp: JsonRpcResult<SolanaBlock> =
                    serde_json::from_str(response).map_err(malformed)?;
                Ok(rsp.result.blockhash)
            }
            Self::Pokt => {
                let rsp: PoktBlockTxs = serde_json::from_str(response).map_err(malformed)?;
                Ok(rsp.total_txs.to_string())
            }
        }
    }
}

impl std::fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps chain ids to families for one network. Unknown chains are EVM.
#[derive(Debug, Clone)]
pub struct ChainFamilies {
    network: ChainNetwork,
    solana: HashSet<String>,
    pokt: HashSet<String>,
}

impl Default for ChainFamilies {
    fn default() -> Self {
        Self::new(ChainNetwork::Mainnet, &ChainFamilyConfig::default())
    }
}

impl ChainFamilies {
    #[must_use]
    pub fn new(network: ChainNetwork, config: &ChainFamilyConfig) -> Self {
        let (solana, pokt) = match network {
            ChainNetwork::Mainnet => (&config.solana_mainnet, &config.pokt_mainnet),
            ChainNetwork::Testnet => (&config.solana_testnet, &config.pokt_testnet),
        };

        Self {
            network,
            solana: solana.iter().cloned().collect(),
            pokt: pokt.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn network(&self) -> ChainNetwork {
        self.network
    }

    #[must_use]
    pub fn family_of(&self, chain: &str) -> ChainFamily {
        if self.solana.contains(chain) {
            ChainFamily::Solana
        } else if self.pokt.contains(chain) {
            ChainFamily::Pokt
        } else {
            ChainFamily::Evm
        }
    }
}
