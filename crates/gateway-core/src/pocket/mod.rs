//! Network-facing collaborator interfaces and the HTTP client that implements them.
//!
//! The gateway only talks to the network through three narrow traits:
//!
//! - [`PocketDispatcher`]: Dispatches a session for an application and chain
//! - [`PocketRelayer`]: Sends a relay to a servicer
//! - [`BlockHeightProvider`]: Reports the latest block height of the network
//!
//! [`HttpPocketClient`] implements all three against a full node. Relay proof signing
//! is delegated to a [`RelayProofSigner`].

pub mod errors;
pub mod http_client;

pub use errors::{PocketError, PocketRpcError, PocketSdkError};
pub use http_client::{HttpPocketClient, RelayProof, RelayProofSigner, UnsignedProofSigner};

use crate::types::{GetSessionRequest, GetSessionResponse, RelayRequest, RelayResponse};
use async_trait::async_trait;

#[async_trait]
pub trait PocketDispatcher: Send + Sync {
    /// Dispatches the session for the application and chain in `req`.
    async fn get_session(&self, req: &GetSessionRequest)
        -> Result<GetSessionResponse, PocketError>;
}

#[async_trait]
pub trait PocketRelayer: Send + Sync {
    /// Sends a relay to the servicer selected in `req`.
    async fn send_relay(&self, req: &RelayRequest) -> Result<RelayResponse, PocketError>;
}

#[async_trait]
pub trait BlockHeightProvider: Send + Sync {
    async fn get_latest_block_height(&self) -> Result<u64, PocketError>;
}
