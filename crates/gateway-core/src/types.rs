//! Network-level data types shared by the session registry, QoS engine and relayer.
//!
//! # Type Categories
//!
//! ## Session Types
//! - [`Node`], [`SessionHeader`], [`PocketSession`]: A dispatched session as returned by the
//!   full node
//! - [`GetSessionRequest`], [`GetSessionResponse`]: Dispatch request/response envelopes
//!
//! ## Relay Types
//! - [`Payload`]: Method, path, body and headers forwarded to a servicer or altruist
//! - [`RelayRequest`], [`RelayResponse`]: Input and output of a single relay
//!
//! ## Signer Types
//! - [`ApplicationSigner`]: The staked application account a relay is issued on behalf of
//!
//! Sessions and signers are shared behind `Arc` because every wrapped node in a session
//! points back at them.

use crate::pocket::PocketError;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// A servicer node assigned to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub service_url: String,
    pub public_key: String,
}

/// Identifies which application, chain and height a session was dispatched for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionHeader {
    #[serde(default)]
    pub app_public_key: String,
    pub chain: String,
    pub session_height: u64,
}

/// A session as dispatched by the network: the servicers plus the header they were
/// assigned under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketSession {
    pub nodes: Vec<Node>,
    pub header: SessionHeader,
}

impl PocketSession {
    #[must_use]
    pub fn chain(&self) -> &str {
        &self.header.chain
    }

    #[must_use]
    pub fn session_height(&self) -> u64 {
        self.header.session_height
    }

    /// Finds a servicer by public key.
    #[must_use]
    pub fn find_node(&self, public_key: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.public_key == public_key)
    }
}

/// Request for a session. A `session_height` of `0` asks for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSessionRequest {
    pub app_public_key: String,
    pub chain: String,
    #[serde(default)]
    pub session_height: u64,
}

impl GetSessionRequest {
    #[must_use]
    pub fn new(app_public_key: impl Into<String>, chain: impl Into<String>) -> Self {
        Self { app_public_key: app_public_key.into(), chain: chain.into(), session_height: 0 }
    }

    #[must_use]
    pub fn at_height(mut self, session_height: u64) -> Self {
        self.session_height = session_height;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSessionResponse {
    pub session: PocketSession,
}

/// Latest block height reported by the full node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBlockHeight {
    pub height: u64,
}

/// The staked application account used to sign relays.
///
/// Key material is held by the external proof signer; only the public identity travels
/// with a relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationSigner {
    pub public_key: String,
    pub address: String,
}

/// Body, method, path and headers of a relay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    pub data: String,
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl Payload {
    /// Builds a `POST` payload with the given body and path.
    #[must_use]
    pub fn post(data: impl Into<String>, path: impl Into<String>) -> Self {
        Self { data: data.into(), method: "POST".to_string(), path: path.into(), ..Default::default() }
    }
}

/// A single relay to be sent to a servicer.
///
/// `signer`, `session` and `selected_node_pub_key` are populated by the relayer from the
/// chosen node; callers normally only set `payload` and `chain`.
#[derive(Debug, Clone, Default)]
pub struct RelayRequest {
    pub payload: Option<Payload>,
    pub signer: Option<Arc<ApplicationSigner>>,
    pub chain: String,
    pub selected_node_pub_key: Option<String>,
    pub session: Option<Arc<PocketSession>>,
    pub timeout: Option<Duration>,
}

impl RelayRequest {
    #[must_use]
    pub fn new(chain: impl Into<String>, payload: Payload) -> Self {
        Self { payload: Some(payload), chain: chain.into(), ..Default::default() }
    }

    /// Checks that the request carries a payload and a signer.
    ///
    /// # Errors
    ///
    /// Returns [`PocketError::MalformedRelayRequest`] if either is missing.
    pub fn validate(&self) -> Result<(), PocketError> {
        if self.payload.is_none() || self.signer.is_none() {
            return Err(PocketError::MalformedRelayRequest);
        }
        Ok(())
    }
}

/// Opaque response body returned by a servicer or altruist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub response: String,
}

impl RelayResponse {
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}
