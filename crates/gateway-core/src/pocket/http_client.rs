use super::{
    BlockHeightProvider, PocketDispatcher, PocketError, PocketRelayer, PocketRpcError,
};
use crate::types::{
    ApplicationSigner, GetSessionRequest, GetSessionResponse, LatestBlockHeight, Node, Payload,
    PocketSession, RelayRequest, RelayResponse,
};
use async_trait::async_trait;
use rand::{seq::IndexedRandom, Rng};
use reqwest::{Client, ClientBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

const ENDPOINT_DISPATCH: &str = "/v1/client/dispatch";
const ENDPOINT_SEND_RELAY: &str = "/v1/client/relay";
const ENDPOINT_GET_HEIGHT: &str = "/v1/query/height";

/// Proof attached to every relay so the servicer can claim it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProof {
    pub entropy: u64,
    pub session_block_height: u64,
    pub servicer_pub_key: String,
    pub blockchain: String,
    pub request_hash: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
struct RelayMeta {
    block_height: u64,
}

#[derive(Debug, Serialize)]
struct RelayEnvelope<'a> {
    payload: &'a Payload,
    meta: RelayMeta,
    proof: RelayProof,
}

/// Signs relay proofs on behalf of an application.
///
/// Key custody lives outside the gateway; implementations fill in `request_hash` and
/// `signature`.
pub trait RelayProofSigner: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the proof cannot be signed for `signer`.
    fn sign(
        &self,
        proof: RelayProof,
        payload: &Payload,
        signer: &ApplicationSigner,
    ) -> Result<RelayProof, PocketError>;
}

/// Leaves proofs unsigned. Servicers that enforce signatures will reject these relays.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedProofSigner;

impl RelayProofSigner for UnsignedProofSigner {
    fn sign(
        &self,
        proof: RelayProof,
        _payload: &Payload,
        _signer: &ApplicationSigner,
    ) -> Result<RelayProof, PocketError> {
        Ok(proof)
    }
}

/// HTTP client for a full node and the servicers it dispatches.
pub struct HttpPocketClient {
    client: Client,
    full_node_host: String,
    request_timeout: Duration,
    proof_signer: Arc<dyn RelayProofSigner>,
}

impl HttpPocketClient {
    /// Creates a client for `full_node_host` with a default per-request timeout.
    ///
    /// # Errors
    ///
    /// - [`PocketError::MissingFullNodeHost`] if the host is empty
    /// - [`PocketError::Other`] if the underlying reqwest client fails to build
    pub fn new(full_node_host: &str, request_timeout: Duration) -> Result<Self, PocketError> {
        if full_node_host.is_empty() {
            return Err(PocketError::MissingFullNodeHost);
        }

        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(100)
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("pokt-gateway/0.1.0")
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build pocket http client");
                PocketError::Other(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            full_node_host: full_node_host.trim_end_matches('/').to_string(),
            request_timeout,
            proof_signer: Arc::new(UnsignedProofSigner),
        })
    }

    #[must_use]
    pub fn with_proof_signer(mut self, proof_signer: Arc<dyn RelayProofSigner>) -> Self {
        self.proof_signer = proof_signer;
        self
    }

    #[must_use]
    pub fn full_node_host(&self) -> &str {
        &self.full_node_host
    }

    /// Sanitizes network errors to prevent information disclosure.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    fn map_transport_error(error: &reqwest::Error) -> PocketError {
        if error.is_timeout() {
            return PocketError::Timeout;
        }

        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            if cause.to_string().to_lowercase().contains("certificate") {
                return PocketError::InvalidCertificate(Self::sanitize_network_error(error));
            }
            source = cause.source();
        }

        PocketError::ConnectionFailed(Self::sanitize_network_error(error))
    }

    async fn make_request<B, T>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, PocketError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(&e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| Self::map_transport_error(&e))?;

        if !status.is_success() {
            let rpc_error = match serde_json::from_slice::<PocketRpcError>(&bytes) {
                Ok(mut decoded) => {
                    if decoded.code == 0 {
                        decoded.code = status.as_u16();
                    }
                    decoded
                }
                Err(_) => PocketRpcError::new(
                    status.as_u16(),
                    String::from_utf8_lossy(&bytes).into_owned(),
                ),
            };
            tracing::trace!(url = url, status = status.as_u16(), "pocket request failed");
            return Err(PocketError::Rpc(rpc_error));
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| PocketError::MalformedResponse(e.to_string()))
    }

    async fn session_for_relay(
        &self,
        req: &RelayRequest,
        signer: &ApplicationSigner,
    ) -> Result<Arc<PocketSession>, PocketError> {
        if let Some(session) = &req.session {
            return Ok(session.clone());
        }

        let dispatch = GetSessionRequest::new(signer.public_key.clone(), req.chain.clone());
        let response = self.get_session(&dispatch).await?;
        Ok(Arc::new(response.session))
    }

    fn node_for_relay<'a>(
        session: &'a PocketSession,
        selected_node_pub_key: Option<&str>,
    ) -> Result<&'a Node, PocketError> {
        match selected_node_pub_key {
            Some(pub_key) if !pub_key.is_empty() => {
                session.find_node(pub_key).ok_or(PocketError::NodeNotFound)
            }
            _ => session.nodes.choose(&mut rand::rng()).ok_or(PocketError::SessionHasZeroNodes),
        }
    }
}

#[async_trait]
impl PocketDispatcher for HttpPocketClient {
    async fn get_session(
        &self,
        req: &GetSessionRequest,
    ) -> Result<GetSessionResponse, PocketError> {
        let url = format!("{}{ENDPOINT_DISPATCH}", self.full_node_host);
        self.make_request(&url, req, self.request_timeout).await
    }
}

#[async_trait]
impl BlockHeightProvider for HttpPocketClient {
    async fn get_latest_block_height(&self) -> Result<u64, PocketError> {
        let url = format!("{}{ENDPOINT_GET_HEIGHT}", self.full_node_host);
        let height: LatestBlockHeight =
            self.make_request(&url, &serde_json::json!({}), self.request_timeout).await?;
        Ok(height.height)
    }
}

#[async_trait]
impl PocketRelayer for HttpPocketClient {
    async fn send_relay(&self, req: &RelayRequest) -> Result<RelayResponse, PocketError> {
        let (Some(payload), Some(signer)) = (req.payload.as_ref(), req.signer.as_ref()) else {
            return Err(PocketError::MalformedRelayRequest);
        };

        let session = self.session_for_relay(req, signer).await?;
        let node = Self::node_for_relay(&session, req.selected_node_pub_key.as_deref())?;
        let session_height = session.session_height();

        let unsigned = RelayProof {
            entropy: rand::rng().random::<u64>(),
            session_block_height: session_height,
            servicer_pub_key: node.public_key.clone(),
            blockchain: req.chain.clone(),
            request_hash: String::new(),
            signature: String::new(),
        };
        let proof = self.proof_signer.sign(unsigned, payload, signer)?;

        let envelope =
            RelayEnvelope { payload, meta: RelayMeta { block_height: session_height }, proof };
        let url = format!("{}{ENDPOINT_SEND_RELAY}", node.service_url.trim_end_matches('/'));
        let timeout = req.timeout.unwrap_or(self.request_timeout);

        self.make_request(&url, &envelope, timeout).await
    }
}
