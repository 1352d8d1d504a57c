use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

const MODULE_POCKET_CORE: &str = "pocketcore";
const MODULE_ROOT: &str = "sdk";

#[allow(clippy::expect_used)]
static SDK_CODESPACE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"codespace: (\w+)").expect("valid codespace regex"));

#[allow(clippy::expect_used)]
static SDK_CODE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"code: (\d+)").expect("valid code regex"));

#[allow(clippy::expect_used)]
static SDK_MESSAGE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r#"message: \\"(.+?)\\""#).expect("valid message regex"));

/// Error body returned by a full node or servicer on a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("ERROR: HttpCode: {code} Message: {message}")]
pub struct PocketRpcError {
    /// HTTP status code
    pub code: u16,
    pub message: String,
}

impl PocketRpcError {
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Extracts the structured SDK error embedded in the message, if there is one.
    ///
    /// Servicers wrap SDK errors as text (`codespace: pocketcore code: 71 ...`). Internal
    /// errors carry no code, in which case the quoted message is captured instead.
    #[must_use]
    pub fn to_sdk_error(&self) -> Option<PocketSdkError> {
        let lowered = self.message.to_lowercase();
        let codespace = SDK_CODESPACE.captures(&lowered)?.get(1)?.as_str().to_string();

        let code = SDK_CODE
            .captures(&lowered)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0);

        let message = if code == 0 {
            SDK_MESSAGE
                .captures(&lowered)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        };

        Some(PocketSdkError { codespace, code, message })
    }
}

/// A structured error raised by the network's SDK.
///
/// Identity is `(codespace, code)`; `message` is only meaningful when `code` is `0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ERROR: Codespace: {codespace} Code: {code}")]
pub struct PocketSdkError {
    pub codespace: String,
    pub code: u64,
    pub message: String,
}

impl PocketSdkError {
    #[must_use]
    pub fn new(codespace: impl Into<String>, code: u64) -> Self {
        Self { codespace: codespace.into(), code, message: String::new() }
    }

    /// Relay was issued against a session height the servicer no longer accepts.
    #[must_use]
    pub fn invalid_block_height() -> Self {
        Self::new(MODULE_POCKET_CORE, 60)
    }

    /// Servicer already handled the maximum number of relays for this session.
    #[must_use]
    pub fn over_service() -> Self {
        Self::new(MODULE_POCKET_CORE, 71)
    }

    /// Servicer sealed its evidence for this session.
    #[must_use]
    pub fn evidence_sealed() -> Self {
        Self::new(MODULE_POCKET_CORE, 90)
    }

    /// The servicer key in the proof does not belong to the servicer.
    #[must_use]
    pub fn servicer_not_found() -> Self {
        Self {
            codespace: MODULE_ROOT.to_string(),
            code: 0,
            message: "failed to find correct servicer pk".to_string(),
        }
    }

    /// Sentinel comparison: codes must match, and coded errors ignore the message.
    #[must_use]
    pub fn matches(&self, codespace: &str, code: u64) -> bool {
        self.codespace.eq_ignore_ascii_case(codespace) && self.code == code
    }
}

/// Errors returned by the network-facing collaborators (dispatcher, relayer, height
/// provider).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PocketError {
    /// Request exceeded its timeout.
    #[error("request timeout")]
    Timeout,

    /// Could not reach the host.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS handshake failed on the servicer's certificate.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Non-2xx response from a full node or servicer.
    #[error(transparent)]
    Rpc(#[from] PocketRpcError),

    /// Structured SDK error.
    #[error(transparent)]
    Sdk(#[from] PocketSdkError),

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Relay request without payload or signer.
    #[error("malformed send relay request")]
    MalformedRelayRequest,

    /// Session came back without servicers.
    #[error("session missing valid nodes")]
    SessionHasZeroNodes,

    /// Pinned servicer is not part of the session.
    #[error("node not found")]
    NodeNotFound,

    /// No full node host configured.
    #[error("require full node host")]
    MissingFullNodeHost,

    /// Anything else the client could not classify.
    #[error("{0}")]
    Other(String),
}

impl PocketError {
    /// Returns the SDK error carried by this error, parsing it out of RPC messages.
    #[must_use]
    pub fn sdk_error(&self) -> Option<PocketSdkError> {
        match self {
            Self::Sdk(sdk) => Some(sdk.clone()),
            Self::Rpc(rpc) => rpc.to_sdk_error(),
            _ => None,
        }
    }

    /// Returns `true` for failures that are likely to clear on their own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::Rpc(rpc) => rpc.code >= 500,
            _ => false,
        }
    }

    /// Returns a static string for metrics labels.
    #[must_use]
    pub fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::InvalidCertificate(_) => "invalid_certificate",
            Self::Rpc(_) => "rpc_error",
            Self::Sdk(_) => "sdk_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::MalformedRelayRequest => "malformed_relay_request",
            Self::SessionHasZeroNodes => "session_has_zero_nodes",
            Self::NodeNotFound => "node_not_found",
            Self::MissingFullNodeHost => "missing_full_node_host",
            Self::Other(_) => "other",
        }
    }
}
