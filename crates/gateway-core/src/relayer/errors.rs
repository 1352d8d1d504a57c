use crate::pocket::PocketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// The node selector has no healthy node for the chain.
    #[error("node selector can't find node")]
    NodeNotFound,

    /// The relay request is missing its payload or signer.
    #[error("malformed relay request: {0}")]
    MalformedRequest(PocketError),

    /// The servicer relay failed.
    #[error("pocket relay failed: {0}")]
    Pocket(#[from] PocketError),

    /// No altruist URL is configured for the chain.
    #[error("altruist url not found")]
    AltruistNotFound,

    /// The altruist did not answer in time.
    #[error("altruist request timed out")]
    AltruistTimeout,

    /// The altruist answered with a non-success status.
    #[error("altruist returned HTTP {status}")]
    AltruistStatus { status: u16 },

    /// The altruist could not be reached or its URL is unusable.
    #[error("altruist request failed: {0}")]
    Altruist(String),
}

impl RelayError {
    /// `true` if the error came from the altruist path.
    #[must_use]
    pub fn is_altruist(&self) -> bool {
        matches!(
            self,
            Self::AltruistNotFound
                | Self::AltruistTimeout
                | Self::AltruistStatus { .. }
                | Self::Altruist(_)
        )
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pocket(e) | Self::MalformedRequest(e) => e.is_transient(),
            Self::AltruistTimeout | Self::Altruist(_) => true,
            Self::AltruistStatus { status } => *status >= 500,
            Self::NodeNotFound | Self::AltruistNotFound => false,
        }
    }
}
