use crate::pocket::PocketError;
use thiserror::Error;

/// Failures acquiring a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A dispatch failed within the backoff window; no upstream call was made.
    #[error("dispatch recently failed, returning early")]
    RecentlyFailed,

    /// The full node rejected or failed the dispatch.
    #[error("session dispatch failed: {0}")]
    Dispatch(#[from] PocketError),

    /// No configured application owns the requested public key.
    #[error("cannot find signer for application {0}")]
    SignerNotFound(String),

    #[error("dispatch pool closed")]
    DispatchPoolClosed,
}

impl SessionError {
    /// Returns the metric reason label for this failure.
    #[must_use]
    pub fn metric_reason(&self) -> &'static str {
        match self {
            Self::RecentlyFailed => crate::metrics::SESSION_FAILED_BACKOFF,
            Self::SignerNotFound(_) => crate::metrics::SESSION_FAILED_SIGNER_NOT_FOUND,
            Self::Dispatch(_) | Self::DispatchPoolClosed => {
                crate::metrics::SESSION_FAILED_FROM_CLIENT
            }
        }
    }
}
