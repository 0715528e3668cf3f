use crate::domain::baseline::BaselineError;
use crate::domain::identity::IdentityError;
use crate::transport::TransportError;
use mk_facts::FactsError;

/// Why a registration attempt did not complete
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("last state label must not be empty")]
    InvalidLastState,

    #[error("fact collection failed: {0}")]
    FactCollection(#[from] FactsError),

    #[error("cannot derive node identity: {0}")]
    IdentityDerivation(#[from] IdentityError),

    #[error("failed to encode registration payload: {0}")]
    PayloadEncoding(#[from] serde_json::Error),

    #[error("registration request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("server rejected registration with status {status}: {body}")]
    ServerRejection { status: u16, body: String },

    /// The server accepted the registration but the local baseline did not
    /// advance; the next conditional attempt will send the same facts again.
    #[error("server accepted registration (status {status}) but saving the baseline failed: {source}")]
    BaselinePersist {
        status: u16,
        #[source]
        source: BaselineError,
    },

    #[error("failed to read baseline: {0}")]
    BaselineRead(#[source] BaselineError),
}

impl RegistrationError {
    /// `true` when the same attempt may succeed later without any change on
    /// this node: transport failures and 5xx rejections
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::ServerRejection { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// HTTP status the server answered with, if it answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerRejection { status, .. } | Self::BaselinePersist { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
