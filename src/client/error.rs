use thiserror::Error;

use super::{context::SESSION_EXPIRED_MESSAGE, storage::StorageError};

/// Failures of the exchange itself: nothing usable came back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unexpected response status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
}

/// ClientError
///
/// The kinds a view has to tell apart. Only `SessionExpired` touches session state, and
/// the interceptor has already cleared it by the time a caller sees the error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad input; shown inline, session untouched.
    #[error("{0}")]
    Validation(String),

    /// Authenticated but not allowed; shown inline, session untouched.
    #[error("{0}")]
    Authorization(String),

    /// Token missing, expired or rejected. Session and identity are already cleared.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    /// Login refused. Distinct from `SessionExpired`.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The target disappeared (e.g. a principal deleted from another console).
    #[error("{0}")]
    NotFound(String),

    /// No usable response; never retried automatically.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response arrived after its session ended and was discarded.
    #[error("response discarded: the session it belonged to has ended")]
    Superseded,

    /// The action site already has an exchange in flight; nothing was sent.
    #[error("another request is already in progress")]
    Busy,

    #[error("could not persist the session: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Text for an inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => "Request failed. Please try again.".to_string(),
            ClientError::Storage(_) => "Could not save the session on this device.".to_string(),
            other => other.to_string(),
        }
    }
}
