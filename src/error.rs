use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type used by the registry and the handlers.
pub type AccessResult<T> = Result<T, AccessError>;

/// AccessError
///
/// Every failure the server side can report. Each variant maps to exactly one HTTP status,
/// and the client interceptor maps that status back to the matching client error kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Bad input: duplicate email, short password, unknown page key, unknown principal.
    #[error("{0}")]
    Validation(String),

    /// The caller is authenticated but lacks the required role or ownership.
    #[error("{0}")]
    Authorization(String),

    /// Missing, expired or rejected bearer token.
    #[error("{0}")]
    Authentication(String),

    /// Login attempt with a wrong email/password pair (or an inactive account).
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Authentication(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authorization(_) => "authorization_error",
            Self::Authentication(_) | Self::InvalidCredentials => "authentication_error",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // The login form reads `message`, every other caller reads `error`.
            Self::InvalidCredentials => json!({
                "message": self.to_string(),
                "error": self.to_string(),
                "kind": self.kind(),
            }),
            // Storage details stay in the logs.
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "request failed with an internal error");
                json!({ "error": "Internal server error", "kind": self.kind() })
            }
            _ => json!({ "error": self.to_string(), "kind": self.kind() }),
        };
        (status, Json(body)).into_response()
    }
}

/// RepositoryError
///
/// Persistence failures. Constraint violations are surfaced as their own variants so the
/// registry can turn them into validation errors instead of 500s.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint was violated (duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A permission write referenced a principal that does not exist (anymore).
    #[error("principal {0} does not exist")]
    MissingPrincipal(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    Malformed(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for AccessError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => AccessError::validation("email in use"),
            RepositoryError::MissingPrincipal(_) => AccessError::validation("unknown principal"),
            other => AccessError::Internal(other.to_string()),
        }
    }
}
