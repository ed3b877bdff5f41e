//! Error types for the redirect login flow.

use thiserror::Error;

pub type RedirectResult<T> = Result<T, RedirectError>;

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("There are no query params available for parsing.")]
    MissingParams,

    #[error("Invalid state")]
    InvalidState,

    /// The authorization server redirected back with an `error` parameter.
    #[error("{error}")]
    Authorization {
        error: String,
        error_description: Option<String>,
        state: String,
        app_state: Option<serde_json::Value>,
    },

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    #[error("Token exchange failed: {0}")]
    Exchange(#[from] TransportError),

    #[error("ID token verification failed: {0}")]
    IdToken(String),

    #[error("Platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`RedirectError`], recorded by the callback state machine
/// when it ends in the failed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingParams,
    InvalidState,
    Authorization,
    MissingCode,
    Exchange,
    IdToken,
    PlatformUnsupported,
    Config,
    Storage,
}

impl RedirectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RedirectError::MissingParams => ErrorKind::MissingParams,
            RedirectError::InvalidState => ErrorKind::InvalidState,
            RedirectError::Authorization { .. } => ErrorKind::Authorization,
            RedirectError::MissingAuthorizationCode => ErrorKind::MissingCode,
            RedirectError::Exchange(_) => ErrorKind::Exchange,
            RedirectError::IdToken(_) => ErrorKind::IdToken,
            RedirectError::PlatformUnsupported(_) => ErrorKind::PlatformUnsupported,
            RedirectError::Config(_) | RedirectError::Url(_) => ErrorKind::Config,
            RedirectError::Storage(_) | RedirectError::Serialization(_) => ErrorKind::Storage,
        }
    }
}

/// Failures of the token endpoint round trip.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {error}")]
    Status {
        status: u16,
        error: String,
        error_description: Option<String>,
    },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode record: {0}")]
    Encode(String),
}
