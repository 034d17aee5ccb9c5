use thiserror::Error;

/// Failures surfaced by the backend capability clients.
///
/// The document and storage clients convert these into `isError` envelopes
/// before they reach the dispatcher; the auth client propagates them as-is.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Firebase initialization failed: {0}")]
    NotInitialized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BucketUnreachable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Backend(String),
}

impl ClientError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        ClientError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
