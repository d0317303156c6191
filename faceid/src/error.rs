use thiserror::Error;

/// Errors returned by faceid operations.
#[derive(Debug, Error)]
pub enum FaceIdError {
    #[error("faceid: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("faceid: serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("faceid: unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("faceid: identity already exists: {0}")]
    IdentityExists(String),
}
