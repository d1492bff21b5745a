use thiserror::Error;

/// Common error type for entity bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid entity id '{0}': expected '<category>.<object_id>'")]
    InvalidEntityId(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
