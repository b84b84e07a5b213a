use thiserror::Error;

/// Failure talking to an external collaborator (calendar, search, synthesis, notification)
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    ApiError {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("{service} timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Failure in one of the durable stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    CacheError(#[from] crate::services::cache::CacheError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Anything that stops the process before the first tick
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    #[error("Store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("Calendar transport unreachable: {0}")]
    Calendar(#[source] CollaboratorError),

    #[error("Collaborator setup failed: {0}")]
    Collaborator(#[source] CollaboratorError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}
