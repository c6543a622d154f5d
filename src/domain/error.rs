use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Remote gateway call failed. `kind` carries the gateway's own
    /// classification so callers can tell card declines from connectivity
    /// problems.
    #[error("gateway ({kind}): {message}")]
    Gateway { kind: String, message: String },

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
