//! Error types for mailgate.

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Status-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend failed: {0}")]
    Backend(String),

    #[error("Status record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the forwarding and notification collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Forward to {recipient} failed: {reason}")]
    ForwardFailed { recipient: String, reason: String },

    #[error("Notification send failed: {reason}")]
    NotifyFailed { reason: String },

    #[error("Raw message content unavailable: {0}")]
    RawUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Parse-strategy errors. These never cross the mail parser's public
/// boundary; they are recovered into diagnostic text instead.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Parser {name} failed: {reason}")]
    Strategy { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Web-surface errors, converted into HTTP responses by the router.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
