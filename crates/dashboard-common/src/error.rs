//! Error types for the hub dashboard.

use thiserror::Error;

/// Result type alias using DashError.
pub type DashResult<T> = Result<T, DashError>;

/// Coarse grouping of [`DashError`] used to decide how far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-2xx status, connection failure, timeout. The field stays stale.
    Transport,
    /// Missing key, short array, non-numeric value. The field stays stale.
    Payload,
    /// WebSocket conversation violated. Aborts the session's fields.
    Protocol,
    /// Asset or canvas problems while drawing.
    Render,
}

/// Primary error type for dashboard operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DashError {
    // === Transport Errors ===
    #[error("HTTP {status} fetching {entity}")]
    HttpStatus { entity: String, status: u16 },

    #[error("Connection failed for {entity}: {message}")]
    Connection { entity: String, message: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("WebSocket closed by hub")]
    SessionClosed,

    // === Payload Errors ===
    #[error("Missing field '{field}' in response for {entity}")]
    MissingField { entity: String, field: String },

    #[error("Non-numeric state for {entity}: {value:?}")]
    NotNumeric { entity: String, value: String },

    #[error("Short response for {entity}: expected at least {expected} entries, got {got}")]
    ShortResponse {
        entity: String,
        expected: usize,
        got: usize,
    },

    #[error("Malformed JSON for {entity}: {message}")]
    Json { entity: String, message: String },

    // === Protocol Errors ===
    #[error("Expected '{expected}' message, got '{got}'")]
    UnexpectedMessage { expected: String, got: String },

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("No response for request {id} after discarding {discarded} messages")]
    UnmatchedResponse { id: u64, discarded: usize },

    #[error("Service call {id} failed: {code}: {message}")]
    ServiceCall {
        id: u64,
        code: String,
        message: String,
    },

    // === Rendering Errors ===
    #[error("Failed to load font: {0}")]
    Font(String),

    #[error("Failed to load icon '{name}': {message}")]
    Icon { name: String, message: String },

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl DashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashError::HttpStatus { .. }
            | DashError::Connection { .. }
            | DashError::Timeout(_)
            | DashError::SessionClosed => ErrorKind::Transport,

            DashError::MissingField { .. }
            | DashError::NotNumeric { .. }
            | DashError::ShortResponse { .. }
            | DashError::Json { .. } => ErrorKind::Payload,

            DashError::UnexpectedMessage { .. }
            | DashError::AuthRejected(_)
            | DashError::UnmatchedResponse { .. }
            | DashError::ServiceCall { .. } => ErrorKind::Protocol,

            DashError::Font(_) | DashError::Icon { .. } | DashError::Render(_) => {
                ErrorKind::Render
            }
        }
    }

    /// True for failures of the WebSocket handshake itself, which abort every
    /// field sourced from that session.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            DashError::UnexpectedMessage { .. } | DashError::AuthRejected(_)
        )
    }

    pub fn payload(entity: &str, err: serde_json::Error) -> Self {
        DashError::Json {
            entity: entity.to_string(),
            message: err.to_string(),
        }
    }
}
