use thiserror::Error;

/// Every failure the harness core can report. Each variant renders a
/// human-readable reason; `kind()` gives the stable name used in the
/// HTTP error body.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("schema violation on field `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("truncated {msg_type} message: needed {needed} bytes, {available} available")]
    TruncatedMessage {
        msg_type: String,
        needed: usize,
        available: usize,
    },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("handshake required: `{msg_type}` cannot be sent before init has been exchanged")]
    HandshakeRequired { msg_type: String },

    #[error("no connection with id {0}")]
    UnknownConnection(String),

    #[error("connection {0} is already established")]
    AlreadyConnected(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("exchange log for connection {connection_id} is full ({capacity} entries)")]
    StorageExhausted {
        connection_id: String,
        capacity: usize,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request body is larger than {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(#[from] warp::Error),
}

impl Error {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownType(_) => "UnknownType",
            Error::SchemaViolation { .. } => "SchemaViolation",
            Error::TruncatedMessage { .. } => "TruncatedMessage",
            Error::Malformed(_) => "Malformed",
            Error::HandshakeRequired { .. } => "HandshakeRequired",
            Error::UnknownConnection(_) => "UnknownConnection",
            Error::AlreadyConnected(_) => "AlreadyConnected",
            Error::ConnectionFailed(_) => "ConnectionFailed",
            Error::Timeout { .. } => "Timeout",
            Error::StorageExhausted { .. } => "StorageExhausted",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::BodyTooLarge { .. } => "PayloadTooLarge",
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
            Error::Json(_) => "Json",
            Error::Server(_) => "Server",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
