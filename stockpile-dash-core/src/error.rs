//! Error types for stockpile-dash-core

use thiserror::Error;

/// Main error type for the stockpile-dash-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid server address or channel path
    #[error("invalid channel URL: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket transport error
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed Engine.IO / Socket.IO frame
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for stockpile-dash-core
pub type Result<T> = std::result::Result<T, Error>;
