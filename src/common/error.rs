//! Error types for the debug server
//!
//! Transport, spawn and state problems are mostly reported as session events
//! rather than errors; what remains here are the failures a caller can act on.

use std::io;
use thiserror::Error;

use crate::wire::literal::LiteralError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debug server
#[derive(Error, Debug)]
pub enum Error {
    // === Registry Errors ===
    #[error("An entry for {key} already exists")]
    DuplicateKey { key: String },

    #[error("No entry for {key}")]
    NotFound { key: String },

    #[error("Invalid breakpoint location: {0}")]
    InvalidLocation(String),

    // === Interface Errors ===
    #[error("'{request}' is not available for {client_type} clients")]
    Unsupported {
        request: String,
        client_type: String,
    },

    #[error("Unknown client type '{0}'")]
    UnknownClientType(String),

    // === Transport Errors ===
    #[error("Failed to bind debug server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    // === Process Errors ===
    #[error("Failed to start '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    // === Protocol Errors ===
    #[error("Malformed '{token}' payload: {reason}")]
    Protocol { token: String, reason: String },

    #[error("Literal error: {0}")]
    Literal(#[from] LiteralError),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Console Errors ===
    #[error("{0}")]
    Usage(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a duplicate key error from anything printable
    pub fn duplicate_key(key: impl std::fmt::Debug) -> Self {
        Self::DuplicateKey {
            key: format!("{:?}", key),
        }
    }

    /// Create a not found error from anything printable
    pub fn not_found(key: impl std::fmt::Debug) -> Self {
        Self::NotFound {
            key: format!("{:?}", key),
        }
    }

    /// Create an unsupported request error
    pub fn unsupported(request: &str, client_type: &str) -> Self {
        Self::Unsupported {
            request: request.to_string(),
            client_type: client_type.to_string(),
        }
    }

    /// Create a protocol error for a response token
    pub fn protocol(token: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a spawn failure error
    pub fn spawn_failed(program: &str, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            program: program.to_string(),
            reason: reason.into(),
        }
    }
}
