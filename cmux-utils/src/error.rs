//! Error type shared by the cmux crates
//!
//! Command-level failures reported by the server travel as protocol
//! errors; this type covers everything around them: files, the socket,
//! framing and configuration.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CmuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Socket

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Socket not found at {path}. Is cmux running?")]
    ServerNotRunning { path: PathBuf },

    /// No reply within the client deadline; the command may still have run
    #[error("Command timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Socket closed")]
    ConnectionClosed,

    #[error("Access denied")]
    AccessDenied,

    // Framing

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Mismatched response id: expected {expected}, got {got}")]
    ResponseIdMismatch { expected: String, got: String },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// An `ERROR:` line or `ok:false` envelope, shown as the server sent it
    #[error("{0}")]
    Remote(String),

    // Configuration

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CmuxError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CmuxError>;
