//! Unified error handling for the metronome crate
//!
//! Domain modules keep their own error enums (`SchedulerError`,
//! `ClientError`); this module provides the unified [`Error`] that wraps
//! them for use across module boundaries, mostly in the server and binary.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::metadata::ClientError;
pub use crate::scheduler::SchedulerError;

/// Unified error type for the metronome crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduler registry, recurrence and dispatch errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Metadata client errors
    #[error("Metadata client error: {0}")]
    Client(#[from] ClientError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this error is recoverable (the operation can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Client(_) | Self::Http(_) | Self::Io(_) => true,
            Self::Config(_) | Self::Json(_) | Self::Other(_) => false,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
