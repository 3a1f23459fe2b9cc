//! Error types for lpddrtest.

use std::io;
use thiserror::Error;

/// Result type for lpddrtest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for lpddrtest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on an already-open link.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Link could not be opened, or the firmware never produced its
    /// ready prompt during the handshake window.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An expected text pattern was not observed within its deadline.
    ///
    /// Carries the pattern and everything received so far for diagnostics.
    #[error("Timed out waiting for \"{pattern}\" (received {} bytes)", buffer.len())]
    PromptTimeout {
        /// The pattern that was being waited for.
        pattern: String,
        /// The accumulated response buffer at the time of the timeout.
        buffer: String,
    },

    /// An empty response was handed to the result classifier.
    ///
    /// Callers only classify non-empty accumulated buffers; seeing this
    /// indicates a contract violation, not a firmware failure.
    #[error("Empty response cannot be classified")]
    EmptyResponse,

    /// Power-cycle commands failed or the control channel is unavailable.
    #[error("Power control error: {0}")]
    PowerControl(String),

    /// Malformed configuration.
    #[error("Invalid configuration: {field}: {reason}")]
    Validation {
        /// Name of the offending configuration field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The run was cancelled via the cooperative interrupt checker.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a validation error.
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
