//! Result and error types for Bridgeprobe.

use crate::channel::ChannelError;
use thiserror::Error;

/// Result type for Bridgeprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur in Bridgeprobe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No mock matched and no original bridge is reachable
    #[error("Bridge unavailable: no mock and no original bridge for '{command}'")]
    BridgeUnavailable {
        /// Command that could not be routed
        command: String,
    },

    /// Deliberately configured mock failure.
    ///
    /// Displays as the bare configured message so callers observe exactly
    /// what the mock was told to fail with.
    #[error("{message}")]
    Mock {
        /// Mocked command
        command: String,
        /// Configured error message
        message: String,
    },

    /// The real bridge rejected a delegated call
    #[error("Bridge call '{command}' failed: {message}")]
    Bridge {
        /// Command that failed
        command: String,
        /// Rejection message from the application
        message: String,
    },

    /// A wait or search exceeded its budget
    #[error("Timed out after {ms}ms waiting for {waiting_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        waiting_for: String,
    },

    /// Target element or item absent after exhaustive search
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing target
        what: String,
    },

    /// Post-hoc verification mismatch
    #[error("Assertion failed: {message} (expected {expected}, actual {actual})")]
    AssertionFailed {
        /// What was being asserted
        message: String,
        /// Expected value
        expected: String,
        /// Actual value
        actual: String,
    },

    /// Explicit failure raised by a test body
    #[error("Test failed: {message}")]
    Failed {
        /// Failure reason
        message: String,
    },

    /// Remote execution channel failure
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Operation called in a state that does not allow it
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Create an assertion failure naming expected vs. actual
    #[must_use]
    pub fn assertion(
        message: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::AssertionFailed {
            message: message.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(ms: u64, waiting_for: impl Into<String>) -> Self {
        Self::Timeout {
            ms,
            waiting_for: waiting_for.into(),
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Message as the calling UI code would see it for a bridge call.
    ///
    /// Mock and bridge rejections carry the raw message; everything else
    /// uses the display form.
    #[must_use]
    pub fn bridge_message(&self) -> String {
        match self {
            Self::Mock { message, .. } | Self::Bridge { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error is a not-found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
