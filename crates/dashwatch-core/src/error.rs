//! Error types for the backing object store.
//!
//! These errors are produced by [`ObjectStore`](crate::store::ObjectStore)
//! implementations. The informer consumes them internally (reconnect with
//! backoff); they never reach event handlers.

use std::fmt;

/// Errors that can occur while listing or watching the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to reach the backing store.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A response from the store could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },

    /// The requested resource version is no longer available; a relist is required.
    #[error("Resource version expired: {message}")]
    Expired {
        /// Message reported by the store.
        message: String,
    },

    /// The store answered with an unexpected status.
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// Numeric status code reported by the store.
        status: u16,
        /// Message reported by the store.
        message: String,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a new `Expired` error.
    #[must_use]
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the watch position is gone and the caller must relist.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Decode { .. } => ErrorCategory::Validation,
            Self::Expired { .. } => ErrorCategory::Expired,
            Self::Status { .. } => ErrorCategory::Remote,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connectivity problem.
    Infrastructure,
    /// Malformed data from the store.
    Validation,
    /// Watch position too old.
    Expired,
    /// Store rejected the request.
    Remote,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Validation => write!(f, "validation"),
            Self::Expired => write!(f, "expired"),
            Self::Remote => write!(f, "remote"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
