//! Error types for the multiplexing client.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Discovery | [`Error::Discovery`], [`Error::Http`] |
//! | Routing | [`Error::NotReady`], [`Error::MethodNotFound`] |
//! | Call | [`Error::InvalidPayload`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Json`] |
//!
//! Most transport-level failures are *not* surfaced through these variants:
//! connection errors and closures are announced on the
//! [`EventBus`](crate::bus::EventBus) instead, and a call whose connection
//! dies before the response arrives never settles at all.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Client configuration error.
    ///
    /// Returned when the builder is given invalid or incomplete settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// Service discovery document could not be turned into a routing table.
    ///
    /// Returned when the discovery response is well-formed JSON but
    /// describes an unusable endpoint (e.g. an invalid host).
    #[error("Service discovery error: {message}")]
    Discovery {
        /// Description of the discovery error.
        message: String,
    },

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// The client has not completed service discovery.
    ///
    /// Returned when a call is issued before `connect()` succeeded.
    #[error("Client is not ready: service discovery has not completed")]
    NotReady,

    /// No discovered service advertises the requested method path.
    #[error("No service advertises method: {path}")]
    MethodNotFound {
        /// The unrouteable method path.
        path: String,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// The call payload cannot carry the injected routing fields.
    #[error("Invalid call payload: {message}")]
    InvalidPayload {
        /// Description of the payload problem.
        message: String,
    },

    /// A pending call's resolution channel went away before a response.
    ///
    /// Maps the receiver error of the call's oneshot channel. The pending
    /// table holds every sender until its response arrives, even across a
    /// connection close, so this is not produced during normal operation.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error from the discovery bootstrap call.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Creates a method-not-found error.
    #[inline]
    pub fn method_not_found(path: impl Into<String>) -> Self {
        Self::MethodNotFound { path: path.into() }
    }

    /// Creates an invalid-payload error.
    #[inline]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from the discovery bootstrap.
    #[inline]
    #[must_use]
    pub fn is_discovery_error(&self) -> bool {
        matches!(self, Self::Discovery { .. } | Self::Http(_))
    }

    /// Returns `true` if this error is a routing failure.
    ///
    /// Routing failures mean the call was rejected before anything was
    /// sent; the remote services were never involved.
    #[inline]
    #[must_use]
    pub fn is_routing_error(&self) -> bool {
        matches!(self, Self::NotReady | Self::MethodNotFound { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing discovery URL");
        assert_eq!(err.to_string(), "Configuration error: missing discovery URL");
    }

    #[test]
    fn test_method_not_found_display() {
        let err = Error::method_not_found("/ping/");
        assert_eq!(err.to_string(), "No service advertises method: /ping/");
    }

    #[test]
    fn test_is_discovery_error() {
        assert!(Error::discovery("bad host").is_discovery_error());
        assert!(!Error::NotReady.is_discovery_error());
    }

    #[test]
    fn test_is_routing_error() {
        assert!(Error::NotReady.is_routing_error());
        assert!(Error::method_not_found("/x/").is_routing_error());
        assert!(!Error::config("x").is_routing_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
