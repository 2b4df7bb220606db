//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`MuxClient`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use wsmux::MuxClient;
//!
//! # fn example() -> wsmux::Result<()> {
//! let client = MuxClient::builder()
//!     .discovery_url("http://localhost:7007/discover/")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::discovery::ServiceDirectory;
use crate::error::{Error, Result};

use super::core::MuxClient;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`MuxClient`] instance.
///
/// Use [`MuxClient::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// URL of the service discovery endpoint.
    discovery_url: Option<String>,
    /// HTTP client used for the discovery call.
    http: Option<reqwest::Client>,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new client builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service discovery URL.
    ///
    /// # Arguments
    ///
    /// * `url` - Discovery endpoint (e.g. "http://localhost:7007/discover/")
    #[inline]
    #[must_use]
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    /// Sets a custom HTTP client for the discovery call.
    ///
    /// Defaults to a plain [`reqwest::Client`] when not set.
    #[inline]
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the discovery URL is missing or invalid.
    pub fn build(self) -> Result<MuxClient> {
        let url = self.validate_discovery_url()?;
        let http = self.http.unwrap_or_default();

        Ok(MuxClient::new(ServiceDirectory::new(http, url)))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the discovery URL configuration.
    fn validate_discovery_url(&self) -> Result<Url> {
        let raw = self.discovery_url.as_ref().ok_or_else(|| {
            Error::config(
                "Service discovery URL is required. Use .discovery_url() to set it.\n\
                 Example: MuxClient::builder().discovery_url(\"http://localhost:7007/discover/\")",
            )
        })?;

        Url::parse(raw).map_err(|e| Error::config(format!("Invalid discovery URL {raw}: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
