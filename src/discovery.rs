//! Service discovery bootstrap and routing table.
//!
//! The client learns its connection topology dynamically: one HTTP GET
//! against a configured discovery URL returns a JSON document describing
//! every available service instance, its WebSocket endpoint and the method
//! paths it serves. That document is turned into an immutable
//! [`RoutingTable`] which answers, for the rest of the client's lifetime,
//! "which service owns this method path and where does it live".
//!
//! # Discovery Document
//!
//! ```json
//! {
//!   "autocomplete-1": {
//!     "host": "localhost",
//!     "websocket-port": 9000,
//!     "methods": ["/autocomplete/"]
//!   }
//! }
//! ```
//!
//! No other fields are recognized. Discovery runs exactly once per client
//! lifetime and is never retried automatically.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ServiceId;

// ============================================================================
// ServiceDescriptor
// ============================================================================

/// One service instance as described by the discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescriptor {
    /// Host the service's WebSocket endpoint listens on.
    pub host: String,

    /// Port of the WebSocket endpoint.
    #[serde(rename = "websocket-port")]
    pub port: u16,

    /// Method paths this instance serves.
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ServiceDescriptor {
    /// Builds the `ws://` endpoint URL for this instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] when the host does not form a valid URL.
    pub fn endpoint(&self) -> Result<Url> {
        let raw = format!("ws://{}:{}", self.host, self.port);
        Url::parse(&raw).map_err(|e| Error::discovery(format!("invalid endpoint {raw}: {e}")))
    }
}

// ============================================================================
// RoutingTable
// ============================================================================

/// Immutable mapping from method path to service and from service to endpoint.
///
/// Built once from the discovery document; read-only thereafter. Every
/// method path maps to at most one service: when two services advertise the
/// same path the last writer wins, deterministically in serviceId order.
#[derive(Debug, Default)]
pub struct RoutingTable {
    methods: FxHashMap<String, ServiceId>,
    endpoints: FxHashMap<ServiceId, Url>,
}

impl RoutingTable {
    /// Builds a routing table from parsed service descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] when a descriptor's endpoint is invalid.
    pub fn from_descriptors(
        descriptors: BTreeMap<String, ServiceDescriptor>,
    ) -> Result<Self> {
        let mut methods = FxHashMap::default();
        let mut endpoints = FxHashMap::default();

        for (service_id, descriptor) in descriptors {
            let service_id = ServiceId::new(service_id);
            let endpoint = descriptor.endpoint()?;
            debug!(
                service = %service_id,
                endpoint = %endpoint,
                methods = descriptor.methods.len(),
                "Registered service"
            );

            endpoints.insert(service_id.clone(), endpoint);
            for method in descriptor.methods {
                methods.insert(method, service_id.clone());
            }
        }

        Ok(Self { methods, endpoints })
    }

    /// Returns the service owning a method path.
    #[inline]
    #[must_use]
    pub fn service_for(&self, path: &str) -> Option<&ServiceId> {
        self.methods.get(path)
    }

    /// Returns the WebSocket endpoint of a service.
    #[inline]
    #[must_use]
    pub fn endpoint(&self, service_id: &ServiceId) -> Option<&Url> {
        self.endpoints.get(service_id)
    }

    /// Returns the number of known services.
    #[inline]
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns the number of routable method paths.
    #[inline]
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

// ============================================================================
// ServiceDirectory
// ============================================================================

/// Resolves the routing table via the one-shot discovery call.
#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    http: reqwest::Client,
    url: Url,
}

impl ServiceDirectory {
    /// Creates a directory pointed at a discovery URL.
    #[inline]
    #[must_use]
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    /// Returns the configured discovery URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Performs the discovery request and builds the routing table.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] on network failure, non-2xx status or a malformed
    ///   response body
    /// - [`Error::Discovery`] when the document describes an invalid endpoint
    pub async fn discover(&self) -> Result<RoutingTable> {
        debug!(url = %self.url, "Running service discovery");

        let descriptors: BTreeMap<String, ServiceDescriptor> = self
            .http
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let table = RoutingTable::from_descriptors(descriptors)?;

        info!(
            services = table.service_count(),
            methods = table.method_count(),
            "Service discovery complete"
        );

        Ok(table)
    }
}

// ============================================================================
// Tests
// ============================================================================
