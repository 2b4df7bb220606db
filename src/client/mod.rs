//! Client façade and its supporting machinery.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent configuration for [`MuxClient`] |
//! | `core` | The [`MuxClient`] façade itself |
//! | `correlator` | Pending-call table matching responses to calls |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

/// Client façade coordinating discovery, pooling and correlation.
pub mod core;

/// Pending-call table.
pub(crate) mod correlator;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use self::core::{MuxClient, ReadyListener};

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use serde_json::Value;

use crate::error::Result;

// ============================================================================
// RemoteClient
// ============================================================================

/// Capability trait for anything that can issue remote calls.
///
/// Code that only needs to call methods and observe readiness can take a
/// `&dyn RemoteClient` (or a generic bound) instead of the concrete
/// [`MuxClient`], which keeps call sites testable with a stub.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Resolves routing and marks the client ready.
    async fn connect(&self) -> Result<()>;

    /// Registers a callback to run once the client is ready.
    fn on_ready(&self, listener: ReadyListener);

    /// Invokes a remote method and awaits its correlated response.
    async fn call_service(&self, path: &str, payload: Value) -> Result<Value>;
}

#[async_trait]
impl RemoteClient for MuxClient {
    async fn connect(&self) -> Result<()> {
        MuxClient::connect(self).await
    }

    fn on_ready(&self, listener: ReadyListener) {
        MuxClient::on_ready(self, listener);
    }

    async fn call_service(&self, path: &str, payload: Value) -> Result<Value> {
        MuxClient::call_service(self, path, payload).await
    }
}

// ============================================================================
// Tests
// ============================================================================
