//! Connection pool keyed by service identifier.
//!
//! The pool owns at most one live [`Connection`] per service. Connections
//! are created lazily on first acquire and evicted when their event loop
//! ends. There is no reconnect or backoff policy; recovery is purely lazy,
//! the next acquire for an evicted service dials a fresh connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ConnectionPool               │
//! │  ┌─────────────────────────────────┐    │
//! │  │ svcA → Connection (ws://a:9000) │    │
//! │  │ svcB → Connection (ws://b:9001) │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use url::Url;

use crate::bus::EventBus;
use crate::client::correlator::Correlator;
use crate::identifiers::{ConnectionId, ServiceId};
use crate::transport::Connection;

// ============================================================================
// PoolShared
// ============================================================================

/// State shared between the pool handle and every connection task.
pub(crate) struct PoolShared {
    /// Live connections by service id.
    connections: RwLock<FxHashMap<ServiceId, Connection>>,

    /// Bus used by connection tasks for lifecycle announcements.
    bus: EventBus,

    /// Pending-call table handed to every connection's inbound handler.
    correlator: Arc<Correlator>,
}

impl PoolShared {
    /// Removes the entry for `service_id` if it still refers to
    /// generation `id`.
    ///
    /// Called by a connection task when its event loop ends. The guard
    /// prevents a closed connection from evicting its replacement.
    pub(crate) fn evict(&self, service_id: &ServiceId, id: ConnectionId) {
        let mut connections = self.connections.write();
        if connections
            .get(service_id)
            .is_some_and(|connection| connection.id() == id)
        {
            connections.remove(service_id);
            debug!(service = %service_id, connection = %id, "Connection evicted from pool");
        }
    }
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Lazily-populated pool of per-service WebSocket connections.
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub(crate) fn new(bus: EventBus, correlator: Arc<Correlator>) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                connections: RwLock::new(FxHashMap::default()),
                bus,
                correlator,
            }),
        }
    }

    /// Returns the live connection for `service_id`, dialing one if needed.
    ///
    /// The returned connection may still be opening; frames submitted to it
    /// are queued until the socket is up.
    pub fn acquire(&self, service_id: &ServiceId, endpoint: &Url) -> Connection {
        if let Some(connection) = self.shared.connections.read().get(service_id) {
            return connection.clone();
        }

        let mut connections = self.shared.connections.write();
        // Another caller may have won the dial race while we waited.
        if let Some(connection) = connections.get(service_id) {
            return connection.clone();
        }

        let connection = Connection::open(
            service_id.clone(),
            endpoint.clone(),
            self.shared.bus.clone(),
            Arc::clone(&self.shared.correlator),
            Arc::clone(&self.shared),
        );
        debug!(
            service = %service_id,
            connection = %connection.id(),
            url = %endpoint,
            "Opened pooled connection"
        );

        connections.insert(service_id.clone(), connection.clone());
        connection
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.connections.read().len()
    }

    /// Returns `true` if a live connection exists for `service_id`.
    #[inline]
    #[must_use]
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.shared.connections.read().contains_key(service_id)
    }

    /// Shuts down every pooled connection.
    pub fn shutdown(&self) {
        let connections: Vec<Connection> = {
            let mut map = self.shared.connections.write();
            map.drain().map(|(_, connection)| connection).collect()
        };

        if connections.is_empty() {
            return;
        }

        info!(count = connections.len(), "Shutting down pooled connections");
        for connection in connections {
            connection.shutdown();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
