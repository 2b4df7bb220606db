//! Type-safe identifiers for services, calls and connections.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile time.
//!
//! | Type | Purpose | On the wire |
//! |------|---------|-------------|
//! | [`ServiceId`] | Names a discovered service instance | no |
//! | [`CorrelationId`] | Matches a response to its originating call | yes (`messageId` / `id`, numeric) |
//! | [`ConnectionId`] | Distinguishes pooled connection generations | no |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// ServiceId
// ============================================================================

/// Identifier of a discovered service instance.
///
/// Keys the connection pool and the routing table. The value is the
/// property name under which the service appears in the discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a service id from its discovery-document name.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the service id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// CorrelationId
// ============================================================================

/// Numeric identifier correlating a call with its response.
///
/// Sent as `messageId` on outbound frames and echoed back as `id` on
/// inbound frames. Ids are assigned from a monotonically increasing
/// counter, so they are unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Creates a correlation id from a raw value.
    #[inline]
    #[must_use]
    pub const fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Process-wide unique identifier of a pooled connection.
///
/// Never sent on the wire. Guards pool eviction: a closing connection only
/// removes the pool entry if the entry still refers to the same generation,
/// so a replacement connection is never evicted by its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Returns the next connection id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
