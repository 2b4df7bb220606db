//! WebSocket transport layer.
//!
//! One pooled connection per discovered service carries the multiplexed
//! call traffic. The pool creates connections lazily and forgets them when
//! they die; correlation of responses to calls happens inside each
//! connection's event loop against the shared pending-call table.
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionPool::acquire` returns the live connection or dials a
//!    new one (non-blocking; the socket opens in the background)
//! 2. `Connection::send` queues frames, flushed FIFO once open
//! 3. inbound frames resolve pending calls and fire bus events
//! 4. on close or error the connection evicts itself and announces
//!    `WEBSOCKET_CLOSED`; the next acquire dials a replacement
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Single connection and its event loop |
//! | `pool` | Per-service connection pool |

// ============================================================================
// Submodules
// ============================================================================

/// Pooled WebSocket connection and event loop.
pub mod connection;

/// Connection pool keyed by service identifier.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use pool::ConnectionPool;
