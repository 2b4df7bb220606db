//! # wsmux
//!
//! Multiplexing WebSocket RPC client with HTTP service discovery.
//!
//! A single [`MuxClient`] fronts a fleet of WebSocket services: a discovery
//! endpoint maps method paths to services, the client keeps one lazily-dialed
//! connection per service, and every call is correlated with its response by
//! a numeric id injected into the frame.
//!
//! ## Features
//!
//! - HTTP service discovery resolving method paths to WebSocket endpoints
//! - One pooled connection per service, dialed on first use
//! - Frames queued while a connection opens, flushed in order
//! - Monotonic correlation ids matching each response to its call
//! - Event bus announcing calls, completions and connectivity errors
//! - Readiness callbacks that fire once discovery succeeds
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use wsmux::{EventId, MuxClient};
//!
//! #[tokio::main]
//! async fn main() -> wsmux::Result<()> {
//!     let client = MuxClient::builder()
//!         .discovery_url("http://localhost:7007/discover/")
//!         .build()?;
//!
//!     client.events().subscribe(EventId::ApplicationError, |event| {
//!         eprintln!("transport trouble: {event:?}");
//!     });
//!
//!     client.connect().await?;
//!
//!     let result = client.call_service("/helloworld/", json!({})).await?;
//!     println!("{result}");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | Event bus and client event types |
//! | `client` | [`MuxClient`] façade, builder and pending-call table |
//! | `discovery` | Discovery endpoint client and routing table |
//! | `error` | Error types for all operations |
//! | `identifiers` | Newtype ids for services, calls and connections |
//! | `protocol` | Wire frames exchanged with services |
//! | `transport` | Pooled WebSocket connections |

// ============================================================================
// Modules
// ============================================================================

pub mod bus;
pub mod client;
pub mod discovery;
pub mod error;
pub mod identifiers;
pub mod protocol;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{ClientEvent, ErrorKind, EventBus, EventId, Subscription};
pub use client::{ClientBuilder, MuxClient, ReadyListener, RemoteClient};
pub use discovery::{RoutingTable, ServiceDescriptor, ServiceDirectory};
pub use error::{Error, Result};
pub use identifiers::{ConnectionId, CorrelationId, ServiceId};
pub use protocol::{CallFrame, ServiceResponse};
pub use transport::{Connection, ConnectionPool};
