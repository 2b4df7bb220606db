//! Pooled WebSocket connection and its event loop.
//!
//! Each discovered service gets at most one [`Connection`]. Opening one
//! spawns a tokio task that dials the service's endpoint and then drives
//! both directions of the socket:
//!
//! - Outbound frames are queued on a command channel. Frames submitted
//!   before the socket finishes opening simply wait in the channel and are
//!   flushed in FIFO order once the transport is up, so callers never need
//!   to care about readiness.
//! - Inbound frames are parsed, matched against the shared pending-call
//!   table by correlation id, and announced on the event bus.
//!
//! When the task ends, whether by remote close, transport error or
//! shutdown, the connection evicts itself from the pool and announces
//! `application-error`/`WEBSOCKET_CLOSED` exactly once. Pending calls whose
//! response would have arrived on this connection are left untouched: their
//! futures never settle, by contract.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::bus::{ClientEvent, ErrorKind, EventBus};
use crate::client::correlator::Correlator;
use crate::identifiers::{ConnectionId, ServiceId};
use crate::protocol::ServiceResponse;
use crate::transport::pool::PoolShared;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the connection's event loop.
enum ConnectionCommand {
    /// Send a serialized frame, queueing it until the socket is open.
    Send(String),
    /// Close the socket and end the event loop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one pooled WebSocket connection.
///
/// Cheap to clone; clones feed the same event-loop task.
pub struct Connection {
    /// Generation id guarding pool eviction.
    id: ConnectionId,
    /// The service this connection belongs to.
    service_id: ServiceId,
    /// Channel into the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            service_id: self.service_id.clone(),
            command_tx: self.command_tx.clone(),
        }
    }
}

impl Connection {
    /// Opens a connection to `endpoint` and spawns its event loop.
    ///
    /// Returns immediately; the socket may still be connecting. Frames
    /// submitted through [`send`](Self::send) in the meantime are flushed
    /// once it opens.
    pub(crate) fn open(
        service_id: ServiceId,
        endpoint: Url,
        bus: EventBus,
        correlator: Arc<Correlator>,
        pool: Arc<PoolShared>,
    ) -> Self {
        let id = ConnectionId::next();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let connection = Self {
            id,
            service_id: service_id.clone(),
            command_tx,
        };

        let loop_bus = bus.clone();
        tokio::spawn(async move {
            Self::run(id, &service_id, endpoint, command_rx, &loop_bus, &correlator).await;

            // The pool entry may already belong to a replacement; eviction
            // is a no-op in that case.
            pool.evict(&service_id, id);
            loop_bus.trigger(ClientEvent::ApplicationError {
                kind: ErrorKind::WebsocketClosed,
                context: service_id.to_string(),
            });
        });

        connection
    }

    /// Returns this connection's generation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the service this connection belongs to.
    #[inline]
    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Submits a serialized frame for sending.
    ///
    /// Frames are delivered in submission order. There is no delivery
    /// guarantee: a frame submitted to a connection whose event loop has
    /// already ended is dropped.
    pub fn send(&self, frame: String) {
        if self
            .command_tx
            .send(ConnectionCommand::Send(frame))
            .is_err()
        {
            warn!(service = %self.service_id, "Dropped frame for closed connection");
        }
    }

    /// Closes the socket and ends the event loop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Dials the endpoint and drives the socket until it closes.
    async fn run(
        id: ConnectionId,
        service_id: &ServiceId,
        endpoint: Url,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        bus: &EventBus,
        correlator: &Correlator,
    ) {
        debug!(connection = %id, service = %service_id, url = %endpoint, "Opening connection");

        let stream = match connect_async(endpoint.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!(service = %service_id, error = %e, "WebSocket connect failed");
                bus.trigger(ClientEvent::ApplicationError {
                    kind: ErrorKind::WebsocketError,
                    context: service_id.to_string(),
                });
                return;
            }
        };

        debug!(connection = %id, service = %service_id, "Connection open");
        let (mut ws_write, mut ws_read) = stream.split();

        loop {
            tokio::select! {
                // Outbound frames (and shutdown) from the client.
                command = command_rx.recv() => match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        trace!(connection = %id, service = %service_id, "Sending frame");
                        if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                            error!(service = %service_id, error = %e, "WebSocket send failed");
                            bus.trigger(ClientEvent::ApplicationError {
                                kind: ErrorKind::WebsocketError,
                                context: service_id.to_string(),
                            });
                            break;
                        }
                    }

                    Some(ConnectionCommand::Shutdown) => {
                        debug!(connection = %id, "Shutdown command received");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!(connection = %id, "Command channel closed");
                        break;
                    }
                },

                // Inbound frames from the service.
                message = ws_read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        Self::handle_incoming(text.as_str(), service_id, bus, correlator);
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %id, service = %service_id, "WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(service = %service_id, error = %e, "WebSocket error");
                        bus.trigger(ClientEvent::ApplicationError {
                            kind: ErrorKind::WebsocketError,
                            context: service_id.to_string(),
                        });
                        break;
                    }

                    None => {
                        debug!(connection = %id, service = %service_id, "WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                },
            }
        }

        debug!(connection = %id, service = %service_id, "Event loop terminated");
    }

    /// Handles one inbound text frame.
    ///
    /// Malformed frames are dropped without resolving anything; the
    /// response-complete event fires for every parseable frame, matched or
    /// not.
    fn handle_incoming(
        text: &str,
        service_id: &ServiceId,
        bus: &EventBus,
        correlator: &Correlator,
    ) {
        let response = match ServiceResponse::parse(text) {
            Ok(response) => response,
            Err(e) => {
                warn!(service = %service_id, error = %e, "Dropping unparseable frame");
                return;
            }
        };

        let correlation_id = response.id;
        let path = correlator.complete(correlation_id, response.into_result());
        if path.is_none() {
            warn!(service = %service_id, id = %correlation_id, "Response for unknown call");
        }

        bus.trigger(ClientEvent::ResponseComplete {
            service_id: service_id.clone(),
            path: path.unwrap_or_default(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
