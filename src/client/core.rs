//! Client façade coordinating discovery, pooling and correlation.
//!
//! [`MuxClient`] is the public entry point. One instance owns its own
//! routing table, connection pool and pending-call table; there is no
//! process-global state, so independent clients coexist in one process.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use wsmux::MuxClient;
//!
//! # async fn example() -> wsmux::Result<()> {
//! let client = MuxClient::builder()
//!     .discovery_url("http://localhost:7007/discover/")
//!     .build()?;
//!
//! client.connect().await?;
//! let greeting = client.call_service("/helloworld/", json!({})).await?;
//! println!("{greeting}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::bus::{ClientEvent, ErrorKind, EventBus};
use crate::discovery::{RoutingTable, ServiceDirectory};
use crate::error::{Error, Result};
use crate::identifiers::ServiceId;
use crate::protocol::CallFrame;
use crate::transport::ConnectionPool;

use super::correlator::Correlator;
use super::builder::ClientBuilder;

// ============================================================================
// Types
// ============================================================================

/// Readiness callback type.
pub type ReadyListener = Box<dyn FnOnce() + Send>;

/// Readiness state and the listeners awaiting it.
enum ReadyState {
    /// Discovery has not succeeded yet; listeners queue up in order.
    Pending(Vec<ReadyListener>),
    /// Discovery succeeded; the routing table is in place.
    Ready,
}

/// Internal shared state for the client.
struct ClientInner {
    /// Resolves the routing table at startup.
    directory: ServiceDirectory,

    /// Bus carrying call and connectivity announcements.
    bus: EventBus,

    /// Pending-call table shared with every pooled connection.
    correlator: Arc<Correlator>,

    /// Per-service connection pool.
    pool: ConnectionPool,

    /// Written once by discovery, read-only afterwards.
    routing: RwLock<Option<RoutingTable>>,

    /// Readiness state and queued listeners.
    readiness: Mutex<ReadyState>,
}

// ============================================================================
// MuxClient
// ============================================================================

/// Multiplexing RPC client.
///
/// The client is responsible for:
/// - Resolving the method → service → endpoint routing via discovery
/// - Pooling one connection per service, created lazily
/// - Correlating each call with exactly one future response
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct MuxClient {
    inner: Arc<ClientInner>,
}

// ============================================================================
// MuxClient - Display
// ============================================================================

impl fmt::Debug for MuxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxClient")
            .field("discovery_url", self.inner.directory.url())
            .field("ready", &self.is_ready())
            .field("connections", &self.inner.pool.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MuxClient - Public API
// ============================================================================

impl MuxClient {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the event bus this client announces on.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Returns `true` once service discovery has completed successfully.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.readiness.lock(), ReadyState::Ready)
    }

    /// Returns the number of live pooled connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.pool.connection_count()
    }

    /// Resolves the service directory and marks the client ready.
    ///
    /// On success every queued readiness listener fires, in registration
    /// order. On failure an `application-error`/`SERVICE_DISCOVERY` event
    /// carrying the discovery URL is announced, the error is returned, and
    /// the client stays not-ready with its listeners still queued; nothing
    /// retries automatically, though the caller may invoke `connect()`
    /// again. Calling `connect()` on a ready client is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] on discovery transport failure or bad status
    /// - [`Error::Discovery`] when the discovery document is unusable
    pub async fn connect(&self) -> Result<()> {
        if self.is_ready() {
            debug!("connect() called on a ready client");
            return Ok(());
        }

        match self.inner.directory.discover().await {
            Ok(table) => {
                *self.inner.routing.write() = Some(table);

                let listeners = {
                    let mut state = self.inner.readiness.lock();
                    match std::mem::replace(&mut *state, ReadyState::Ready) {
                        ReadyState::Pending(listeners) => listeners,
                        ReadyState::Ready => Vec::new(),
                    }
                };

                info!(listeners = listeners.len(), "Client ready");
                for listener in listeners {
                    listener();
                }

                Ok(())
            }

            Err(e) => {
                warn!(
                    url = %self.inner.directory.url(),
                    error = %e,
                    "Service discovery failed"
                );
                self.inner.bus.trigger(ClientEvent::ApplicationError {
                    kind: ErrorKind::ServiceDiscovery,
                    context: self.inner.directory.url().to_string(),
                });
                Err(e)
            }
        }
    }

    /// Registers a callback to run once the client is ready.
    ///
    /// When the client is already ready the listener runs synchronously
    /// before this method returns; otherwise it is queued and fires
    /// exactly once, in registration order, after discovery succeeds.
    pub fn on_ready(&self, listener: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.readiness.lock();
        match &mut *state {
            ReadyState::Pending(listeners) => listeners.push(Box::new(listener)),
            ReadyState::Ready => {
                drop(state);
                listener();
            }
        }
    }

    /// Invokes a remote method and awaits its correlated response.
    ///
    /// The payload must be a JSON object; the method path and a numeric
    /// correlation id are injected into it before sending. The returned
    /// future resolves with the response's `result` field (an empty array
    /// when the response carries none).
    ///
    /// There is no timeout: if the owning connection closes before the
    /// response arrives the future never settles. That closure is
    /// observable on the event bus, not here.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] before `connect()` has succeeded
    /// - [`Error::MethodNotFound`] when no service advertises `path`
    /// - [`Error::InvalidPayload`] when the payload is not a JSON object
    pub async fn call_service(&self, path: &str, payload: Value) -> Result<Value> {
        let (service_id, endpoint) = self.route(path)?;

        let Value::Object(payload) = payload else {
            return Err(Error::invalid_payload("call payload must be a JSON object"));
        };

        let (correlation_id, response) = self.inner.correlator.register(path);

        self.inner.bus.trigger(ClientEvent::ServiceCall {
            service_id: service_id.clone(),
            path: path.to_owned(),
            correlation_id,
        });

        let connection = self.inner.pool.acquire(&service_id, &endpoint);
        let frame = CallFrame::new(path, correlation_id, payload).to_json()?;

        trace!(service = %service_id, path, id = %correlation_id, "Issuing service call");
        connection.send(frame);

        // The sender lives in the pending table until a response resolves
        // it, so this receive only errs if the table itself is gone.
        response.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Closes every pooled connection.
    ///
    /// Pending calls are abandoned; the client itself stays usable and the
    /// next call re-dials lazily.
    pub fn shutdown(&self) {
        self.inner.pool.shutdown();
    }
}

// ============================================================================
// MuxClient - Internal API
// ============================================================================

impl MuxClient {
    /// Creates a client around a service directory.
    pub(crate) fn new(directory: ServiceDirectory) -> Self {
        let bus = EventBus::new();
        let correlator = Arc::new(Correlator::new());
        let pool = ConnectionPool::new(bus.clone(), Arc::clone(&correlator));

        Self {
            inner: Arc::new(ClientInner {
                directory,
                bus,
                correlator,
                pool,
                routing: RwLock::new(None),
                readiness: Mutex::new(ReadyState::Pending(Vec::new())),
            }),
        }
    }

    /// Resolves the owning service and endpoint for a method path.
    fn route(&self, path: &str) -> Result<(ServiceId, Url)> {
        let routing = self.inner.routing.read();
        let table = routing.as_ref().ok_or(Error::NotReady)?;

        let service_id = table
            .service_for(path)
            .ok_or_else(|| Error::method_not_found(path))?;
        let endpoint = table
            .endpoint(service_id)
            .ok_or_else(|| Error::method_not_found(path))?;

        Ok((service_id.clone(), endpoint.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::bus::EventId;

    fn init_tracing() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    /// Serves canned HTTP responses for the discovery endpoint.
    async fn spawn_discovery(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request).await;

                let response = format!(
                    "{status_line}\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{addr}/discover/")
    }

    /// What the stub service should do with each inbound frame.
    enum ServiceBehavior {
        /// Validate the frame and reply with `{"id": <messageId>, "result": "pong"}`.
        Reply,
        /// Read one frame, then close the connection without replying.
        CloseWithoutReply,
    }

    /// Spawns a protocol-speaking WebSocket service and returns its port.
    async fn spawn_service(behavior: ServiceBehavior) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let behavior = Arc::new(behavior);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = Arc::clone(&behavior);
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.expect("upgrade");
                    while let Some(Ok(message)) = ws.next().await {
                        let Message::Text(text) = message else {
                            continue;
                        };

                        let frame: Value =
                            serde_json::from_str(text.as_str()).expect("frame is JSON");
                        let id = frame["messageId"].as_u64().expect("numeric messageId");
                        assert!(frame["wsPath"].is_string(), "frame carries wsPath");

                        match *behavior {
                            ServiceBehavior::Reply => {
                                let reply = json!({"id": id, "result": "pong"});
                                ws.send(Message::Text(reply.to_string().into()))
                                    .await
                                    .expect("reply");
                            }
                            ServiceBehavior::CloseWithoutReply => {
                                let _ = ws.close(None).await;
                                break;
                            }
                        }
                    }
                });
            }
        });

        port
    }

    fn discovery_doc(port: u16, methods: &[&str]) -> String {
        json!({
            "svcA": {
                "host": "127.0.0.1",
                "websocket-port": port,
                "methods": methods,
            }
        })
        .to_string()
    }

    async fn ready_client(port: u16, methods: &[&str]) -> MuxClient {
        let url = spawn_discovery("HTTP/1.1 200 OK", discovery_doc(port, methods)).await;
        let client = MuxClient::builder()
            .discovery_url(url)
            .build()
            .expect("build client");
        client.connect().await.expect("connect");
        client
    }

    #[tokio::test]
    async fn test_call_resolves_with_service_result() {
        init_tracing();
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = Arc::clone(&calls);
        client.events().subscribe(EventId::ServiceCall, move |event| {
            if let ClientEvent::ServiceCall {
                service_id, path, ..
            } = event
            {
                calls_clone.lock().push((service_id.clone(), path.clone()));
            }
        });

        let result = client
            .call_service("/ping/", json!({}))
            .await
            .expect("call resolves");

        assert_eq!(result, json!("pong"));
        assert_eq!(
            *calls.lock(),
            vec![(ServiceId::new("svcA"), "/ping/".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_sequential_calls_share_one_connection() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/", "/echo/"]).await;

        client.call_service("/ping/", json!({})).await.expect("first");
        client
            .call_service("/echo/", json!({"n": 2}))
            .await
            .expect("second");

        assert_eq!(client.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_on_ready_fires_in_order_after_discovery() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let url = spawn_discovery("HTTP/1.1 200 OK", discovery_doc(port, &["/ping/"])).await;
        let client = MuxClient::builder()
            .discovery_url(url)
            .build()
            .expect("build client");

        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            client.on_ready(move || order.lock().push(n));
        }
        assert!(order.lock().is_empty(), "nothing fires before discovery");

        client.connect().await.expect("connect");
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_on_ready_after_readiness_is_synchronous() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        client.on_ready(move || fired_clone.store(true, Ordering::SeqCst));

        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_discovery_failure_reports_and_stays_not_ready() {
        let url = spawn_discovery("HTTP/1.1 503 Service Unavailable", "{}".to_owned()).await;
        let client = MuxClient::builder()
            .discovery_url(url.clone())
            .build()
            .expect("build client");

        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        client
            .events()
            .subscribe(EventId::ApplicationError, move |event| {
                if let ClientEvent::ApplicationError { kind, context } = event {
                    errors_clone.lock().push((*kind, context.clone()));
                }
            });

        let err = client.connect().await.unwrap_err();
        assert!(err.is_discovery_error());
        assert!(!client.is_ready());
        assert_eq!(
            *errors.lock(),
            vec![(ErrorKind::ServiceDiscovery, url)]
        );

        let err = client.call_service("/ping/", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        let err = client
            .call_service("/missing/", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotFound { .. }));
    }

    #[tokio::test]
    async fn test_non_object_payload_is_rejected() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        let err = client.call_service("/ping/", json!(42)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
    }

    #[tokio::test]
    async fn test_connect_on_ready_client_is_noop() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        client.connect().await.expect("second connect");
        assert!(client.is_ready());
    }

    #[tokio::test]
    async fn test_close_before_response_never_settles() {
        init_tracing();
        let port = spawn_service(ServiceBehavior::CloseWithoutReply).await;
        let client = ready_client(port, &["/ping/"]).await;

        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        client
            .events()
            .subscribe(EventId::ApplicationError, move |event| {
                if let ClientEvent::ApplicationError { kind, context } = event {
                    let _ = closed_tx.send((*kind, context.clone()));
                }
            });

        // The call's future must not settle, even though the connection
        // died underneath it.
        let pending = client.call_service("/ping/", json!({}));
        let outcome = timeout(Duration::from_millis(300), pending).await;
        assert!(outcome.is_err(), "call future must stay pending");

        let (kind, context) = closed_rx.recv().await.expect("closed event");
        assert_eq!(kind, ErrorKind::WebsocketClosed);
        assert_eq!(context, "svcA");
        assert!(closed_rx.try_recv().is_err(), "closed fires exactly once");

        assert_eq!(client.inner.correlator.pending_count(), 1);
        assert_eq!(client.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_recovers_lazily_after_close() {
        let port = spawn_service(ServiceBehavior::Reply).await;
        let client = ready_client(port, &["/ping/"]).await;

        client.call_service("/ping/", json!({})).await.expect("call");
        client.shutdown();

        // The pool is empty now; the next call dials a fresh connection.
        assert_eq!(client.connection_count(), 0);
        let result = client
            .call_service("/ping/", json!({}))
            .await
            .expect("call after shutdown");
        assert_eq!(result, json!("pong"));
    }
}
