//! Persistent-connection protocol: request/response correlation over one
//! stream
//!
//! A single long-lived connection carries many concurrently outstanding
//! requests plus unsolicited notifications, interleaved in either direction.
//! [`StreamProtocol`] demultiplexes the inbound side:
//!
//! 1. A spawned reader task feeds raw bytes into a [`MessageBuffer`], which
//!    frames them into complete JSON texts.
//! 2. Each completed text is routed: responses wake the waiter registered
//!    under their correlation id, anything that parses as a request instead
//!    is appended to the notification queue.
//!
//! # Correlation
//!
//! Every non-notification `send` registers a oneshot channel under its
//! request id before writing, so the response is delivered to its waiter
//! the moment it is routed, with no polling. Responses arrive in whatever
//! order the peer produces them; no ordering is implied between sends.
//!
//! # Lifecycle
//!
//! `Connecting → Open → Closed`, with `Closed` terminal. Closing is
//! idempotent and fails every pending waiter with a connection-closed error
//! rather than leaving it to time out. A timeout aborts only the local wait:
//! the request stays written, the connection stays open, and a response that
//! arrives after its waiter gave up is logged and dropped.

use crate::transport::{BoxedReader, BoxedWriter, StreamConnector, StreamPair};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};
use wirecall_core::{Error, MessageBuffer, RequestMessage, ResponseMessage, Result};

/// State of one persistent connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection attempt in flight
    Connecting,
    /// Established; sends and inbound routing are active
    Open,
    /// Released; terminal
    Closed,
}

/// Render a correlation id as a table key.
///
/// Ids are opaque JSON values; strings key by their content, everything
/// else by its JSON rendering.
pub(crate) fn uid_key(uid: &Value) -> String {
    match uid {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Table of waiters for outstanding requests, keyed by correlation id.
///
/// One writer (the reader task routing responses), many readers (one per
/// outstanding send), each on a disjoint key.
#[derive(Clone)]
struct PendingResponses {
    waiters: Arc<Mutex<HashMap<String, oneshot::Sender<Result<ResponseMessage>>>>>,
}

impl PendingResponses {
    fn new() -> Self {
        Self {
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a waiter for the given id; must happen before the request
    /// is written so the response cannot race the registration.
    async fn register(&self, key: String) -> oneshot::Receiver<Result<ResponseMessage>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(key, tx);
        rx
    }

    /// Deliver an outcome to the waiter for `key`.
    ///
    /// Returns false if no waiter is registered (late response after a
    /// timeout, or an id this side never issued).
    async fn complete(&self, key: &str, outcome: Result<ResponseMessage>) -> bool {
        match self.waiters.lock().await.remove(key) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter for `key`, if still registered
    async fn abandon(&self, key: &str) {
        self.waiters.lock().await.remove(key);
    }

    /// Fail every pending waiter with the same error
    async fn fail_all(&self, error: Error) {
        let mut waiters = self.waiters.lock().await;
        for (_, tx) in waiters.drain() {
            let _ = tx.send(Err(error.clone()));
        }
    }
}

/// One persistent connection: owned stream buffer, pending-waiter table,
/// notification queue, and reader task
pub struct StreamProtocol {
    writer: Mutex<BoxedWriter>,
    pending: PendingResponses,
    notifications: Arc<Mutex<Vec<RequestMessage>>>,
    state: Arc<Mutex<ConnectionState>>,
    timeout: Option<Duration>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamProtocol {
    /// Establish a connection through `connector` and start the protocol.
    ///
    /// The configured timeout bounds the connection attempt as well as each
    /// later response wait.
    pub async fn connect(
        connector: &dyn StreamConnector,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Arc<Self>> {
        tracing::info!(host, port, "establishing stream connection");

        let pair = match timeout {
            Some(budget) => tokio::time::timeout(budget, connector.connect(host, port))
                .await
                .map_err(|_| Error::Timeout)??,
            None => connector.connect(host, port).await?,
        };

        Ok(Self::open(pair, timeout).await)
    }

    /// Start the protocol on an already-established connection
    pub async fn open(stream: StreamPair, timeout: Option<Duration>) -> Arc<Self> {
        let pending = PendingResponses::new();
        let notifications = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));

        let reader_task = tokio::spawn(Self::read_loop(
            stream.reader,
            pending.clone(),
            Arc::clone(&notifications),
            Arc::clone(&state),
        ));

        *state.lock().await = ConnectionState::Open;
        tracing::info!("stream connection open");

        Arc::new(Self {
            writer: Mutex::new(stream.writer),
            pending,
            notifications,
            state,
            timeout,
            reader: Mutex::new(Some(reader_task)),
        })
    }

    /// The drain loop: frame inbound bytes and route each completed message
    async fn read_loop(
        mut reader: BoxedReader,
        pending: PendingResponses,
        notifications: Arc<Mutex<Vec<RequestMessage>>>,
        state: Arc<Mutex<ConnectionState>>,
    ) {
        let mut buffer = MessageBuffer::new();
        let mut chunk = [0u8; 4096];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    tracing::info!("connection closed by peer");
                    break;
                }
                Ok(n) => {
                    if let Err(e) = buffer.append_bytes(&chunk[..n]) {
                        tracing::warn!(error = %e, "dropping undecodable chunk");
                        continue;
                    }
                    for text in buffer.drain_messages() {
                        Self::route(&text, &pending, &notifications).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "read failed");
                    break;
                }
            }
        }

        *state.lock().await = ConnectionState::Closed;
        pending.fail_all(Error::ConnectionClosed).await;
    }

    /// Route one completed message text.
    ///
    /// Attempt-then-fallback: anything that parses as a response goes to
    /// the waiter table; a text that is structurally a request instead is
    /// queued as a notification.
    async fn route(
        text: &str,
        pending: &PendingResponses,
        notifications: &Mutex<Vec<RequestMessage>>,
    ) {
        match ResponseMessage::parse(text) {
            Ok(response) => {
                let uid = match &response.uid {
                    Some(uid) => uid.clone(),
                    None => {
                        tracing::warn!("dropping response with no id");
                        return;
                    }
                };
                let key = uid_key(&uid);
                let outcome = match response.error.clone() {
                    Some(error) => Err(Error::Rpc(error)),
                    None => Ok(response),
                };
                if pending.complete(&key, outcome).await {
                    tracing::debug!(id = %key, "response delivered");
                } else {
                    tracing::debug!(id = %key, "unclaimed response dropped");
                }
            }
            Err(_) => match RequestMessage::unmarshal(text) {
                Ok(request) => {
                    tracing::debug!(method = %request.method, "notification received");
                    notifications.lock().await.push(request);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unroutable message dropped");
                }
            },
        }
    }

    /// Write a request and, unless it is a notification, wait for the
    /// correlated response.
    ///
    /// Returns `Ok(None)` for notifications. Fails with a timeout error if
    /// the configured budget elapses first; the local wait is abandoned but
    /// the connection stays open.
    pub async fn send(&self, request: &RequestMessage) -> Result<Option<ResponseMessage>> {
        if self.state().await == ConnectionState::Closed {
            return Err(Error::ConnectionClosed);
        }

        let text = request.marshal()?;

        if request.notification {
            self.write(text.as_bytes()).await?;
            return Ok(None);
        }

        let uid = request
            .uid
            .as_ref()
            .ok_or_else(|| Error::Config("request has no correlation id".to_string()))?;
        let key = uid_key(uid);

        // Register before writing so the response cannot beat the waiter.
        let rx = self.pending.register(key.clone()).await;

        if let Err(e) = self.write(text.as_bytes()).await {
            self.pending.abandon(&key).await;
            return Err(e);
        }
        tracing::debug!(id = %key, method = %request.method, "request sent");

        let outcome = match self.timeout {
            Some(budget) => match tokio::time::timeout(budget, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.abandon(&key).await;
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        let response = outcome.map_err(|_| Error::ConnectionClosed)??;
        Ok(Some(response))
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(bytes)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        writer.flush().await.map_err(|e| Error::Io(e.to_string()))
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Drain queued inbound notifications, oldest first
    pub async fn take_notifications(&self) -> Vec<RequestMessage> {
        std::mem::take(&mut *self.notifications.lock().await)
    }

    /// Release the connection.
    ///
    /// Idempotent. Pending waiters are failed with a connection-closed
    /// error rather than left to time out.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }

        if let Some(task) = self.reader.lock().await.take() {
            task.abort();
        }
        self.pending.fail_all(Error::ConnectionClosed).await;

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        tracing::info!("stream connection closed");
    }
}
