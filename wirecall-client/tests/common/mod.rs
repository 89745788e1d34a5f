//! Common test utilities for wirecall-client integration tests
//!
//! Provides a mock TCP peer, a scripted HTTP collaborator, and envelope
//! helpers so client behavior can be tested without a real server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use wirecall_client::{
    HttpReply, HttpRequest, HttpTransport, StreamConnector, StreamPair, TcpConnector,
};
use wirecall_core::{Error, MessageBuffer, Result};

/// Install a subscriber so failing tests show routing decisions.
///
/// Safe to call from every test; only the first call wins.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock TCP peer speaking framed JSON messages
///
/// Accepts connections, frames inbound bytes into complete messages, and
/// answers each through the handler closure. Every received message is also
/// forwarded to a channel for test-side verification.
pub struct MockTcpServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
}

impl MockTcpServer {
    /// Start a peer that echoes nothing back
    #[allow(dead_code)]
    pub async fn silent() -> Self {
        Self::with_handler(|_| async move { None }).await
    }

    /// Start a peer answering each framed message through `handler`
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<String>> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::channel::<String>(100);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((mut stream, _)) = accepted else { break };
                        let handler = Arc::clone(&handler);
                        let msg_tx = msg_tx.clone();

                        tokio::spawn(async move {
                            let mut buffer = MessageBuffer::new();
                            let mut chunk = [0u8; 1024];
                            loop {
                                match stream.read(&mut chunk).await {
                                    Ok(0) | Err(_) => break,
                                    Ok(n) => {
                                        let text = String::from_utf8_lossy(&chunk[..n]);
                                        buffer.append(&text);
                                        for message in buffer.drain_messages() {
                                            let _ = msg_tx.send(message.clone()).await;
                                            if let Some(reply) = handler(message).await {
                                                if stream.write_all(reply.as_bytes()).await.is_err() {
                                                    return;
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the next message the peer received, bounded at five seconds
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Scripted HTTP collaborator: replays queued replies and records every
/// request it was handed
pub struct MockHttpTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    pub fn replying(replies: impl IntoIterator<Item = HttpReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests the client has posted so far, in order
    pub async fn recorded(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpReply> {
        self.requests.lock().await.push(request);
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| Error::Http("no scripted reply".to_string()))
    }
}

/// TCP connector that counts connection attempts
pub struct CountingConnector {
    inner: TcpConnector,
    connects: AtomicUsize,
}

impl CountingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TcpConnector,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamConnector for CountingConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<StreamPair> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect(host, port).await
    }
}

/// Helper to build a success response text for the given id
pub fn mock_response(id: serde_json::Value, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

/// Helper to build an error response text for the given id
#[allow(dead_code)]
pub fn mock_error_response(id: serde_json::Value, code: i64, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message
        },
        "id": id
    })
    .to_string()
}

/// Helper to build a notification request text
#[allow(dead_code)]
pub fn mock_notification(method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
    .to_string()
}

/// Extract the id value from a marshaled request text
pub fn extract_id(request_text: &str) -> serde_json::Value {
    let parsed: serde_json::Value = serde_json::from_str(request_text).unwrap();
    parsed["id"].clone()
}
