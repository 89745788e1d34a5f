//! Client configuration and call dispatch
//!
//! [`RpcClient`] is the entry point: configure it through [`ClientBuilder`],
//! then issue calls with [`RpcClient::call`] or through namespace handles.
//! The transport mode is fixed per client:
//!
//! - [`TransportMode::OneShot`] sends each request as one POST through the
//!   injected [`HttpTransport`] and reads the reply body as the response
//! - [`TransportMode::Persistent`] lazily establishes a single stream
//!   connection on first use and multiplexes all calls over it
//!
//! The client is cheap to clone; clones share the connection, the memoized
//! namespace handles, and the notification queue.

use crate::namespace::Namespace;
use crate::protocol::{ConnectionState, StreamProtocol};
use crate::transport::{BasicAuth, HttpRequest, HttpTransport, StreamConnector, TcpConnector};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use wirecall_core::{Error, Params, RequestMessage, ResponseMessage, Result, Version};

/// How a client moves requests to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// One POST per request through the injected HTTP collaborator
    OneShot,
    /// One long-lived stream connection shared by all requests
    Persistent,
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "one-shot" | "oneshot" => Ok(Self::OneShot),
            "tcp" | "persistent" => Ok(Self::Persistent),
            other => Err(Error::Config(format!("unknown transport mode: {other}"))),
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot => write!(f, "one-shot"),
            Self::Persistent => write!(f, "persistent"),
        }
    }
}

/// Builder for [`RpcClient`]
///
/// ```rust
/// use wirecall_client::{ClientBuilder, TransportMode};
///
/// let client = ClientBuilder::new("localhost")
///     .port(9090)
///     .persistent()
///     .build()
///     .unwrap();
/// assert_eq!(client.mode(), TransportMode::Persistent);
/// ```
pub struct ClientBuilder {
    host: String,
    port: u16,
    path: String,
    version: Version,
    timeout: Option<Duration>,
    mode: TransportMode,
    auth: Option<BasicAuth>,
    http: Option<Arc<dyn HttpTransport>>,
    connector: Arc<dyn StreamConnector>,
}

impl ClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 8080,
            path: "/jsonrpc".to_string(),
            version: Version::default(),
            timeout: None,
            mode: TransportMode::OneShot,
            auth: None,
            http: None,
            connector: Arc::new(TcpConnector),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// URL path for one-shot mode (default `/jsonrpc`)
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Protocol version stamped on every outbound request (default 2.0)
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Wait budget for connection attempts and response waits.
    ///
    /// Unset means waits are unbounded.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for [`TransportMode::OneShot`]
    pub fn one_shot(self) -> Self {
        self.mode(TransportMode::OneShot)
    }

    /// Shorthand for [`TransportMode::Persistent`]
    pub fn persistent(self) -> Self {
        self.mode(TransportMode::Persistent)
    }

    /// Basic-auth credentials forwarded to the HTTP collaborator
    pub fn auth(mut self, auth: BasicAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// HTTP collaborator for one-shot mode; required in that mode
    pub fn http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(transport);
        self
    }

    /// Connector for persistent mode (default plain TCP)
    pub fn connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn build(self) -> Result<RpcClient> {
        if self.host.is_empty() {
            return Err(Error::Config("no host provided".to_string()));
        }
        if self.mode == TransportMode::OneShot && self.http.is_none() {
            return Err(Error::Config(
                "one-shot mode requires an HTTP transport".to_string(),
            ));
        }

        Ok(RpcClient {
            inner: Arc::new(ClientInner {
                host: self.host,
                port: self.port,
                path: self.path,
                version: self.version,
                timeout: self.timeout,
                mode: self.mode,
                auth: self.auth,
                http: self.http,
                connector: self.connector,
                stream: OnceCell::new(),
                namespaces: Mutex::new(HashMap::new()),
            }),
        })
    }
}

pub(crate) struct ClientInner {
    host: String,
    port: u16,
    path: String,
    version: Version,
    timeout: Option<Duration>,
    mode: TransportMode,
    auth: Option<BasicAuth>,
    http: Option<Arc<dyn HttpTransport>>,
    connector: Arc<dyn StreamConnector>,
    /// Lazily-established persistent connection; set at most once
    stream: OnceCell<Arc<StreamProtocol>>,
    namespaces: Mutex<HashMap<String, Arc<Namespace>>>,
}

/// JSON-RPC client over a one-shot or persistent transport
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

/// Weak handle held by namespace and method handles, so memo caches never
/// keep a dropped client alive
#[derive(Clone)]
pub(crate) struct WeakClient(Weak<ClientInner>);

impl WeakClient {
    pub(crate) fn upgrade(&self) -> Result<RpcClient> {
        self.0
            .upgrade()
            .map(|inner| RpcClient { inner })
            .ok_or(Error::ConnectionClosed)
    }
}

impl RpcClient {
    /// Start building a client for `host`
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(host)
    }

    /// The transport mode this client was built with
    pub fn mode(&self) -> TransportMode {
        self.inner.mode
    }

    /// The protocol version stamped on outbound requests
    pub fn version(&self) -> Version {
        self.inner.version
    }

    /// Call `method` and return its result value.
    ///
    /// A peer-reported call failure surfaces as [`Error::Rpc`]. `Ok(None)`
    /// means the exchange completed without a usable result: a non-success
    /// HTTP status in one-shot mode, or a response carrying no result.
    pub async fn call(&self, method: &str, params: Option<Params>) -> Result<Option<Value>> {
        let mut request = RequestMessage::new(method, self.inner.version);
        if let Some(params) = params {
            request.set_params(params);
        }
        let response = self.request(&request).await?;
        Ok(response.and_then(|r| r.result))
    }

    /// Send `method` as a notification: no id, no reply expected
    pub async fn notify(&self, method: &str, params: Option<Params>) -> Result<()> {
        let mut request = RequestMessage::notification(method, self.inner.version);
        if let Some(params) = params {
            request.set_params(params);
        }
        self.request(&request).await?;
        Ok(())
    }

    /// Dispatch an already-built request over this client's transport
    pub async fn request(&self, request: &RequestMessage) -> Result<Option<ResponseMessage>> {
        match self.inner.mode {
            TransportMode::OneShot => self.request_one_shot(request).await,
            TransportMode::Persistent => self.stream().await?.send(request).await,
        }
    }

    async fn request_one_shot(&self, request: &RequestMessage) -> Result<Option<ResponseMessage>> {
        let http = self
            .inner
            .http
            .as_ref()
            .ok_or_else(|| Error::Config("no HTTP transport configured".to_string()))?;

        let body = request.marshal()?;
        let url = format!(
            "http://{}:{}{}",
            self.inner.host, self.inner.port, self.inner.path
        );
        tracing::debug!(%url, method = %request.method, "posting request");

        let reply = http
            .post(HttpRequest {
                url,
                body: body.into_bytes(),
                content_type: "application/json".to_string(),
                auth: self.inner.auth.clone(),
                timeout: self.inner.timeout,
            })
            .await?;

        if request.notification {
            return Ok(None);
        }
        if !reply.is_success() {
            tracing::warn!(status = reply.status, "request rejected by peer");
            return Ok(None);
        }

        let text = String::from_utf8(reply.body)
            .map_err(|e| Error::Message(format!("reply body is not UTF-8: {e}")))?;
        Ok(Some(ResponseMessage::unmarshal(&text)?))
    }

    /// The persistent connection, established on first use.
    ///
    /// Concurrent first calls share a single connection attempt.
    async fn stream(&self) -> Result<&Arc<StreamProtocol>> {
        self.inner
            .stream
            .get_or_try_init(|| {
                StreamProtocol::connect(
                    self.inner.connector.as_ref(),
                    &self.inner.host,
                    self.inner.port,
                    self.inner.timeout,
                )
            })
            .await
    }

    /// Handle for the method group `name`, memoized per client
    pub async fn namespace(&self, name: &str) -> Arc<Namespace> {
        let mut namespaces = self.inner.namespaces.lock().await;
        if let Some(namespace) = namespaces.get(name) {
            return Arc::clone(namespace);
        }

        let namespace = Namespace::new(name, WeakClient(Arc::downgrade(&self.inner)));
        namespaces.insert(name.to_string(), Arc::clone(&namespace));
        namespace
    }

    /// Drain inbound notifications received on the persistent connection
    pub async fn take_notifications(&self) -> Vec<RequestMessage> {
        match self.inner.stream.get() {
            Some(stream) => stream.take_notifications().await,
            None => Vec::new(),
        }
    }

    /// State of the persistent connection, if one has been established
    pub async fn connection_state(&self) -> Option<ConnectionState> {
        match self.inner.stream.get() {
            Some(stream) => Some(stream.state().await),
            None => None,
        }
    }

    /// Close the persistent connection, if one was established.
    ///
    /// Idempotent; a no-op for one-shot clients.
    pub async fn close(&self) {
        if let Some(stream) = self.inner.stream.get() {
            stream.close().await;
        }
    }
}
