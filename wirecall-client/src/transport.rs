//! Transport collaborator boundaries
//!
//! The client core does not implement HTTP, and ships only a thin TCP
//! connector. Both transports are consumed through traits so the calling
//! application (or a test) injects the real thing:
//!
//! - [`HttpTransport`] performs one POST and hands back a status code plus
//!   the response body
//! - [`StreamConnector`] establishes a byte-oriented connection exposing
//!   read and write halves

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use wirecall_core::{Error, Result};

/// Boxed read half of a stream connection
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed write half of a stream connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The two halves of an established byte-oriented connection
pub struct StreamPair {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl StreamPair {
    /// Box up a reader/writer pair
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// HTTP basic-auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    /// `None` for username-only credentials
    pub password: Option<String>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }

    pub fn with_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }
}

/// One outbound POST, as handed to the HTTP collaborator
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub auth: Option<BasicAuth>,
    /// Wait budget for the exchange; `None` means unbounded
    pub timeout: Option<Duration>,
}

/// The collaborator's answer to a POST
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    /// True for 2xx status codes
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP-style request/reply collaborator for the one-shot transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one POST and return the status plus body
    async fn post(&self, request: HttpRequest) -> Result<HttpReply>;
}

/// Establishes the stream connection for the persistent transport
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<StreamPair>;
}

/// Plain TCP connector, the default for persistent mode
pub struct TcpConnector;

#[async_trait]
impl StreamConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<StreamPair> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        let (reader, writer) = stream.into_split();
        Ok(StreamPair::new(reader, writer))
    }
}
