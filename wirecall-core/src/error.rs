//! Error types for wirecall
//!
//! Two layers of error live here:
//!
//! - **Error**: the application-level error enum used throughout the
//!   workspace (uses thiserror)
//! - **RpcError**: the wire-format error object a peer places in the `error`
//!   field of a response
//!
//! # Error Kinds
//!
//! - `Config` — invalid construction or mutation of a client or message
//! - `Message` — malformed or incomplete wire payloads
//! - `Rpc` — a syntactically valid response whose body *is* an error
//! - `Timeout` — the configured wait budget elapsed
//! - `ConnectionClosed` — the persistent connection is gone
//!
//! Errors are `Clone` so that a single failure (for example a closed
//! connection) can be delivered to every pending waiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for wirecall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for wirecall operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid construction or mutation: unsupported transport mode name,
    /// mixing positional and named params, explicit empty id.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete wire payload: empty input, missing required
    /// envelope fields, both or neither of result/error present.
    #[error("message error: {0}")]
    Message(String),

    /// The peer replied with an RPC-level error object.
    ///
    /// This is raised in place of returning a populated response: callers
    /// never see a response whose body is an error, they see this.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The configured wait budget elapsed before a correlated response
    /// arrived.
    #[error("request timed out")]
    Timeout,

    /// The persistent connection is no longer active.
    #[error("connection closed")]
    ConnectionClosed,

    /// HTTP collaborator failure below the JSON-RPC layer.
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// Low-level I/O failure on the stream transport.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON encode/decode failure outside envelope validation.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// JSON-RPC error object as it appears on the wire
///
/// Appears in the `error` field of a response. Per the specification the
/// object carries a numeric `code`, a human-readable `message`, and
/// optionally any structured `data` the server wants to attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code indicating the error type
    pub code: i64,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create a new RPC error with code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new RPC error with additional structured data
    pub fn with_data(code: i64, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl std::fmt::Display for RpcError {
    /// Formats as "[code] message" for easy readability in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
