//! JSON-RPC client transports and request correlation
//!
//! This crate provides the transport half of wirecall: a client that can
//! speak JSON-RPC over either of two transport modes, selected per client:
//!
//! - **One-shot**: each call is a stateless request/reply exchange through
//!   an injected HTTP-style collaborator
//! - **Persistent**: one long-lived stream connection shared by many
//!   concurrently outstanding requests, with responses correlated back to
//!   their callers by id and unsolicited notifications queued for an
//!   external consumer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wirecall_client::ClientBuilder;
//! use wirecall_core::Params;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("localhost")
//!         .port(9090)
//!         .persistent()
//!         .build()?;
//!
//!     let movies = client
//!         .call(
//!             "VideoLibrary.GetMovies",
//!             Some(Params::named([("properties", json!(["genre", "file"]))])),
//!         )
//!         .await?;
//!     println!("{:?}", movies);
//!
//!     // Namespace handles give calls their `namespace.method` shape and
//!     // are memoized per client.
//!     let player = client.namespace("Player").await;
//!     let open = player.method("Open").await;
//!     open.call(Some(Params::positional(vec![json!({"movieid": 3})])))
//!         .await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod client;
mod namespace;
mod protocol;
mod transport;

pub use client::{ClientBuilder, RpcClient, TransportMode};
pub use namespace::{Method, Namespace};
pub use protocol::{ConnectionState, StreamProtocol};
pub use transport::{
    BasicAuth, BoxedReader, BoxedWriter, HttpReply, HttpRequest, HttpTransport, StreamConnector,
    StreamPair, TcpConnector,
};
