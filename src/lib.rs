//! wirecall - JSON-RPC 1.0/1.1/2.0 client core
//!
//! This is the main convenience crate that re-exports the wirecall sub-crates.
//! Use this crate if you want a single dependency that provides the full
//! client stack.
//!
//! # Architecture
//!
//! wirecall is organized into modular crates:
//!
//! - **wirecall-core**: Envelope types, marshal/unmarshal, stream framing,
//!   error handling
//! - **wirecall-client**: One-shot and persistent transports, request
//!   correlation, the namespace/method call surface
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wirecall::{ClientBuilder, Params};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("localhost")
//!         .port(9090)
//!         .persistent()
//!         .build()?;
//!
//!     let result = client
//!         .call("VideoLibrary.GetMovies", Some(Params::positional(vec![json!("genre")])))
//!         .await?;
//!     println!("Result: {:?}", result);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through the `wirecall::` prefix
pub use wirecall_client as client;
pub use wirecall_core as core;

// Convenience re-exports of the most commonly used types
pub use wirecall_client::{ClientBuilder, RpcClient, TransportMode};
pub use wirecall_core::{
    Error, MessageBuffer, Params, RequestMessage, ResponseMessage, Result, RpcError, Version,
};
