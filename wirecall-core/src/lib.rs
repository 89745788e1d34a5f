//! Core JSON-RPC envelope types and stream framing for wirecall
//!
//! This crate provides the foundational pieces for a JSON-RPC client:
//!
//! - **Messages**: Request and response envelopes with 1.0/1.1/2.0 version
//!   negotiation
//! - **Framing**: [`MessageBuffer`], which splits an arbitrary byte stream
//!   into complete JSON object texts regardless of chunk boundaries
//! - **Error handling**: The error taxonomy shared by every wirecall crate
//!
//! # Overview
//!
//! The crate is transport-agnostic: it knows how to turn method calls into
//! wire text and wire text back into structured replies, but nothing about
//! how bytes travel. The `wirecall-client` crate layers one-shot and
//! persistent transports on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use wirecall_core::{Params, RequestMessage, Version};
//! use serde_json::json;
//!
//! let mut request = RequestMessage::with_uid("Player.Open", json!(1), Version::V2_0).unwrap();
//! request.insert_param("item", json!({"movieid": 3})).unwrap();
//!
//! let text = request.marshal().unwrap();
//! let decoded = RequestMessage::unmarshal(&text).unwrap();
//! assert_eq!(decoded.method, "Player.Open");
//! ```

pub mod buffer;
pub mod error;
pub mod message;

// Re-export the most commonly used types for convenience
pub use buffer::MessageBuffer;
pub use error::{Error, Result, RpcError};
pub use message::{Params, RequestMessage, ResponseMessage, Version};
