//! Wire protocol between the session and the assistant endpoint
//!
//! The response is a stream of JSON frames, one per line, either bare
//! (NDJSON) or wrapped in SSE `data:` fields. [`Decoder`] turns raw transport
//! chunks into typed [`ProtocolEvent`]s.

mod decoder;
mod error;
mod frame;
pub mod partial_json;
mod request;


pub use decoder::{DecodeBatch, Decoder};
pub use error::ProtocolError;
pub use frame::ProtocolEvent;
pub use request::{ChatRequest, WireAttachment};
