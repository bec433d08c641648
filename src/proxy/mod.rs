//! Proxy Module
//!
//! Streaming request forwarding and the header hygiene it relies on.

mod forwarder;
pub mod headers;

pub use forwarder::{Forwarder, STREAM_BUFFER_SIZE};
pub use headers::HOP_BY_HOP_HEADERS;
