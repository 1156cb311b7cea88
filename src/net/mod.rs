//! Networking: the transport contract consumed by the engine and the default
//! long-poll implementation.
//!
//! - `transport` - Request/status types and the `Transport` trait
//! - `http` - reqwest-backed long-poll transport

pub mod http;
pub mod transport;

pub use transport::{
    Transport, TransportOperation, TransportRequest, TransportStatus,
};
