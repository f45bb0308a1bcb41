//! QUIC transport for storage messages.
//!
//! This module provides [`StorClient`](client::StorClient) and
//! [`StorServer`](server::StorServer), which exchange
//! [`StorMessage`](crate::message::StorMessage) values over QUIC
//! bi-directional streams using `quinn`.  Each stream carries one
//! JSON-serialized request and one response.

pub mod client;
pub mod server;

/// Upper bound on a single serialized message.
pub(crate) const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
