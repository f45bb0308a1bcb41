//! # libstor — storage-abstraction client/server over QUIC
//!
//! `libstor` hosts pluggable storage drivers (block, NAS, object) behind a
//! uniform session protocol: clients open an opaque [`Handle`], query volume
//! inventories grouped by owning service, and release the handle, with every
//! cross-boundary outcome carried as a `Result`.  Transport is QUIC (via
//! [`quinn`]) with JSON payloads, following the project conventions (Tokio
//! async runtime, `tracing` for observability, `thiserror` for structured
//! errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: volumes, attachments, instances, maps, `Handle`. |
//! | [`error`] | [`StorError`] enum covering all failure modes. |
//! | [`message`] | [`StorMessage`] protocol envelope for the transport. |
//! | [`session`] | Server-side session arena with generation-checked handles. |
//! | [`driver`] | [`StorageDriver`] trait — the pluggable query surface. |
//! | [`registry`] | Driver selection by name at server startup. |
//! | [`drivers`] | Concrete block / NAS / object drivers. |
//! | [`config`] | Client and server configuration files. |
//! | [`tls`] | Self-signed certificate generation and rustls configs. |
//! | [`transport`] | QUIC client/server built on `quinn`. |
//! | [`client`] | [`Client`] — high-level open / volumes / close session. |
//! | [`sem`] | Named POSIX semaphores for external orchestration tooling. |

pub mod client;
pub mod config;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod message;
pub mod registry;
pub mod sem;
pub mod session;
pub mod tls;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use client::Client;
pub use driver::StorageDriver;
pub use error::StorError;
pub use message::StorMessage;
pub use types::*;
