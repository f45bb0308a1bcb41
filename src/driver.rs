//! Storage driver trait.
//!
//! A driver implements the query surface for one storage type (block, NAS,
//! object).  The server binds exactly one driver at startup, selected by
//! name through [`registry`](crate::registry), and treats it as an
//! interchangeable plugin for the lifetime of the process.

use async_trait::async_trait;

use crate::error::StorError;
use crate::types::{Handle, ServiceVolumeMap, VolumesRequest};

/// Pluggable storage backend behind the volumes query surface.
///
/// Implementations must protect any cached state against concurrent access:
/// the server dispatches sessions concurrently and only serializes
/// operations issued on the same handle.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Registry name of this driver.
    fn name(&self) -> &'static str;

    /// Notify the driver that a session was established.
    async fn open_session(&self, handle: Handle) -> Result<(), StorError>;

    /// Notify the driver that a session was released.
    ///
    /// Called exactly once per session, either for an explicit close or when
    /// the server force-closes outstanding sessions during shutdown.
    async fn close_session(&self, handle: Handle) -> Result<(), StorError>;

    /// List volumes grouped by owning service.
    async fn list_volumes(&self, req: &VolumesRequest) -> Result<ServiceVolumeMap, StorError>;
}
