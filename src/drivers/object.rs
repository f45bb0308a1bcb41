//! Object storage driver.
//!
//! Serves bucket-style inventories from the `object/` subtree of the server
//! data root.  Object stores have no attach relation, so this driver reports
//! no attachments and recognizes none of the attachment bits; a non-zero
//! mask is accepted and ignored.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ServerConfig;
use crate::driver::StorageDriver;
use crate::drivers::inventory::InventoryStore;
use crate::error::StorError;
use crate::types::{AttachmentFlags, Handle, ServiceVolumeMap, VolumesRequest};

/// Driver for object-store backends.
pub struct ObjectDriver {
    store: InventoryStore,
    sessions: AtomicU64,
}

impl ObjectDriver {
    pub const NAME: &'static str = "object";

    pub fn new(config: &ServerConfig) -> Result<Self, StorError> {
        let store = InventoryStore::new(config.data_root.join(Self::NAME))?;
        Ok(Self {
            store,
            sessions: AtomicU64::new(0),
        })
    }

    /// Number of sessions currently open against this driver.
    pub fn open_sessions(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageDriver for ObjectDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn open_session(&self, handle: Handle) -> Result<(), StorError> {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        debug!(%handle, driver = Self::NAME, "session opened");
        Ok(())
    }

    async fn close_session(&self, handle: Handle) -> Result<(), StorError> {
        self.sessions.fetch_sub(1, Ordering::Relaxed);
        debug!(%handle, driver = Self::NAME, "session closed");
        Ok(())
    }

    #[instrument(skip(self, req), fields(service = req.service.as_deref()))]
    async fn list_volumes(&self, req: &VolumesRequest) -> Result<ServiceVolumeMap, StorError> {
        // Buckets never attach, so the attachment bits do not apply here.
        let req = VolumesRequest {
            attachments: AttachmentFlags::NONE,
            ..req.clone()
        };
        self.store
            .query(&req, |_, volume| {
                if volume.volume_type.is_empty() {
                    volume.volume_type = Self::NAME.to_owned();
                }
                volume.iops = 0;
                volume.attachments.clear();
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::inventory::tests::{attached_volume, write_volume};

    #[tokio::test]
    async fn buckets_have_no_attachments_or_iops() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = ServerConfig {
            data_root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let driver = ObjectDriver::new(&config).expect("driver");

        let mut bucket = attached_volume("bkt-1", "archive", 0, "i-1");
        bucket.iops = 500;
        write_volume(&tmp.path().join("object"), "buckets", &bucket);

        // the attachment bits are not recognized and must not exclude buckets
        let req = VolumesRequest {
            attachments: AttachmentFlags::REQUESTED | AttachmentFlags::ATTACHED,
            ..Default::default()
        };
        let map = driver.list_volumes(&req).await.expect("list");
        let got = map
            .get("buckets")
            .expect("buckets")
            .get("bkt-1")
            .expect("bkt-1");
        assert!(got.attachments.is_empty());
        assert_eq!(got.iops, 0);
        assert_eq!(got.volume_type, "object");
    }
}
