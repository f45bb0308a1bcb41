//! Block storage driver.
//!
//! Serves block-device volume inventories from the `block/` subtree of the
//! server data root.  Recognizes the REQUESTED, MINE, DEVICES, ATTACHED and
//! UNATTACHED attachment bits.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ServerConfig;
use crate::driver::StorageDriver;
use crate::drivers::inventory::InventoryStore;
use crate::error::StorError;
use crate::types::{Handle, ServiceVolumeMap, VolumesRequest};

/// Driver for block-device backends.
pub struct BlockDriver {
    store: InventoryStore,
    sessions: AtomicU64,
}

impl BlockDriver {
    pub const NAME: &'static str = "block";

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
impl StorageDriver for BlockDriver {
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
        self.store
            .query(req, |_, volume| {
                if volume.volume_type.is_empty() {
                    volume.volume_type = Self::NAME.to_owned();
                }
                // block devices are not addressed by network name
                volume.network_name.clear();
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::inventory::tests::{attached_volume, volume, write_volume};
    use crate::types::AttachmentFlags;

    fn config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            data_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn lists_volumes_with_block_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let driver = BlockDriver::new(&config(tmp.path())).expect("driver");

        let mut vol = volume("vol-1", "data", 1_073_741_824);
        vol.network_name = "should-be-cleared".to_owned();
        write_volume(&tmp.path().join("block"), "svcA", &vol);

        let map = driver
            .list_volumes(&VolumesRequest::default())
            .await
            .expect("list");
        assert_eq!(map.service_names(), ["svcA"]);
        let got = map.get("svcA").expect("svcA").get("vol-1").expect("vol-1");
        assert_eq!(got.size, 1_073_741_824);
        assert_eq!(got.volume_type, "block");
        assert!(got.network_name.is_empty());
    }

    #[tokio::test]
    async fn attachment_mask_is_honored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let driver = BlockDriver::new(&config(tmp.path())).expect("driver");
        let root = tmp.path().join("block");
        write_volume(&root, "svcA", &attached_volume("vol-1", "one", 1, "i-1"));
        write_volume(&root, "svcA", &volume("vol-2", "two", 2));

        let req = VolumesRequest {
            attachments: AttachmentFlags::REQUESTED | AttachmentFlags::ATTACHED,
            ..Default::default()
        };
        let map = driver.list_volumes(&req).await.expect("list");
        assert_eq!(map.get("svcA").expect("svcA").volume_ids(), ["vol-1"]);
    }

    #[tokio::test]
    async fn session_counting() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let driver = BlockDriver::new(&config(tmp.path())).expect("driver");
        let handle = Handle::from(0x100000000);

        driver.open_session(handle).await.expect("open");
        assert_eq!(driver.open_sessions(), 1);
        driver.close_session(handle).await.expect("close");
        assert_eq!(driver.open_sessions(), 0);
    }
}
