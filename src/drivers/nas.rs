//! NAS storage driver.
//!
//! Serves network-attached filesystem inventories from the `nas/` subtree of
//! the server data root.  Recognizes the same attachment bits as the block
//! driver; NAS volumes are additionally addressed by a network name, which
//! is synthesized from the service and volume name when the backing record
//! does not carry one.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ServerConfig;
use crate::driver::StorageDriver;
use crate::drivers::inventory::InventoryStore;
use crate::error::StorError;
use crate::types::{Handle, ServiceVolumeMap, VolumesRequest};

/// Driver for network-attached filesystem backends.
pub struct NasDriver {
    store: InventoryStore,
    sessions: AtomicU64,
}

impl NasDriver {
    pub const NAME: &'static str = "nas";

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
impl StorageDriver for NasDriver {
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
            .query(req, |service, volume| {
                if volume.volume_type.is_empty() {
                    volume.volume_type = Self::NAME.to_owned();
                }
                if volume.network_name.is_empty() {
                    volume.network_name = format!("{service}:/export/{}", volume.name);
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::inventory::tests::{volume, write_volume};

    #[tokio::test]
    async fn synthesizes_network_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = ServerConfig {
            data_root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let driver = NasDriver::new(&config).expect("driver");

        let root = tmp.path().join("nas");
        write_volume(&root, "filers", &volume("vol-1", "home", 10));
        let mut named = volume("vol-2", "scratch", 20);
        named.network_name = "nfs01:/vol/scratch".to_owned();
        write_volume(&root, "filers", &named);

        let map = driver
            .list_volumes(&VolumesRequest::default())
            .await
            .expect("list");
        let volumes = map.get("filers").expect("filers");
        assert_eq!(
            volumes.get("vol-1").expect("vol-1").network_name,
            "filers:/export/home"
        );
        // an explicit network name is kept as-is
        assert_eq!(
            volumes.get("vol-2").expect("vol-2").network_name,
            "nfs01:/vol/scratch"
        );
        assert_eq!(volumes.get("vol-1").expect("vol-1").volume_type, "nas");
    }
}
