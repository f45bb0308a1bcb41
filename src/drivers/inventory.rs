//! On-disk volume inventory shared by the concrete drivers.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   <service>/               one directory per service
//!     <volume-id>.json       one JSON-encoded Volume per file
//! ```
//!
//! Service directories are the service names reported to clients.  Listings
//! are deterministic: services sort lexicographically, volumes sort by id.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::StorError;
use crate::types::{
    AttachmentFlags, InstanceId, ServiceVolumeMap, Volume, VolumeMap, VolumesRequest,
};

/// Reads volume inventories from a directory tree.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    root: PathBuf,
}

impl InventoryStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorError::Driver(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Service names, sorted, one per subdirectory of the root.
    pub async fn services(&self) -> Result<Vec<String>, StorError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorError::Driver(format!("read {}: {e}", self.root.display())))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(StorError::driver)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            names.push(name.to_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Volumes of one service, sorted by id.
    ///
    /// Malformed files are skipped with a warning so one bad entry cannot
    /// take down the whole listing.
    pub async fn volumes(&self, service: &str) -> Result<Vec<Volume>, StorError> {
        let dir_path = self.root.join(service);
        let mut dir = match tokio::fs::read_dir(&dir_path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorError::UnknownService(service.to_owned()));
            }
            Err(e) => {
                return Err(StorError::Driver(format!(
                    "read {}: {e}",
                    dir_path.display()
                )));
            }
        };

        let mut volumes = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(StorError::driver)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = match tokio::fs::read_to_string(&path).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read volume file, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<Volume>(&json) {
                Ok(v) => volumes.push(v),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse volume file, skipping");
                }
            }
        }
        volumes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(volumes)
    }

    /// Run a volumes query against the whole store.
    ///
    /// Applies the optional service scope and the attachment mask, after
    /// letting `normalize` patch up each raw volume with driver-specific
    /// defaults.
    pub async fn query<F>(
        &self,
        req: &VolumesRequest,
        mut normalize: F,
    ) -> Result<ServiceVolumeMap, StorError>
    where
        F: FnMut(&str, &mut Volume),
    {
        let services = match &req.service {
            Some(name) => {
                if !self.root.join(name).is_dir() {
                    return Err(StorError::UnknownService(name.clone()));
                }
                vec![name.clone()]
            }
            None => self.services().await?,
        };

        let mut map = ServiceVolumeMap::new();
        for service in services {
            let mut volumes = VolumeMap::new();
            for mut volume in self.volumes(&service).await? {
                normalize(&service, &mut volume);
                if !apply_attachment_filter(&mut volume, req.instance_id.as_ref(), req.attachments)?
                {
                    continue;
                }
                volumes.insert(volume);
            }
            map.insert(service, volumes);
        }
        Ok(map)
    }
}

/// Apply the attachment capability mask to one volume.
///
/// Returns `false` when the mask excludes the volume entirely.  Bits beyond
/// the known set are ignored.
pub fn apply_attachment_filter(
    volume: &mut Volume,
    instance_id: Option<&InstanceId>,
    flags: AttachmentFlags,
) -> Result<bool, StorError> {
    if flags.is_none() {
        volume.attachments.clear();
        return Ok(true);
    }

    if flags.mine() {
        let Some(iid) = instance_id else {
            return Err(StorError::InvalidArgument("missing instance ID".to_owned()));
        };
        volume
            .attachments
            .retain(|a| a.instance_id.id.eq_ignore_ascii_case(&iid.id));
    }

    if flags.attached() && !flags.unattached() && volume.attachments.is_empty() {
        return Ok(false);
    }
    if flags.unattached() && !flags.attached() && !volume.attachments.is_empty() {
        return Ok(false);
    }

    if !flags.devices() {
        for a in &mut volume.attachments {
            a.device_name.clear();
            a.mount_point.clear();
        }
    }

    Ok(true)
}
