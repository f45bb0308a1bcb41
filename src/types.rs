//! Core storage types: instances, volumes, attachments, and the maps that
//! group volumes by owning service.
//!
//! These types form the data model shared by the driver trait, the transport
//! layer, and the client API.  They are all [`Serialize`]/[`Deserialize`] so
//! they can be transmitted over QUIC as JSON.  Every value is a snapshot of
//! inventory at query time; nothing here is mutated after construction.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Session handles
// ---------------------------------------------------------------------------

/// Opaque session identifier issued by the server and owned by the client.
///
/// The low 32 bits address a slot in the server's session arena; the high 32
/// bits carry the slot generation, so a handle whose session was closed is
/// rejected even after the slot has been reused.  Clients must treat the
/// value as opaque.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(index))
    }

    pub(crate) fn index(self) -> u32 {
        self.0 as u32
    }

    pub(crate) fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The raw 64-bit handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Attachment capability mask
// ---------------------------------------------------------------------------

/// Capability bitmask controlling how much attachment detail a volumes query
/// returns and which volumes are included.
///
/// Drivers define which bits they recognize; unrecognized bits are ignored
/// rather than rejected.  The zero mask means "all volumes, no attachment
/// detail".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentFlags(pub u16);

impl AttachmentFlags {
    /// All volumes, attachments omitted from the result.
    pub const NONE: Self = Self(0);
    /// Attachment information was requested.
    pub const REQUESTED: Self = Self(1);
    /// Restrict attachments to those of the calling instance.
    pub const MINE: Self = Self(2);
    /// Include device name and mount point data.
    pub const DEVICES: Self = Self(4);
    /// Include volumes that are attached.
    pub const ATTACHED: Self = Self(8);
    /// Include volumes that are not attached.
    pub const UNATTACHED: Self = Self(16);

    /// `true` when every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` for the zero mask.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn mine(self) -> bool {
        self.contains(Self::MINE)
    }

    pub fn devices(self) -> bool {
        self.contains(Self::DEVICES)
    }

    pub fn attached(self) -> bool {
        self.contains(Self::ATTACHED)
    }

    pub fn unattached(self) -> bool {
        self.contains(Self::UNATTACHED)
    }
}

impl std::ops::BitOr for AttachmentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for AttachmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07b}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// Identifies the calling host to the storage platform.
///
/// Immutable once constructed.  `metadata` is opaque JSON text that the
/// server and drivers forward without interpreting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceId {
    /// Platform-assigned identifier.
    pub id: String,
    /// Opaque JSON-encoded metadata.
    #[serde(default)]
    pub metadata: String,
}

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: String::new(),
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Describes the client instance to the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    /// Identity of this instance.
    pub instance_id: InstanceId,
    /// Human-readable instance name.
    #[serde(default)]
    pub name: String,
    /// Name of the platform provider hosting the instance.
    #[serde(default)]
    pub provider_name: String,
    /// Region the instance runs in.
    #[serde(default)]
    pub region: String,
}

// ---------------------------------------------------------------------------
// Volumes and attachments
// ---------------------------------------------------------------------------

/// One mount/attach relation between a volume and an instance.
///
/// `instance_id` is a back-reference only: many attachments may name the same
/// instance without implying shared state, and the attachment never outlives
/// the volume that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeAttachment {
    /// Id of the volume this attachment belongs to.
    pub volume_id: String,
    /// Instance the volume is attached to.
    pub instance_id: InstanceId,
    /// Local device name, e.g. `/dev/xvdb`.
    #[serde(default)]
    pub device_name: String,
    /// Path the device is mounted at, if mounted.
    #[serde(default)]
    pub mount_point: String,
    /// Attachment status as reported by the backing platform.
    #[serde(default)]
    pub status: String,
}

/// Full metadata for one volume.
///
/// A volume owns its attachment sequence exclusively; attachment order is
/// preserved as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    /// Unique volume identifier.
    pub id: String,
    /// Human-readable volume name.
    #[serde(default)]
    pub name: String,
    /// Provisioned IOPS, `0` when the backend does not report them.
    #[serde(default)]
    pub iops: i64,
    /// Capacity in bytes.
    #[serde(default)]
    pub size: i64,
    /// Volume status as reported by the backing platform.
    #[serde(default)]
    pub status: String,
    /// Backend-specific volume type.
    #[serde(default)]
    pub volume_type: String,
    /// Availability zone the volume lives in.
    #[serde(default)]
    pub availability_zone: String,
    /// Network address for network-attached backends, empty otherwise.
    #[serde(default)]
    pub network_name: String,
    /// Attachments of this volume, in platform order.
    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,
}

// ---------------------------------------------------------------------------
// Volume maps
// ---------------------------------------------------------------------------

/// Volumes keyed by id, stored as two parallel sequences.
///
/// Index `i` of the id sequence corresponds to index `i` of the volume
/// sequence.  The fields are private so the equal-length and unique-id
/// invariants hold by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeMap {
    volume_ids: Vec<String>,
    volumes: Vec<Volume>,
}

impl VolumeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a volume keyed by its id.
    ///
    /// Returns `false` and leaves the map unchanged when the id is already
    /// present.
    pub fn insert(&mut self, volume: Volume) -> bool {
        if self.volume_ids.iter().any(|id| *id == volume.id) {
            return false;
        }
        self.volume_ids.push(volume.id.clone());
        self.volumes.push(volume);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Volume> {
        self.volume_ids
            .iter()
            .position(|v| v == id)
            .map(|i| &self.volumes[i])
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn volume_ids(&self) -> &[String] {
        &self.volume_ids
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Iterate `(id, volume)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Volume)> {
        self.volume_ids
            .iter()
            .map(String::as_str)
            .zip(self.volumes.iter())
    }
}

/// Volume maps keyed by owning service, stored as two parallel sequences.
///
/// Same invariants as [`VolumeMap`]: equal length, no duplicate service
/// names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceVolumeMap {
    service_names: Vec<String>,
    volumes: Vec<VolumeMap>,
}

impl ServiceVolumeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a volume map keyed by service name.
    ///
    /// Returns `false` and leaves the map unchanged when the service is
    /// already present.
    pub fn insert(&mut self, service: impl Into<String>, volumes: VolumeMap) -> bool {
        let service = service.into();
        if self.service_names.iter().any(|name| *name == service) {
            return false;
        }
        self.service_names.push(service);
        self.volumes.push(volumes);
        true
    }

    pub fn get(&self, service: &str) -> Option<&VolumeMap> {
        self.service_names
            .iter()
            .position(|name| name == service)
            .map(|i| &self.volumes[i])
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn service_names(&self) -> &[String] {
        &self.service_names
    }

    pub fn volumes(&self) -> &[VolumeMap] {
        &self.volumes
    }

    /// Iterate `(service, volume map)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VolumeMap)> {
        self.service_names
            .iter()
            .map(String::as_str)
            .zip(self.volumes.iter())
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Server-side parameters of one volumes query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumesRequest {
    /// Restrict the result to a single service; `None` means all services.
    #[serde(default)]
    pub service: Option<String>,
    /// Attachment capability mask.
    #[serde(default)]
    pub attachments: AttachmentFlags,
    /// Identity of the calling instance, used when the mask restricts
    /// attachments to the caller's own.
    #[serde(default)]
    pub instance_id: Option<InstanceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(volume_id: &str, instance: &str) -> VolumeAttachment {
        VolumeAttachment {
            volume_id: volume_id.to_owned(),
            instance_id: InstanceId::new(instance),
            device_name: format!("/dev/xvd{instance}"),
            mount_point: format!("/mnt/{instance}"),
            status: "attached".to_owned(),
        }
    }

    #[test]
    fn handle_packs_index_and_generation() {
        let handle = Handle::new(7, 3);
        assert_eq!(handle.index(), 7);
        assert_eq!(handle.generation(), 3);
        assert_eq!(Handle::from(handle.raw()), handle);
    }

    #[test]
    fn handle_display() {
        let handle = Handle::new(1, 1);
        assert_eq!(handle.to_string(), "0x0000000100000001");
    }

    #[test]
    fn flags_contains_and_or() {
        let flags = AttachmentFlags::REQUESTED | AttachmentFlags::MINE;
        assert!(flags.contains(AttachmentFlags::MINE));
        assert!(flags.mine());
        assert!(!flags.devices());
        assert!(AttachmentFlags::NONE.is_none());
        // bits beyond the known set are carried but meaningless
        let unknown = AttachmentFlags(0x4000) | AttachmentFlags::ATTACHED;
        assert!(unknown.attached());
    }

    #[test]
    fn volume_serde_roundtrip_preserves_attachment_order() {
        let vol = Volume {
            id: "vol-1".to_owned(),
            name: "data".to_owned(),
            size: 1024 * 1024,
            attachments: vec![
                attachment("vol-1", "i-a"),
                attachment("vol-1", "i-b"),
                attachment("vol-1", "i-c"),
            ],
            ..Default::default()
        };
        let json = serde_json::to_string(&vol).expect("serialize");
        let de: Volume = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de, vol);
        assert_eq!(de.attachments.len(), 3);
        assert_eq!(de.attachments[1].instance_id.id, "i-b");
    }

    #[test]
    fn volume_map_parallel_invariant() {
        let mut map = VolumeMap::new();
        assert!(map.insert(Volume {
            id: "vol-1".to_owned(),
            ..Default::default()
        }));
        assert!(map.insert(Volume {
            id: "vol-2".to_owned(),
            ..Default::default()
        }));
        // duplicate ids are rejected
        assert!(!map.insert(Volume {
            id: "vol-1".to_owned(),
            ..Default::default()
        }));
        assert_eq!(map.volume_ids().len(), map.volumes().len());
        assert_eq!(map.len(), 2);
        assert!(map.get("vol-2").is_some());
        assert!(map.get("vol-3").is_none());
    }

    #[test]
    fn service_map_parallel_invariant() {
        let mut map = ServiceVolumeMap::new();
        assert!(map.insert("svcA", VolumeMap::new()));
        assert!(map.insert("svcB", VolumeMap::new()));
        assert!(!map.insert("svcA", VolumeMap::new()));
        assert_eq!(map.service_names().len(), map.volumes().len());
        assert_eq!(map.service_names(), ["svcA", "svcB"]);
        assert!(map.get("svcB").is_some());
    }

    #[test]
    fn iter_pairs_ids_with_volumes() {
        let mut map = VolumeMap::new();
        map.insert(Volume {
            id: "vol-1".to_owned(),
            name: "one".to_owned(),
            ..Default::default()
        });
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "vol-1");
        assert_eq!(pairs[0].1.name, "one");
    }
}
