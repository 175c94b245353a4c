// ── Client-side replica of daemon state ──
//
// `StateStore` owns every directory and device plus the connection-wide
// bits (own id, traffic, last file). It is mutated only by the engine
// task, so there is no interior locking; observers get `Arc` snapshots
// published through watch channels.

mod aggregate;
mod poll;
mod refresh;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use synctray_api::models::SystemConfig;

use crate::change::{ConnectionEvent, Outbox};
use crate::model::{Device, DeviceStatus, Directory, LastFile, Traffic};

pub use aggregate::StatusTracker;

/// In-memory collections of directories and devices.
#[derive(Debug, Default)]
pub struct StateStore {
    directories: IndexMap<String, Directory>,
    devices: IndexMap<String, Device>,
    own_id: String,
    config_dir: String,
    traffic: Traffic,
    last_connections_update: Option<DateTime<Utc>>,
    last_file: Option<LastFile>,
    last_error_time: Option<DateTime<Utc>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Config refresh ───────────────────────────────────────────────

    /// Replace both collections from a fetched config, recycling runtime
    /// fields of entities that keep their id.
    pub(crate) fn apply_config(&mut self, config: &SystemConfig, outbox: &mut Outbox) {
        self.directories = refresh::merge_directories(&mut self.directories, &config.folders);
        outbox.push(ConnectionEvent::NewDirectories);

        self.devices = refresh::merge_devices(&mut self.devices, &config.devices, &self.own_id);
        outbox.push(ConnectionEvent::NewDevices);
    }

    /// Record the daemon's own device id and mark the matching device.
    pub(crate) fn set_own_id(&mut self, own_id: &str, outbox: &mut Outbox) {
        if self.own_id == own_id {
            return;
        }
        self.own_id = own_id.to_owned();
        outbox.push(ConnectionEvent::OwnIdChanged(self.own_id.clone()));

        for (index, device) in self.devices.values_mut().enumerate() {
            if device.id == own_id {
                if device.status != DeviceStatus::OwnDevice {
                    device.status = DeviceStatus::OwnDevice;
                    outbox.device_changed(&device.id, index);
                }
            } else if device.status == DeviceStatus::OwnDevice {
                device.status = DeviceStatus::Unknown;
                outbox.device_changed(&device.id, index);
            }
        }
    }

    pub(crate) fn set_config_dir(&mut self, dir: &str, outbox: &mut Outbox) {
        if self.config_dir != dir {
            self.config_dir = dir.to_owned();
            outbox.push(ConnectionEvent::ConfigDirChanged(self.config_dir.clone()));
        }
    }

    /// Forget everything learned from the daemon. Used on reconnect.
    pub(crate) fn clear(&mut self, outbox: &mut Outbox) {
        *self = Self::default();
        outbox.push(ConnectionEvent::NewDirectories);
        outbox.push(ConnectionEvent::NewDevices);
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn directory(&self, id: &str) -> Option<&Directory> {
        self.directories.get(id)
    }

    pub(crate) fn directory_mut(&mut self, id: &str) -> Option<(usize, &mut Directory)> {
        self.directories
            .get_full_mut(id)
            .map(|(index, _, dir)| (index, dir))
    }

    /// Insert a placeholder for an id the config does not know yet.
    pub(crate) fn insert_placeholder(&mut self, id: &str, outbox: &mut Outbox) -> usize {
        let (index, _) = self
            .directories
            .insert_full(id.to_owned(), Directory::placeholder(id));
        outbox.push(ConnectionEvent::NewDirectories);
        index
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub(crate) fn device_mut(&mut self, id: &str) -> Option<(usize, &mut Device)> {
        self.devices
            .get_full_mut(id)
            .map(|(index, _, dev)| (index, dev))
    }

    pub fn directories(&self) -> impl Iterator<Item = &Directory> {
        self.directories.values()
    }

    pub(crate) fn directories_mut(&mut self) -> impl Iterator<Item = (usize, &mut Directory)> {
        self.directories.values_mut().enumerate()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn directory_ids(&self) -> Vec<String> {
        self.directories.keys().cloned().collect()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn own_id(&self) -> &str {
        &self.own_id
    }

    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    pub fn traffic(&self) -> Traffic {
        self.traffic
    }

    pub fn last_file(&self) -> Option<&LastFile> {
        self.last_file.as_ref()
    }

    pub fn last_connections_update(&self) -> Option<DateTime<Utc>> {
        self.last_connections_update
    }

    // ── Connection-wide last file ────────────────────────────────────

    /// Replace the connection-wide last file if `candidate` is newer.
    pub(crate) fn offer_last_file(&mut self, candidate: LastFile) -> bool {
        let newer = self
            .last_file
            .as_ref()
            .is_none_or(|current| candidate.time > current.time);
        if newer {
            self.last_file = Some(candidate);
        }
        newer
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn directories_snapshot(&self) -> Arc<Vec<Arc<Directory>>> {
        Arc::new(self.directories.values().cloned().map(Arc::new).collect())
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        Arc::new(self.devices.values().cloned().map(Arc::new).collect())
    }

    #[cfg(test)]
    pub(crate) fn insert_directory(&mut self, dir: Directory) {
        self.directories.insert(dir.id.clone(), dir);
    }

    #[cfg(test)]
    pub(crate) fn insert_device(&mut self, dev: Device) {
        self.devices.insert(dev.id.clone(), dev);
    }
}
