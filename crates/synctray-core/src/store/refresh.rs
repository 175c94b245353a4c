// ── Config refresh application logic ──
//
// A config fetch re-creates both collections. Entities keep their runtime
// fields across the refresh by moving the previous instance into the new
// slot and overwriting only configuration fields. Ids missing from the new
// config are dropped.

use indexmap::IndexMap;

use synctray_api::models::{DeviceConfig, FolderConfig};

use crate::model::{Device, DeviceStatus, Directory};

/// Build the new directory collection in config order.
pub(super) fn merge_directories(
    previous: &mut IndexMap<String, Directory>,
    incoming: &[FolderConfig],
) -> IndexMap<String, Directory> {
    let mut next = IndexMap::with_capacity(incoming.len());
    for config in incoming {
        let mut dir = previous
            .swap_remove(&config.id)
            .unwrap_or_else(|| Directory::placeholder(&config.id));

        dir.label.clone_from(&config.label);
        dir.path.clone_from(&config.path);
        dir.device_ids = config.devices.iter().map(|d| d.device_id.clone()).collect();
        dir.read_only = config.is_read_only();
        dir.rescan_interval = config.rescan_interval_s;
        dir.ignore_permissions = config.ignore_perms;
        dir.auto_normalize = config.auto_normalize;
        dir.min_disk_free_percentage = config.min_disk_free_pct;

        next.insert(config.id.clone(), dir);
    }
    next
}

/// Build the new device collection in config order.
///
/// The own-device status is recomputed from `own_id`; any other status
/// is recycled.
pub(super) fn merge_devices(
    previous: &mut IndexMap<String, Device>,
    incoming: &[DeviceConfig],
    own_id: &str,
) -> IndexMap<String, Device> {
    let mut next = IndexMap::with_capacity(incoming.len());
    for config in incoming {
        let mut dev = previous
            .swap_remove(&config.device_id)
            .unwrap_or_else(|| Device::new(&config.device_id));

        dev.name.clone_from(&config.name);
        dev.addresses.clone_from(&config.addresses);
        dev.compression.clone_from(&config.compression);
        dev.cert_name.clone_from(&config.cert_name);
        dev.introducer = config.introducer;

        if !own_id.is_empty() && dev.id == own_id {
            dev.status = DeviceStatus::OwnDevice;
        } else if dev.status == DeviceStatus::OwnDevice {
            dev.status = DeviceStatus::Unknown;
        }

        next.insert(config.device_id.clone(), dev);
    }
    next
}
