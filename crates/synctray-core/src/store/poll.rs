// ── Poll result application ──
//
// Merges the periodic REST polls (connections, folder/device statistics,
// daemon errors) into the store. Only entities already known from the
// config are touched; unknown ids are skipped until the next refresh.

use chrono::{DateTime, Utc};
use tracing::trace;

use synctray_api::models::{
    Connections, DeviceStatistics, FolderStatistics, LogLine, SystemErrors,
};

use crate::change::{ConnectionEvent, Outbox};
use crate::model::{FileRecord, LastFile, Traffic, transfer_rate};
use crate::time::parse_time;

use super::StateStore;

impl StateStore {
    /// Apply `system/connections`: totals, rates and per-device state.
    pub(crate) fn apply_connections(
        &mut self,
        connections: &Connections,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) {
        let elapsed = self
            .last_connections_update
            .and_then(|last| (now - last).to_std().ok());
        let totals = &connections.total;
        let traffic = Traffic {
            bytes_in: totals.in_bytes_total,
            bytes_out: totals.out_bytes_total,
            rate_in: transfer_rate(self.traffic.bytes_in, totals.in_bytes_total, elapsed),
            rate_out: transfer_rate(self.traffic.bytes_out, totals.out_bytes_total, elapsed),
        };
        self.last_connections_update = Some(now);
        if traffic != self.traffic {
            self.traffic = traffic;
            outbox.push(ConnectionEvent::TrafficChanged(traffic));
        }

        for (index, device) in self.devices.values_mut().enumerate() {
            let Some(conn) = connections.connections.get(&device.id) else {
                continue;
            };
            let before = device.clone();

            device.apply_connected(conn.connected);
            device.paused = conn.paused;
            device.connection.bytes_in = conn.in_bytes_total;
            device.connection.bytes_out = conn.out_bytes_total;
            device.connection.address.clone_from(&conn.address);
            device.connection.connection_type.clone_from(&conn.connection_type);
            device.connection.client_version.clone_from(&conn.client_version);

            if *device != before {
                outbox.device_changed(&device.id, index);
            }
        }
    }

    /// Apply `stats/folder`: last scan and last synced file.
    pub(crate) fn apply_folder_stats(&mut self, stats: &FolderStatistics, outbox: &mut Outbox) {
        let mut newest: Option<LastFile> = None;

        for (index, dir) in self.directories.values_mut().enumerate() {
            let Some(entry) = stats.get(&dir.id) else {
                continue;
            };
            let before = (dir.last_scan, dir.last_file.clone());

            dir.last_scan = entry.last_scan.as_deref().and_then(parse_time);
            if let Some(ref file) = entry.last_file {
                if let Some(time) = file.at.as_deref().and_then(parse_time) {
                    let record = FileRecord {
                        name: file.filename.clone(),
                        time,
                        deleted: file.deleted,
                    };
                    if newest.as_ref().is_none_or(|n| time > n.time) {
                        newest = Some(LastFile {
                            directory_id: dir.id.clone(),
                            name: record.name.clone(),
                            time,
                            deleted: record.deleted,
                        });
                    }
                    dir.last_file = Some(record);
                }
            }

            if before != (dir.last_scan, dir.last_file.clone()) {
                outbox.directory_changed(&dir.id, index);
            }
        }

        if let Some(file) = newest {
            self.offer_last_file(file);
        }
    }

    /// Apply `stats/device`: last seen timestamps.
    pub(crate) fn apply_device_stats(&mut self, stats: &DeviceStatistics, outbox: &mut Outbox) {
        for (index, dev) in self.devices.values_mut().enumerate() {
            let Some(entry) = stats.get(&dev.id) else {
                continue;
            };
            let last_seen = entry.last_seen.as_deref().and_then(parse_time);
            if last_seen != dev.last_seen {
                dev.last_seen = last_seen;
                outbox.device_changed(&dev.id, index);
            }
        }
    }

    /// Filter `system/error` down to entries newer than the watermark and
    /// advance it.
    ///
    /// The first poll only sets the watermark to `now`, so errors raised
    /// before this client connected are not re-announced.
    pub(crate) fn take_new_daemon_errors(
        &mut self,
        errors: &SystemErrors,
        now: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, LogLine)> {
        let Some(watermark) = self.last_error_time else {
            self.last_error_time = Some(now);
            return Vec::new();
        };

        let mut fresh = Vec::new();
        let mut newest = watermark;
        for line in errors.errors.iter().flatten() {
            let Some(when) = parse_time(&line.when) else {
                trace!(when = %line.when, "skipping daemon error with bad timestamp");
                continue;
            };
            if when > watermark {
                newest = newest.max(when);
                fresh.push((when, line.clone()));
            }
        }
        self.last_error_time = Some(newest);
        fresh
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::model::{Device, DeviceStatus, Directory};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn first_connections_poll_has_zero_rate() {
        let mut store = StateStore::new();
        let mut outbox = Outbox::default();
        let conns: Connections = serde_json::from_value(json!({
            "total": { "inBytesTotal": 1_000_000, "outBytesTotal": 5 }
        }))
        .unwrap();

        store.apply_connections(&conns, now(), &mut outbox);

        let traffic = store.traffic();
        assert_eq!(traffic.bytes_in, 1_000_000);
        assert!(traffic.rate_in.abs() < f64::EPSILON);
    }

    #[test]
    fn second_connections_poll_computes_rate() {
        let mut store = StateStore::new();
        let mut outbox = Outbox::default();
        let first: Connections =
            serde_json::from_value(json!({ "total": { "inBytesTotal": 0, "outBytesTotal": 0 } }))
                .unwrap();
        let second: Connections = serde_json::from_value(
            json!({ "total": { "inBytesTotal": 250_000, "outBytesTotal": 0 } }),
        )
        .unwrap();

        store.apply_connections(&first, now(), &mut outbox);
        store.apply_connections(&second, now() + Duration::seconds(2), &mut outbox);

        assert!((store.traffic().rate_in - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn connections_update_devices_but_not_own() {
        let mut store = StateStore::new();
        let mut own = Device::new("OWN");
        own.status = DeviceStatus::OwnDevice;
        store.insert_device(own);
        store.insert_device(Device::new("PEER"));
        let mut outbox = Outbox::default();

        let conns: Connections = serde_json::from_value(json!({
            "connections": {
                "OWN": { "connected": false },
                "PEER": { "connected": true, "paused": true, "address": "10.0.0.2:22000",
                          "type": "quic-client", "clientVersion": "v1.27.0" }
            }
        }))
        .unwrap();
        store.apply_connections(&conns, now(), &mut outbox);

        assert_eq!(store.device("OWN").unwrap().status, DeviceStatus::OwnDevice);
        let peer = store.device("PEER").unwrap();
        assert_eq!(peer.status, DeviceStatus::Idle);
        assert!(peer.paused);
        assert_eq!(peer.connection.connection_type, "quic-client");
    }

    #[test]
    fn folder_stats_track_newest_file() {
        let mut store = StateStore::new();
        store.insert_directory(Directory::placeholder("d1"));
        store.insert_directory(Directory::placeholder("d2"));
        let mut outbox = Outbox::default();

        let stats: FolderStatistics = serde_json::from_value(json!({
            "d1": { "lastScan": "2024-05-01T10:00:00Z",
                    "lastFile": { "filename": "old.txt", "at": "2024-05-01T09:00:00Z", "deleted": false } },
            "d2": { "lastFile": { "filename": "new.txt", "at": "2024-05-01T11:00:00Z", "deleted": true } }
        }))
        .unwrap();
        store.apply_folder_stats(&stats, &mut outbox);

        assert!(store.directory("d1").unwrap().last_scan.is_some());
        let last = store.last_file().unwrap();
        assert_eq!(last.name, "new.txt");
        assert_eq!(last.directory_id, "d2");
        assert!(last.deleted);
    }

    #[test]
    fn daemon_errors_before_first_poll_are_ignored() {
        let mut store = StateStore::new();
        let errors: SystemErrors = serde_json::from_value(json!({
            "errors": [{ "when": "2024-05-01T11:59:00Z", "message": "old" }]
        }))
        .unwrap();
        assert!(store.take_new_daemon_errors(&errors, now()).is_empty());

        let errors: SystemErrors = serde_json::from_value(json!({
            "errors": [
                { "when": "2024-05-01T11:59:00Z", "message": "old" },
                { "when": "2024-05-01T12:00:05Z", "message": "new" }
            ]
        }))
        .unwrap();
        let fresh = store.take_new_daemon_errors(&errors, now() + Duration::seconds(30));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].1.message, "new");

        // Same list again: nothing new.
        assert!(
            store
                .take_new_daemon_errors(&errors, now() + Duration::seconds(60))
                .is_empty()
        );
    }
}
