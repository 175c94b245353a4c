// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Connection state of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum::Display)]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Disconnected,
    Idle,
    Synchronizing,
    Paused,
    Rejected,
    /// The daemon's own device. Sticky until the next config refresh.
    OwnDevice,
}

/// Live connection details from `system/connections`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub address: String,
    pub connection_type: String,
    pub client_version: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// One peer device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    // ── Configuration ────────────────────────────────────────────────
    pub id: String,
    pub name: String,
    pub addresses: Vec<String>,
    pub compression: String,
    pub cert_name: String,
    pub introducer: bool,

    // ── Runtime ──────────────────────────────────────────────────────
    pub status: DeviceStatus,
    pub paused: bool,
    pub connection: ConnectionInfo,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            addresses: Vec::new(),
            compression: String::new(),
            cert_name: String::new(),
            introducer: false,
            status: DeviceStatus::Unknown,
            paused: false,
            connection: ConnectionInfo::default(),
            last_seen: None,
        }
    }

    pub fn is_own(&self) -> bool {
        self.status == DeviceStatus::OwnDevice
    }

    /// Name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    /// Change status unless this is the own device. Returns `true` if
    /// anything changed.
    pub fn set_status(&mut self, status: DeviceStatus) -> bool {
        if self.is_own() || self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    /// Apply the `connected` flag from a connections poll.
    pub fn apply_connected(&mut self, connected: bool) -> bool {
        let next = match self.status {
            DeviceStatus::OwnDevice => return false,
            DeviceStatus::Disconnected | DeviceStatus::Unknown if connected => DeviceStatus::Idle,
            DeviceStatus::Disconnected | DeviceStatus::Unknown => DeviceStatus::Disconnected,
            current if connected => current,
            _ => DeviceStatus::Disconnected,
        };
        self.set_status(next)
    }
}
