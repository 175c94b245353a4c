// Wire types for the daemon REST API
//
// Field names follow the daemon's camelCase JSON. Everything that may be
// missing in older or newer daemon versions is defaulted so a partial body
// still decodes.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Decode a JSON body, keeping a preview of the body on failure.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| {
        let text = String::from_utf8_lossy(body);
        let preview: String = text.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: text.into_owned(),
        }
    })
}

// ── system/config ────────────────────────────────────────────────────

/// `GET /rest/system/config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub folders: Vec<FolderConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub devices: Vec<FolderDevice>,
    #[serde(default)]
    pub read_only: bool,
    /// `sendreceive`, `sendonly`, `receiveonly`; newer daemons use this
    /// instead of `readOnly`.
    #[serde(default, rename = "type")]
    pub folder_type: Option<String>,
    #[serde(default = "unknown_interval", rename = "rescanIntervalS")]
    pub rescan_interval_s: i64,
    #[serde(default)]
    pub ignore_perms: bool,
    #[serde(default)]
    pub auto_normalize: bool,
    #[serde(default)]
    pub min_disk_free_pct: Option<f64>,
}

impl FolderConfig {
    pub fn is_read_only(&self) -> bool {
        self.read_only || self.folder_type.as_deref() == Some("sendonly")
    }
}

fn unknown_interval() -> i64 {
    -1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub compression: String,
    #[serde(default)]
    pub cert_name: String,
    #[serde(default)]
    pub introducer: bool,
}

// ── system/status ────────────────────────────────────────────────────

/// `GET /rest/system/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "myID")]
    pub my_id: String,
    #[serde(default)]
    pub uptime: Option<u64>,
}

// ── system/connections ───────────────────────────────────────────────

/// `GET /rest/system/connections`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub total: ConnectionTotals,
    #[serde(default)]
    pub connections: HashMap<String, DeviceConnection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTotals {
    #[serde(default)]
    pub in_bytes_total: u64,
    #[serde(default)]
    pub out_bytes_total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnection {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub in_bytes_total: u64,
    #[serde(default)]
    pub out_bytes_total: u64,
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "type")]
    pub connection_type: String,
    #[serde(default)]
    pub client_version: String,
}

// ── stats ────────────────────────────────────────────────────────────

/// `GET /rest/stats/folder`, keyed by folder id.
pub type FolderStatistics = HashMap<String, FolderStats>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStats {
    #[serde(default)]
    pub last_scan: Option<String>,
    #[serde(default)]
    pub last_file: Option<LastFileStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastFileStats {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// `GET /rest/stats/device`, keyed by device id.
pub type DeviceStatistics = HashMap<String, DeviceStats>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    #[serde(default)]
    pub last_seen: Option<String>,
}

// ── system/error, system/log ─────────────────────────────────────────

/// `GET /rest/system/error`. The daemon sends `null` when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemErrors {
    #[serde(default)]
    pub errors: Option<Vec<LogLine>>,
}

/// `GET /rest/system/log`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemLog {
    #[serde(default)]
    pub messages: Option<Vec<LogLine>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub when: String,
    pub message: String,
}

// ── events ───────────────────────────────────────────────────────────

/// One entry of `GET /rest/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}
