// ── Event payloads ──
//
// Typed views of the `data` object of the event types we interpret.
// Missing fields default so that older daemons that omit them still
// decode.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct Starting {
    #[serde(default)]
    pub home: String,
    #[serde(default, rename = "myID")]
    pub my_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StateChanged {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub to: String,
}

/// `folder id -> file name -> progress`
pub(super) type DownloadProgress = HashMap<String, BTreeMap<String, PullerProgress>>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct PullerProgress {
    pub total: u64,
    pub reused: u64,
    pub copied_from_origin: u64,
    pub copied_from_elsewhere: u64,
    pub pulled: u64,
    pub pulling: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl PullerProgress {
    pub fn blocks_downloaded(&self) -> u64 {
        self.reused
            .saturating_add(self.copied_from_origin)
            .saturating_add(self.copied_from_elsewhere)
            .saturating_add(self.pulled)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FolderErrors {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub errors: Vec<FolderError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FolderError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct FolderSummary {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub summary: Option<Summary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct Summary {
    pub global_bytes: u64,
    pub global_deleted: u64,
    pub global_files: u64,
    pub local_bytes: u64,
    pub local_deleted: u64,
    pub local_files: u64,
    pub need_bytes: u64,
    pub need_files: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct FolderCompletion {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub completion: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct FolderScanProgress {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub rate: f64,
}

/// `DeviceConnected`/`DeviceDisconnected` name the peer `id`; the other
/// device events use `device`.
#[derive(Debug, Deserialize)]
pub(super) struct DeviceEvent {
    #[serde(default, alias = "id")]
    pub device: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemFinished {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub action: String,
}
