// ── Directory domain types ──

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Synchronization state of one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum::Display)]
pub enum DirectoryStatus {
    Idle,
    Scanning,
    Synchronizing,
    OutOfSync,
    #[default]
    Unknown,
}

impl DirectoryStatus {
    /// Map the daemon's `StateChanged.to` string.
    pub fn from_daemon(state: &str) -> Self {
        match state {
            "idle" => Self::Idle,
            "scanning" => Self::Scanning,
            "syncing" => Self::Synchronizing,
            "error" => Self::OutOfSync,
            _ => Self::Unknown,
        }
    }
}

/// One pull/scan error reported for a directory. Equality over both
/// fields is what notification dedupe relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DirectoryError {
    pub message: String,
    pub path: String,
}

/// A file the daemon finished synchronizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub name: String,
    pub time: DateTime<Utc>,
    pub deleted: bool,
}

/// Global/local/need counters from `FolderSummary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryCounts {
    pub global_bytes: u64,
    pub global_deleted: u64,
    pub global_files: u64,
    pub local_bytes: u64,
    pub local_deleted: u64,
    pub local_files: u64,
    pub need_bytes: u64,
    pub need_files: u64,
}

/// Progress of a single file being pulled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemProgress {
    pub name: String,
    pub blocks_in_progress: u64,
    pub blocks_downloaded: u64,
    pub blocks_total: u64,
    pub copied_from_origin: u64,
    pub copied_from_elsewhere: u64,
    pub reused: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub percentage: u8,
}

/// Aggregated download progress of a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub items: Vec<ItemProgress>,
    pub blocks_downloaded: u64,
    pub blocks_total: u64,
    pub percentage: u8,
    /// e.g. `"1.0 MiB / 4.0 MiB - 25 %"`
    pub label: String,
}

impl DownloadProgress {
    pub fn is_active(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Scan progress from `FolderScanProgress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScanProgress {
    pub percentage: u8,
    /// Bytes per second as reported by the daemon.
    pub rate: f64,
}

/// One synchronized folder.
///
/// Configuration fields are overwritten on every config refresh; runtime
/// fields (status, errors, counts, progress, statistics) are carried over
/// from the previous instance with the same id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directory {
    // ── Configuration ────────────────────────────────────────────────
    pub id: String,
    pub label: String,
    pub path: String,
    pub device_ids: Vec<String>,
    pub read_only: bool,
    /// Seconds; `-1` when unknown.
    pub rescan_interval: i64,
    pub ignore_permissions: bool,
    pub auto_normalize: bool,
    pub min_disk_free_percentage: Option<f64>,

    // ── Runtime ──────────────────────────────────────────────────────
    pub status: DirectoryStatus,
    pub last_status_update: Option<DateTime<Utc>>,
    pub errors: Vec<DirectoryError>,
    pub previous_errors: Vec<DirectoryError>,
    pub counts: DirectoryCounts,
    pub download: DownloadProgress,
    /// Minimum completion reported by remote devices, 0 when none.
    pub completion_percentage: u8,
    pub scan: Option<ScanProgress>,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_file: Option<FileRecord>,
}

impl Directory {
    /// A directory known only by id. Used when an event mentions a folder
    /// that is not in the current config yet.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            path: String::new(),
            device_ids: Vec::new(),
            read_only: false,
            rescan_interval: -1,
            ignore_permissions: false,
            auto_normalize: false,
            min_disk_free_percentage: None,
            status: DirectoryStatus::Unknown,
            last_status_update: None,
            errors: Vec::new(),
            previous_errors: Vec::new(),
            counts: DirectoryCounts::default(),
            download: DownloadProgress::default(),
            completion_percentage: 0,
            scan: None,
            last_scan: None,
            last_file: None,
        }
    }

    /// Label, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() { &self.id } else { &self.label }
    }

    /// Apply a status observed at `time`. Returns `true` if the status
    /// changed.
    ///
    /// Updates older than the last applied one are ignored so replayed or
    /// reordered events cannot roll the status back. Leaving `OutOfSync`
    /// moves the current errors into the previous-errors snapshot; reaching
    /// `Idle` clears the completion and scan progress.
    pub fn assign_status(&mut self, status: DirectoryStatus, time: Option<DateTime<Utc>>) -> bool {
        if let (Some(last), Some(time)) = (self.last_status_update, time) {
            if time < last {
                return false;
            }
        }
        if time.is_some() {
            self.last_status_update = time;
        }

        if status != DirectoryStatus::OutOfSync && !self.errors.is_empty() {
            self.previous_errors = std::mem::take(&mut self.errors);
        }
        if status == DirectoryStatus::Idle {
            self.completion_percentage = 0;
            self.scan = None;
        }

        if self.status == status {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    #[test]
    fn maps_daemon_states() {
        assert_eq!(DirectoryStatus::from_daemon("syncing"), DirectoryStatus::Synchronizing);
        assert_eq!(DirectoryStatus::from_daemon("error"), DirectoryStatus::OutOfSync);
        assert_eq!(DirectoryStatus::from_daemon("sync-preparing"), DirectoryStatus::Unknown);
    }

    #[test]
    fn older_status_is_ignored() {
        let mut dir = Directory::placeholder("d1");
        assert!(dir.assign_status(DirectoryStatus::Idle, at(20)));
        assert!(!dir.assign_status(DirectoryStatus::Synchronizing, at(10)));
        assert_eq!(dir.status, DirectoryStatus::Idle);
    }

    #[test]
    fn leaving_out_of_sync_snapshots_errors() {
        let mut dir = Directory::placeholder("d1");
        dir.assign_status(DirectoryStatus::OutOfSync, at(1));
        dir.errors.push(DirectoryError {
            message: "permission denied".into(),
            path: "a.txt".into(),
        });

        dir.assign_status(DirectoryStatus::Idle, at(2));
        assert!(dir.errors.is_empty());
        assert_eq!(dir.previous_errors.len(), 1);
    }

    #[test]
    fn idle_resets_completion() {
        let mut dir = Directory::placeholder("d1");
        dir.completion_percentage = 42;
        dir.assign_status(DirectoryStatus::Idle, at(1));
        assert_eq!(dir.completion_percentage, 0);
    }
}
