// ── Event stream interpretation ──
//
// Applies the entries of one `/rest/events` batch to the StateStore in
// array order. Events at or below the highest id applied in this session
// are skipped, and time-stamped updates older than what an entity already
// reflects are ignored, so a replayed batch leaves the store unchanged.

mod cursor;
mod payload;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use synctray_api::models::RawEvent;

use crate::change::{ConnectionEvent, Outbox};
use crate::model::{
    DeviceStatus, DirectoryCounts, DirectoryError, DirectoryStatus, DownloadProgress, FileRecord,
    ItemProgress, LastFile, ScanProgress,
};
use crate::notify::NotificationAggregator;
use crate::store::StateStore;
use crate::time::parse_time;

pub use cursor::EventCursor;

/// Bytes per block when turning block counts into sizes.
pub const BLOCK_SIZE: u64 = 128 * 1024;

/// What the engine has to do after a batch was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// The config is stale: an unknown directory appeared or the daemon
    /// saved its config.
    pub refresh_config: bool,
    /// Highest event id in the batch.
    pub last_id: Option<u64>,
}

/// Mutable state one event handler may touch.
pub(crate) struct EventTarget<'a> {
    pub store: &'a mut StateStore,
    pub notifications: &'a mut NotificationAggregator,
    pub outbox: &'a mut Outbox,
}

/// Dispatches daemon events by type.
#[derive(Debug, Default)]
pub struct EventProcessor {
    applied_up_to: u64,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest event id applied since the last reset.
    pub fn applied_up_to(&self) -> u64 {
        self.applied_up_to
    }

    /// Forget the applied high-water mark. Called with every cursor reset.
    pub fn reset(&mut self) {
        self.applied_up_to = 0;
    }

    pub(crate) fn apply_batch(&mut self, events: &[RawEvent], target: &mut EventTarget<'_>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for event in events {
            if event.id > 0 {
                outcome.last_id = Some(outcome.last_id.map_or(event.id, |id| id.max(event.id)));
                if event.id <= self.applied_up_to {
                    trace!(id = event.id, kind = %event.event_type, "skipping replayed event");
                    continue;
                }
                self.applied_up_to = event.id;
            }

            trace!(id = event.id, kind = %event.event_type, "applying event");
            let time = event.time.as_deref().and_then(parse_time);
            outcome.refresh_config |= dispatch(event, time, target);
        }

        outcome
    }
}

/// Returns `true` if the event invalidates the cached config.
fn dispatch(event: &RawEvent, time: Option<DateTime<Utc>>, target: &mut EventTarget<'_>) -> bool {
    let kind = event.event_type.as_str();
    match kind {
        "Starting" => {
            if let Some(data) = decode_data::<payload::Starting>(event) {
                starting(&data, target);
            }
        }
        "StateChanged" => {
            if let Some(data) = decode_data::<payload::StateChanged>(event) {
                return state_changed(&data, time, target);
            }
        }
        "DownloadProgress" => {
            if let Some(data) = decode_data::<payload::DownloadProgress>(event) {
                download_progress(&data, target);
            }
        }
        "FolderErrors" => {
            if let Some(data) = decode_data::<payload::FolderErrors>(event) {
                folder_errors(data, time, target);
            }
        }
        "FolderSummary" => {
            if let Some(data) = decode_data::<payload::FolderSummary>(event) {
                folder_summary(&data, target);
            }
        }
        "FolderCompletion" => {
            if let Some(data) = decode_data::<payload::FolderCompletion>(event) {
                folder_completion(&data, target);
            }
        }
        "FolderScanProgress" => {
            if let Some(data) = decode_data::<payload::FolderScanProgress>(event) {
                folder_scan_progress(&data, time, target);
            }
        }
        "DeviceConnected" | "DeviceDisconnected" | "DevicePaused" | "DeviceRejected"
        | "DeviceResumed" | "DeviceDiscovered" => {
            if let Some(data) = decode_data::<payload::DeviceEvent>(event) {
                device_event(kind, &data.device, time, target);
            }
        }
        "ItemFinished" => {
            if let Some(data) = decode_data::<payload::ItemFinished>(event) {
                item_finished(data, time, target);
            }
        }
        "ConfigSaved" => return true,
        // ItemStarted carries nothing we track yet.
        _ => {}
    }
    false
}

fn decode_data<T: DeserializeOwned>(event: &RawEvent) -> Option<T> {
    match T::deserialize(&event.data) {
        Ok(data) => Some(data),
        Err(e) => {
            debug!(id = event.id, kind = %event.event_type, error = %e, "ignoring malformed event data");
            None
        }
    }
}

// ── Connection-wide ─────────────────────────────────────────────────

fn starting(data: &payload::Starting, target: &mut EventTarget<'_>) {
    target.store.set_config_dir(&data.home, target.outbox);
    if !data.my_id.is_empty() {
        target.store.set_own_id(&data.my_id, target.outbox);
    }
}

// ── Directories ─────────────────────────────────────────────────────

fn state_changed(data: &payload::StateChanged, time: Option<DateTime<Utc>>, target: &mut EventTarget<'_>) -> bool {
    if data.folder.is_empty() {
        return false;
    }
    let status = DirectoryStatus::from_daemon(&data.to);

    if let Some((index, dir)) = target.store.directory_mut(&data.folder) {
        if dir.assign_status(status, time) {
            target.outbox.directory_changed(&data.folder, index);
        }
        return false;
    }

    debug!(folder = %data.folder, "state change for unknown directory, refreshing config");
    target.store.insert_placeholder(&data.folder, target.outbox);
    if let Some((_, dir)) = target.store.directory_mut(&data.folder) {
        dir.assign_status(status, time);
    }
    true
}

fn download_progress(data: &payload::DownloadProgress, target: &mut EventTarget<'_>) {
    for (_, dir) in target.store.directories_mut() {
        // Files missing from the event have finished downloading.
        let items = data
            .get(&dir.id)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, progress)| item_progress(name, progress))
                    .collect()
            })
            .unwrap_or_default();
        dir.download = summarize_download(items);
    }
    target.outbox.push(ConnectionEvent::DownloadProgressChanged);
}

fn item_progress(name: &str, progress: &payload::PullerProgress) -> ItemProgress {
    let downloaded = progress.blocks_downloaded();
    ItemProgress {
        name: name.to_owned(),
        blocks_in_progress: progress.pulling,
        blocks_downloaded: downloaded,
        blocks_total: progress.total,
        copied_from_origin: progress.copied_from_origin,
        copied_from_elsewhere: progress.copied_from_elsewhere,
        reused: progress.reused,
        bytes_done: progress.bytes_done,
        bytes_total: progress.bytes_total,
        percentage: percentage(downloaded, progress.total),
    }
}

fn summarize_download(items: Vec<ItemProgress>) -> DownloadProgress {
    let blocks_downloaded = items.iter().map(|i| i.blocks_downloaded).sum::<u64>();
    let blocks_total = items.iter().map(|i| i.blocks_total).sum::<u64>();
    let percentage = percentage(blocks_downloaded, blocks_total);
    let label = format!(
        "{} / {} - {percentage} %",
        bytesize::ByteSize::b(blocks_downloaded.saturating_mul(BLOCK_SIZE)).to_string_as(true),
        bytesize::ByteSize::b(blocks_total.saturating_mul(BLOCK_SIZE)).to_string_as(true),
    );
    DownloadProgress {
        items,
        blocks_downloaded,
        blocks_total,
        percentage,
        label,
    }
}

/// `done * 100 / total`, clamped to 100; 0 when either side is 0.
fn percentage(done: u64, total: u64) -> u8 {
    if done == 0 || total == 0 {
        return 0;
    }
    u8::try_from((done.saturating_mul(100) / total).min(100)).unwrap_or(100)
}

fn folder_errors(data: payload::FolderErrors, time: Option<DateTime<Utc>>, target: &mut EventTarget<'_>) {
    let Some((index, dir)) = target.store.directory_mut(&data.folder) else {
        return;
    };
    if let (Some(time), Some(last)) = (time, dir.last_status_update) {
        if time < last {
            trace!(folder = %data.folder, "ignoring stale folder errors");
            return;
        }
    }

    let mut changed = false;
    for entry in data.errors {
        let error = DirectoryError {
            message: entry.error,
            path: entry.path,
        };
        changed |= target.notifications.folder_error(dir, error, time, target.outbox);
    }
    if changed {
        target.outbox.directory_changed(&data.folder, index);
    }
}

fn folder_summary(data: &payload::FolderSummary, target: &mut EventTarget<'_>) {
    let Some(ref summary) = data.summary else {
        return;
    };
    let Some((index, dir)) = target.store.directory_mut(&data.folder) else {
        return;
    };
    let counts = DirectoryCounts {
        global_bytes: summary.global_bytes,
        global_deleted: summary.global_deleted,
        global_files: summary.global_files,
        local_bytes: summary.local_bytes,
        local_deleted: summary.local_deleted,
        local_files: summary.local_files,
        need_bytes: summary.need_bytes,
        need_files: summary.need_files,
    };
    if dir.counts != counts {
        dir.counts = counts;
        target.outbox.directory_changed(&data.folder, index);
    }
}

/// Keep the smallest completion any remote device reports. 0 and 100 say
/// nothing about an ongoing transfer and are ignored.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn folder_completion(data: &payload::FolderCompletion, target: &mut EventTarget<'_>) {
    let Some((index, dir)) = target.store.directory_mut(&data.folder) else {
        return;
    };
    if !(data.completion > 0.0 && data.completion < 100.0) {
        return;
    }
    let completion = (data.completion.floor() as u8).max(1);
    if dir.completion_percentage == 0 || completion < dir.completion_percentage {
        dir.completion_percentage = completion;
        target.outbox.directory_changed(&data.folder, index);
    }
}

fn folder_scan_progress(
    data: &payload::FolderScanProgress,
    time: Option<DateTime<Utc>>,
    target: &mut EventTarget<'_>,
) {
    if data.current == 0 || data.total == 0 {
        return;
    }
    let Some((index, dir)) = target.store.directory_mut(&data.folder) else {
        return;
    };
    if let (Some(time), Some(last)) = (time, dir.last_status_update) {
        if time < last {
            return;
        }
    }
    let scan = ScanProgress {
        percentage: percentage(data.current, data.total),
        rate: data.rate,
    };
    let status_changed = dir.assign_status(DirectoryStatus::Scanning, time);
    if status_changed || dir.scan != Some(scan) {
        dir.scan = Some(scan);
        target.outbox.directory_changed(&data.folder, index);
    }
}

fn item_finished(data: payload::ItemFinished, time: Option<DateTime<Utc>>, target: &mut EventTarget<'_>) {
    let Some((index, dir)) = target.store.directory_mut(&data.folder) else {
        return;
    };

    if let Some(message) = data.error.filter(|e| !e.is_empty()) {
        let error = DirectoryError {
            message,
            path: data.item,
        };
        if target.notifications.item_error(dir, error, time, target.outbox) {
            target.outbox.directory_changed(&data.folder, index);
        }
        return;
    }

    let Some(time) = time else {
        return;
    };
    if dir.last_file.as_ref().is_some_and(|f| time <= f.time) {
        return;
    }
    let deleted = data.action == "delete";
    dir.last_file = Some(FileRecord {
        name: data.item.clone(),
        time,
        deleted,
    });
    target.outbox.directory_changed(&data.folder, index);

    target.store.offer_last_file(LastFile {
        directory_id: data.folder,
        name: data.item,
        time,
        deleted,
    });
}

// ── Devices ─────────────────────────────────────────────────────────

fn device_event(kind: &str, device: &str, time: Option<DateTime<Utc>>, target: &mut EventTarget<'_>) {
    if let (Some(time), Some(last)) = (time, target.store.last_connections_update()) {
        if time < last {
            trace!(%device, kind, "ignoring device event older than the last connections poll");
            return;
        }
    }
    let Some((index, dev)) = target.store.device_mut(device) else {
        return;
    };

    let mut status = dev.status;
    let mut paused = dev.paused;
    match kind {
        "DeviceConnected" => status = DeviceStatus::Idle,
        "DeviceDisconnected" => status = DeviceStatus::Disconnected,
        "DevicePaused" => paused = true,
        "DeviceRejected" => status = DeviceStatus::Rejected,
        "DeviceResumed" => {
            paused = false;
            status = DeviceStatus::Disconnected;
        }
        "DeviceDiscovered" if status == DeviceStatus::Unknown => status = DeviceStatus::Disconnected,
        _ => {}
    }

    let mut changed = dev.set_status(status);
    if dev.paused != paused {
        dev.paused = paused;
        changed = true;
    }
    if changed {
        target.outbox.device_changed(device, index);
    }
}
