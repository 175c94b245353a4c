// ── Typed change notifications ──
//
// Everything the engine tells its observers goes through
// `ConnectionEvent`. Mutating code pushes events into an `Outbox`; the
// engine drains it after each step, publishes fresh snapshots for the
// collections that were touched, and broadcasts the events in order.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ErrorReport;
use crate::model::{ConnectionState, Notification, Traffic};

/// A change observed on the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A config was fetched (or `Null` when the cache was invalidated).
    NewConfig(Arc<serde_json::Value>),
    /// The directory list was replaced; earlier indices are invalid.
    NewDirectories,
    /// The device list was replaced; earlier indices are invalid.
    NewDevices,
    DirectoryChanged { id: String, index: usize },
    DeviceChanged { id: String, index: usize },
    DownloadProgressChanged,
    StatusChanged(ConnectionState),
    /// Directories that finished synchronizing.
    SyncCompleted(Vec<String>),
    Error(ErrorReport),
    Notification(Notification),
    TrafficChanged(Traffic),
    OwnIdChanged(String),
    ConfigDirChanged(String),
    PauseTriggered(String),
    ResumeTriggered(String),
    RescanTriggered(String),
    RestartTriggered,
    ShutdownTriggered,
    ReconnectScheduled { delay: Duration, attempt: u32 },
}

/// Events collected during one engine step.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    events: Vec<ConnectionEvent>,
    directories_dirty: bool,
    devices_dirty: bool,
}

impl Outbox {
    pub(crate) fn push(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::NewDirectories
            | ConnectionEvent::DirectoryChanged { .. }
            | ConnectionEvent::DownloadProgressChanged => self.directories_dirty = true,
            ConnectionEvent::NewDevices | ConnectionEvent::DeviceChanged { .. } => {
                self.devices_dirty = true;
            }
            _ => {}
        }
        self.events.push(event);
    }

    pub(crate) fn directory_changed(&mut self, id: &str, index: usize) {
        self.push(ConnectionEvent::DirectoryChanged {
            id: id.to_owned(),
            index,
        });
    }

    pub(crate) fn device_changed(&mut self, id: &str, index: usize) {
        self.push(ConnectionEvent::DeviceChanged {
            id: id.to_owned(),
            index,
        });
    }

    pub(crate) fn error(&mut self, report: ErrorReport) {
        self.push(ConnectionEvent::Error(report));
    }

    /// Take the collected events and dirty flags, leaving the outbox empty.
    pub(crate) fn drain(&mut self) -> (Vec<ConnectionEvent>, bool, bool) {
        let dirs = std::mem::take(&mut self.directories_dirty);
        let devs = std::mem::take(&mut self.devices_dirty);
        (std::mem::take(&mut self.events), dirs, devs)
    }

    #[cfg(test)]
    pub(crate) fn events(&self) -> &[ConnectionEvent] {
        &self.events
    }
}
