// ── Connection handle ──
//
// Full lifecycle management for one daemon connection. The handle is a
// thin, cloneable front for the engine task: commands go in over an
// unbounded channel, state comes out through watch channels and a
// broadcast stream of `ConnectionEvent`s.

mod command;
mod engine;
mod requests;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use synctray_api::{RestClient, Transport, TransportConfig};

use crate::change::ConnectionEvent;
use crate::config::ConnectionSettings;
use crate::error::CoreError;
use crate::model::{ConnectionState, Device, Directory, LogEntry, Notification, Overview};
use crate::stream::{Snapshot, SnapshotStream};

use command::Command;
use engine::{Engine, Publishers};

const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConnectionInner>`. Creating a connection
/// spawns its engine task but does not contact the daemon; call
/// [`connect()`](Self::connect) for that. Dropping the last clone stops
/// the engine.
///
/// Must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    command_tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    directories: watch::Receiver<Snapshot<Directory>>,
    devices: watch::Receiver<Snapshot<Device>>,
    overview: watch::Receiver<Overview>,
    notifications: watch::Receiver<Arc<Vec<Notification>>>,
    event_tx: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Connection {
    /// Start an engine that talks through `transport`.
    pub fn new(settings: ConnectionSettings, transport: Arc<dyn Transport>) -> Self {
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (directories_tx, directories) = watch::channel(Arc::new(Vec::new()));
        let (devices_tx, devices) = watch::channel(Arc::new(Vec::new()));
        let (overview_tx, overview) = watch::channel(Overview::default());
        let (notifications_tx, notifications) = watch::channel(Arc::new(Vec::new()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let publishers = Publishers {
            state: state_tx,
            directories: directories_tx,
            devices: devices_tx,
            overview: overview_tx,
            notifications: notifications_tx,
            events: event_tx.clone(),
        };
        let engine = Engine::new(settings, transport, publishers, command_rx, cancel.clone());
        let task = tokio::spawn(engine.run());

        Self {
            inner: Arc::new(ConnectionInner {
                command_tx,
                state,
                directories,
                devices,
                overview,
                notifications,
                event_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Start an engine backed by the real HTTP client.
    pub fn with_rest_client(settings: ConnectionSettings) -> Result<Self, CoreError> {
        let client = RestClient::new(TransportConfig {
            timeout: settings.request_timeout,
            pinned: None,
        })?;
        Ok(Self::new(settings, Arc::new(client)))
    }

    fn send(&self, command: Command) -> Result<(), CoreError> {
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| CoreError::EngineStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, CoreError>>) -> Command,
    ) -> Result<T, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| CoreError::EngineStopped)?
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect with the current settings. A no-op when already connected.
    pub fn connect(&self) -> Result<(), CoreError> {
        self.send(Command::Connect)
    }

    /// Apply new settings. Reconnects only when the address, credentials
    /// or certificate changed, and returns whether it did.
    pub async fn connect_with(&self, settings: ConnectionSettings) -> Result<bool, CoreError> {
        self.request(|reply| Command::ConnectWith(Box::new(settings), reply))
            .await
    }

    pub fn disconnect(&self) -> Result<(), CoreError> {
        self.send(Command::Disconnect)
    }

    /// Drop all cached state and bootstrap from scratch.
    pub fn reconnect(&self) -> Result<(), CoreError> {
        self.send(Command::Reconnect)
    }

    pub fn reconnect_with(&self, settings: ConnectionSettings) -> Result<(), CoreError> {
        self.send(Command::ReconnectWith(Box::new(settings)))
    }

    /// Stop the engine and wait for it to publish `ShuttingDown`.
    pub async fn close(&self) {
        let _ = self.inner.command_tx.send(Command::Close);
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                debug!(error = %e, "engine task ended abnormally");
            }
        }
    }

    // ── Daemon commands ──────────────────────────────────────────────

    pub fn pause(&self, device_id: impl Into<String>) -> Result<(), CoreError> {
        self.send(Command::Pause(device_id.into()))
    }

    pub fn resume(&self, device_id: impl Into<String>) -> Result<(), CoreError> {
        self.send(Command::Resume(device_id.into()))
    }

    /// Pause every device except the daemon's own.
    pub fn pause_all(&self) -> Result<(), CoreError> {
        self.send(Command::PauseAll)
    }

    pub fn resume_all(&self) -> Result<(), CoreError> {
        self.send(Command::ResumeAll)
    }

    pub fn rescan(&self, directory_id: impl Into<String>) -> Result<(), CoreError> {
        self.send(Command::Rescan(directory_id.into()))
    }

    pub fn rescan_all(&self) -> Result<(), CoreError> {
        self.send(Command::RescanAll)
    }

    pub fn restart(&self) -> Result<(), CoreError> {
        self.send(Command::Restart)
    }

    pub fn shutdown(&self) -> Result<(), CoreError> {
        self.send(Command::Shutdown)
    }

    /// Fetch the daemon log.
    pub async fn request_log(&self) -> Result<Vec<LogEntry>, CoreError> {
        self.request(Command::FetchLog).await
    }

    /// Fetch a PNG QR code encoding `text`.
    pub async fn request_qr_code(&self, text: impl Into<String>) -> Result<Bytes, CoreError> {
        let text = text.into();
        self.request(|reply| Command::FetchQrCode(text, reply)).await
    }

    pub fn mark_notifications_read(&self) -> Result<(), CoreError> {
        self.send(Command::MarkNotificationsRead)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// Subscribe to change events. Events sent before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn directories(&self) -> SnapshotStream<Directory> {
        SnapshotStream::new(self.inner.directories.clone())
    }

    pub fn devices(&self) -> SnapshotStream<Device> {
        SnapshotStream::new(self.inner.devices.clone())
    }

    pub fn directories_snapshot(&self) -> Snapshot<Directory> {
        self.inner.directories.borrow().clone()
    }

    pub fn devices_snapshot(&self) -> Snapshot<Device> {
        self.inner.devices.borrow().clone()
    }

    pub fn overview(&self) -> Overview {
        self.inner.overview.borrow().clone()
    }

    pub fn overview_watch(&self) -> watch::Receiver<Overview> {
        self.inner.overview.clone()
    }

    pub fn notifications(&self) -> Arc<Vec<Notification>> {
        self.inner.notifications.borrow().clone()
    }
}
