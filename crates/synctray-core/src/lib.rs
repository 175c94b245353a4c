//! Connection engine and live state replica for a Syncthing daemon.
//!
//! This crate keeps an in-memory picture of one daemon (its directories,
//! devices, traffic and notifications) current by combining a long-polled
//! event stream with periodic REST polls:
//!
//! - **[`Connection`]**: cloneable handle over a single engine task.
//!   [`connect()`](Connection::connect) bootstraps config and status, then
//!   runs the event loop and the polls until disconnected or closed.
//!   Daemon commands (pause, resume, rescan, restart, shutdown) go through
//!   the same handle.
//!
//! - **[`StateStore`]**: owned exclusively by the engine. Observers get
//!   immutable `Arc` snapshots through [`SnapshotStream`] and typed
//!   [`ConnectionEvent`]s through a broadcast channel.
//!
//! - **[`EventProcessor`]**: turns daemon events into store mutations.
//!   Replaying an already applied batch is a no-op.
//!
//! - **[`ConnectionState`]**: derived from directory and device statuses
//!   while connected; `Disconnected`/`Reconnecting` follow the transport.

pub mod certificate;
pub mod change;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod model;
pub mod notify;
pub mod reconnect;
pub mod store;
pub mod stream;
mod time;

// ── Primary re-exports ──────────────────────────────────────────────
pub use change::ConnectionEvent;
pub use config::ConnectionSettings;
pub use connection::Connection;
pub use error::{CoreError, ErrorCategory, ErrorReport};
pub use events::{BLOCK_SIZE, BatchOutcome, EventCursor, EventProcessor};
pub use notify::NotificationAggregator;
pub use reconnect::{ReconnectPolicy, ScheduledReconnect};
pub use store::{StateStore, StatusTracker};
pub use stream::{Snapshot, SnapshotStream};

pub use model::{
    ConnectionInfo, ConnectionState, Device, DeviceStatus, Directory, DirectoryCounts,
    DirectoryError, DirectoryStatus, DownloadProgress, FileRecord, ItemProgress, LastFile,
    LogEntry, Notification, Overview, ScanProgress, Traffic,
};

// Transport types consumers need to construct a connection.
pub use synctray_api::{BasicAuth, PinnedCertificate, Transport};
