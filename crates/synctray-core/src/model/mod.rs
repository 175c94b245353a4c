// ── Domain model ──
//
// Plain data owned by the `StateStore`. Consumers receive cloned,
// read-only snapshots of these types.

pub mod device;
pub mod directory;
pub mod notification;
pub mod overview;
pub mod state;
pub mod traffic;

pub use device::{ConnectionInfo, Device, DeviceStatus};
pub use directory::{
    Directory, DirectoryCounts, DirectoryError, DirectoryStatus, DownloadProgress, FileRecord,
    ItemProgress, ScanProgress,
};
pub use notification::{LogEntry, Notification};
pub use overview::{LastFile, Overview};
pub use state::ConnectionState;
pub use traffic::{Traffic, transfer_rate};
