// ── Connection-wide summary ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::ConnectionState;
use super::traffic::Traffic;

/// The most recently synchronized file across all directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastFile {
    pub directory_id: String,
    pub name: String,
    pub time: DateTime<Utc>,
    pub deleted: bool,
}

/// Everything about a connection that is not a directory or device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub state: ConnectionState,
    /// The daemon's own device id.
    pub own_id: String,
    /// The daemon's config/home directory.
    pub config_dir: String,
    pub traffic: Traffic,
    pub last_file: Option<LastFile>,
    pub has_unread_notifications: bool,
    /// Directories that finished synchronizing in the latest status
    /// recomputation.
    pub just_completed: Vec<String>,
    pub reconnect_tries: u32,
}
