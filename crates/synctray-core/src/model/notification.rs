// ── Notifications and log lines ──

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Something worth showing to the user, e.g. a daemon error or a folder
/// pull error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub time: DateTime<Utc>,
    pub message: String,
}

/// One line of the daemon log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub when: String,
    pub message: String,
}
