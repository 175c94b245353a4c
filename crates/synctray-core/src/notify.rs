// ── Notification aggregation ──
//
// Append-only log of user-facing notifications plus the "unread" flag.
// Folder errors are deduplicated against the directory's current errors
// and its previous-errors snapshot so a repeated report does not notify
// twice.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::change::{ConnectionEvent, Outbox};
use crate::model::{Directory, DirectoryError, DirectoryStatus, Notification};

/// Collects notifications emitted by the engine.
#[derive(Debug, Default)]
pub struct NotificationAggregator {
    log: Vec<Notification>,
    unread: bool,
}

impl NotificationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[Notification] {
        &self.log
    }

    pub fn has_unread(&self) -> bool {
        self.unread
    }

    /// Clear the unread flag. Only a consumer action does this.
    pub fn mark_read(&mut self) {
        self.unread = false;
    }

    /// Forget the unread flag on reconnect. The log itself is kept.
    pub(crate) fn reset_unread(&mut self) {
        self.unread = false;
    }

    /// Append a notification and announce it.
    pub(crate) fn emit(&mut self, time: DateTime<Utc>, message: String, outbox: &mut Outbox) {
        info!(%message, "notification");
        let notification = Notification { time, message };
        self.log.push(notification.clone());
        self.unread = true;
        outbox.push(ConnectionEvent::Notification(notification));
    }

    /// Record a folder error reported by `FolderErrors`.
    ///
    /// A new error is appended and puts the directory out of sync.
    /// Returns `true` if the directory changed. A notification is emitted
    /// only if the error was not already known before the last status
    /// transition.
    pub(crate) fn folder_error(
        &mut self,
        dir: &mut Directory,
        error: DirectoryError,
        time: Option<DateTime<Utc>>,
        outbox: &mut Outbox,
    ) -> bool {
        if dir.errors.contains(&error) {
            return false;
        }
        let announce = !dir.previous_errors.contains(&error);
        let message = format!("{} ({}): {}", dir.display_name(), error.path, error.message);

        dir.errors.push(error);
        dir.assign_status(DirectoryStatus::OutOfSync, time);

        if announce {
            self.emit(time.unwrap_or_else(Utc::now), message, outbox);
        }
        true
    }

    /// Record a failed `ItemFinished`.
    ///
    /// Only directories that are already out of sync accumulate these,
    /// which keeps a burst of transient item failures quiet.
    pub(crate) fn item_error(
        &mut self,
        dir: &mut Directory,
        error: DirectoryError,
        time: Option<DateTime<Utc>>,
        outbox: &mut Outbox,
    ) -> bool {
        if dir.status != DirectoryStatus::OutOfSync || dir.errors.contains(&error) {
            return false;
        }
        let message = format!("{} ({}): {}", dir.display_name(), error.path, error.message);
        dir.errors.push(error);
        self.emit(time.unwrap_or_else(Utc::now), message, outbox);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str, path: &str) -> DirectoryError {
        DirectoryError {
            message: message.into(),
            path: path.into(),
        }
    }

    fn notifications(outbox: &Outbox) -> usize {
        outbox
            .events()
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Notification(_)))
            .count()
    }

    #[test]
    fn repeated_folder_error_notifies_once() {
        let mut agg = NotificationAggregator::new();
        let mut dir = Directory::placeholder("d1");
        let mut outbox = Outbox::default();

        assert!(agg.folder_error(&mut dir, error("denied", "a"), None, &mut outbox));
        assert!(!agg.folder_error(&mut dir, error("denied", "a"), None, &mut outbox));

        assert_eq!(notifications(&outbox), 1);
        assert_eq!(dir.errors.len(), 1);
        assert_eq!(dir.status, DirectoryStatus::OutOfSync);
        assert!(agg.has_unread());
    }

    #[test]
    fn error_from_previous_snapshot_is_not_announced() {
        let mut agg = NotificationAggregator::new();
        let mut dir = Directory::placeholder("d1");
        dir.previous_errors.push(error("denied", "a"));
        let mut outbox = Outbox::default();

        assert!(agg.folder_error(&mut dir, error("denied", "a"), None, &mut outbox));
        assert_eq!(notifications(&outbox), 0);
        assert!(!agg.has_unread());
    }

    #[test]
    fn item_errors_only_count_when_out_of_sync() {
        let mut agg = NotificationAggregator::new();
        let mut dir = Directory::placeholder("d1");
        let mut outbox = Outbox::default();

        assert!(!agg.item_error(&mut dir, error("io", "b"), None, &mut outbox));
        dir.status = DirectoryStatus::OutOfSync;
        assert!(agg.item_error(&mut dir, error("io", "b"), None, &mut outbox));
        assert_eq!(agg.log().len(), 1);
    }

    #[test]
    fn unread_flag_is_cleared_by_consumer() {
        let mut agg = NotificationAggregator::new();
        let mut outbox = Outbox::default();
        agg.emit(Utc::now(), "hello".into(), &mut outbox);
        assert!(agg.has_unread());
        agg.mark_read();
        assert!(!agg.has_unread());
        assert_eq!(agg.log().len(), 1);
    }
}
