// ── Aggregate status derivation ──
//
// One prioritized connection state out of many directory and device
// states: Synchronizing > Scanning > Paused > Idle. Directory ids seen
// synchronizing are accumulated until the connection stops synchronizing,
// at which point they become the "just completed" set for exactly one
// recomputation.

use std::collections::BTreeSet;

use crate::model::{ConnectionState, DirectoryStatus};

use super::StateStore;

/// Tracks the aggregate state and the completion bookkeeping.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: ConnectionState,
    syncing: BTreeSet<String>,
    just_completed: Vec<String>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Ids of directories that finished in the latest recomputation.
    pub fn just_completed(&self) -> &[String] {
        &self.just_completed
    }

    /// Ids of directories synchronizing since the connection became
    /// Synchronizing.
    pub fn syncing(&self) -> impl Iterator<Item = &str> {
        self.syncing.iter().map(String::as_str)
    }

    /// Apply a requested state. Returns `true` if the state changed.
    ///
    /// `Disconnected` and `Reconnecting` are taken as-is. Any other request
    /// means "connected, derive the rest from the store". `ShuttingDown` is
    /// terminal and freezes the tracker.
    pub fn set_status(&mut self, requested: ConnectionState, store: &StateStore) -> bool {
        if self.state == ConnectionState::ShuttingDown {
            return false;
        }

        self.just_completed.clear();
        let next = match requested {
            ConnectionState::ShuttingDown => requested,
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                self.syncing.clear();
                requested
            }
            _ => self.derive(store),
        };

        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }

    fn derive(&mut self, store: &StateStore) -> ConnectionState {
        let mut scanning = false;
        let mut synchronizing = false;
        for dir in store.directories() {
            match dir.status {
                DirectoryStatus::Synchronizing => {
                    synchronizing = true;
                    self.syncing.insert(dir.id.clone());
                }
                DirectoryStatus::Scanning => scanning = true,
                _ => {}
            }
        }

        let next = if synchronizing {
            ConnectionState::Synchronizing
        } else if scanning {
            ConnectionState::Scanning
        } else if store.devices().any(|d| d.paused) {
            self.syncing.clear();
            ConnectionState::Paused
        } else {
            ConnectionState::Idle
        };

        if next != ConnectionState::Synchronizing {
            self.just_completed = std::mem::take(&mut self.syncing).into_iter().collect();
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, Directory};

    fn store_with(dirs: &[DirectoryStatus], paused_device: bool) -> StateStore {
        let mut store = StateStore::new();
        for (i, status) in dirs.iter().enumerate() {
            let mut dir = Directory::placeholder(format!("d{i}"));
            dir.status = *status;
            store.insert_directory(dir);
        }
        let mut dev = Device::new("PEER");
        dev.paused = paused_device;
        store.insert_device(dev);
        store
    }

    fn derived(dirs: &[DirectoryStatus], paused: bool) -> ConnectionState {
        let store = store_with(dirs, paused);
        let mut tracker = StatusTracker::new();
        tracker.set_status(ConnectionState::Idle, &store);
        tracker.state()
    }

    #[test]
    fn priority_holds_for_all_combinations() {
        use DirectoryStatus::{Idle, OutOfSync, Scanning, Synchronizing, Unknown};

        let statuses = [Idle, Scanning, Synchronizing, OutOfSync, Unknown];
        for a in statuses {
            for b in statuses {
                for paused in [false, true] {
                    let dirs = [a, b];
                    let expected = if dirs.contains(&Synchronizing) {
                        ConnectionState::Synchronizing
                    } else if dirs.contains(&Scanning) {
                        ConnectionState::Scanning
                    } else if paused {
                        ConnectionState::Paused
                    } else {
                        ConnectionState::Idle
                    };
                    assert_eq!(derived(&dirs, paused), expected, "{dirs:?} paused={paused}");
                }
            }
        }
    }

    #[test]
    fn completion_is_reported_once() {
        let mut store = store_with(&[DirectoryStatus::Synchronizing], false);
        let mut tracker = StatusTracker::new();

        assert!(tracker.set_status(ConnectionState::Idle, &store));
        assert_eq!(tracker.state(), ConnectionState::Synchronizing);
        assert!(tracker.just_completed().is_empty());

        if let Some((_, d)) = store.directory_mut("d0") {
            d.status = DirectoryStatus::Idle;
        }
        assert!(tracker.set_status(ConnectionState::Idle, &store));
        assert_eq!(tracker.just_completed(), ["d0".to_owned()]);

        assert!(!tracker.set_status(ConnectionState::Idle, &store));
        assert!(tracker.just_completed().is_empty());
    }

    #[test]
    fn pausing_discards_completion() {
        let mut store = store_with(&[DirectoryStatus::Synchronizing], true);
        let mut tracker = StatusTracker::new();
        tracker.set_status(ConnectionState::Idle, &store);

        if let Some((_, d)) = store.directory_mut("d0") {
            d.status = DirectoryStatus::Idle;
        }
        tracker.set_status(ConnectionState::Idle, &store);

        assert_eq!(tracker.state(), ConnectionState::Paused);
        assert!(tracker.just_completed().is_empty());
    }

    #[test]
    fn disconnect_clears_syncing_and_shutdown_is_terminal() {
        let store = store_with(&[DirectoryStatus::Synchronizing], false);
        let mut tracker = StatusTracker::new();
        tracker.set_status(ConnectionState::Idle, &store);

        assert!(tracker.set_status(ConnectionState::Disconnected, &store));
        assert_eq!(tracker.syncing().count(), 0);

        assert!(tracker.set_status(ConnectionState::ShuttingDown, &store));
        assert!(!tracker.set_status(ConnectionState::Idle, &store));
        assert_eq!(tracker.state(), ConnectionState::ShuttingDown);
    }
}
