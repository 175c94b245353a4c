// ── Aggregate connection state ──

use serde::Serialize;

/// Connection-wide state observable by consumers.
///
/// `Disconnected` and `Reconnecting` are set by the engine from transport
/// outcomes; every other value is derived from directory and device
/// statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum::Display)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Reconnecting,
    Idle,
    Scanning,
    Synchronizing,
    Paused,
    /// Terminal. Entered when the engine is closed.
    ShuttingDown,
}

impl ConnectionState {
    /// Whether the event loop is live.
    pub fn is_connected(self) -> bool {
        !matches!(
            self,
            Self::Disconnected | Self::Reconnecting | Self::ShuttingDown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_states() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(!ConnectionState::ShuttingDown.is_connected());
        assert!(ConnectionState::Idle.is_connected());
        assert!(ConnectionState::Paused.is_connected());
    }
}
