// ── Auto-reconnect policy ──
//
// One coarse single-shot timer plus a try counter. The engine arms the
// timer after a connection-level failure and calls `connect()` when it
// fires. A zero interval disables auto-reconnect entirely.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    interval: Duration,
    tries: u32,
    deadline: Option<Instant>,
}

/// Details of an armed reconnect, as announced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReconnect {
    pub delay: Duration,
    /// 1-based number of the upcoming attempt.
    pub attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the interval. An armed timer keeps its deadline unless the
    /// new interval disables reconnecting.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        if interval.is_zero() {
            self.deadline = None;
        }
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn reset_tries(&mut self) {
        self.tries = 0;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Start the timer. Returns `None` when auto-reconnect is disabled.
    pub fn arm(&mut self) -> Option<ScheduledReconnect> {
        if self.interval.is_zero() {
            return None;
        }
        self.deadline = Some(Instant::now() + self.interval);
        Some(ScheduledReconnect {
            delay: self.interval,
            attempt: self.tries.saturating_add(1),
        })
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Consume the timer if it is due. Returns the try count to restore
    /// after the reconnect attempt has been started.
    pub fn take_due(&mut self, now: Instant) -> Option<u32> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(self.tries)
            }
            _ => None,
        }
    }

    /// Count one attempt on top of the tries recorded before it started.
    /// Starting an attempt goes through `connect()`, which resets tries.
    pub fn record_attempt(&mut self, tries_before: u32) {
        self.tries = tries_before.saturating_add(1);
    }
}
