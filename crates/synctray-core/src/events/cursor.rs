/// High-water mark of consumed event ids, sent as `since` on the next
/// long poll.
///
/// Only moves forward within a session; a (re)connect resets it to 0 so
/// the daemon replays its buffered events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCursor {
    last_id: u64,
}

impl EventCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(self) -> u64 {
        self.last_id
    }

    /// Advance to `id` if it is newer. Returns `true` if the cursor moved.
    pub fn advance(&mut self, id: u64) -> bool {
        if id > self.last_id {
            self.last_id = id;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward_until_reset() {
        let mut cursor = EventCursor::new();
        assert!(cursor.advance(7));
        assert!(!cursor.advance(3));
        assert_eq!(cursor.since(), 7);

        cursor.reset();
        assert_eq!(cursor.since(), 0);
    }
}
