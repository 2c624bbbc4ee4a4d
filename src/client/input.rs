//! Per-frame input capture into sequenced commands

use crate::game::command::{DirectionSet, InputCommand};

/// Turns per-frame directional intent into sequence-numbered commands.
///
/// Frames with no net movement produce nothing and do not consume a
/// sequence number. Timestamps never go backwards even if the caller's
/// clock does.
#[derive(Debug, Default)]
pub struct InputQueue {
    next_seq: u64,
    last_ts: u64,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, keys: DirectionSet, frame_dt: f64, now_ms: u64) -> Option<InputCommand> {
        let keys = DirectionSet::from_held(keys.forward, keys.reverse, keys.left, keys.right);
        if keys.is_empty() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.last_ts = self.last_ts.max(now_ms);

        Some(InputCommand::new(seq, keys, frame_dt, self.last_ts))
    }

    /// Sequence the next emitted command will carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}
