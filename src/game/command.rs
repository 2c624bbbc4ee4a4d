//! Input commands and directional intent

use serde::{Deserialize, Serialize};

/// Lower bound for a command's integration step (seconds)
pub const MIN_DELTA_SECS: f64 = 0.01;
/// Upper bound for a command's integration step (seconds)
pub const MAX_DELTA_SECS: f64 = 0.25;

/// A single movement key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
    Left,
    Right,
}

/// Set of held directions after opposing keys have cancelled out.
///
/// On the wire this is a plain list, e.g. `["forward", "left"]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Direction>", into = "Vec<Direction>")]
pub struct DirectionSet {
    pub forward: bool,
    pub reverse: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionSet {
    /// Build from raw held-key state, cancelling forward+reverse and left+right.
    pub fn from_held(forward: bool, reverse: bool, left: bool, right: bool) -> Self {
        Self {
            forward: forward && !reverse,
            reverse: reverse && !forward,
            left: left && !right,
            right: right && !left,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.forward || self.reverse || self.left || self.right)
    }

    /// Unit direction: forward `+y`, reverse `-y`, left `+x`, right `-x`.
    ///
    /// Opposing flags that slipped through cancel to zero on their axis.
    pub fn axes(&self) -> (f64, f64) {
        let mut x = 0.0;
        let mut y = 0.0;
        if self.forward {
            y += 1.0;
        }
        if self.reverse {
            y -= 1.0;
        }
        if self.left {
            x += 1.0;
        }
        if self.right {
            x -= 1.0;
        }
        (x, y)
    }
}

impl From<Vec<Direction>> for DirectionSet {
    fn from(keys: Vec<Direction>) -> Self {
        let mut set = DirectionSet::default();
        for key in keys {
            match key {
                Direction::Forward => set.forward = true,
                Direction::Reverse => set.reverse = true,
                Direction::Left => set.left = true,
                Direction::Right => set.right = true,
            }
        }
        DirectionSet::from_held(set.forward, set.reverse, set.left, set.right)
    }
}

impl From<DirectionSet> for Vec<Direction> {
    fn from(set: DirectionSet) -> Self {
        let mut keys = Vec::with_capacity(4);
        if set.forward {
            keys.push(Direction::Forward);
        }
        if set.reverse {
            keys.push(Direction::Reverse);
        }
        if set.left {
            keys.push(Direction::Left);
        }
        if set.right {
            keys.push(Direction::Right);
        }
        keys
    }
}

/// Clamp a frame delta into the accepted integration range.
///
/// Non-finite values collapse to the minimum so the simulation keeps advancing.
pub fn clamp_delta(dt: f64) -> f64 {
    if dt.is_finite() {
        dt.clamp(MIN_DELTA_SECS, MAX_DELTA_SECS)
    } else {
        MIN_DELTA_SECS
    }
}

/// One step of directional intent, immutable once built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputCommand {
    pub seq: u64,
    pub keys: DirectionSet,
    /// Integration step in seconds, always within `[MIN_DELTA_SECS, MAX_DELTA_SECS]`
    pub dt: f64,
    /// Client timestamp (unix ms)
    pub client_ts: u64,
}

impl InputCommand {
    pub fn new(seq: u64, keys: DirectionSet, dt: f64, client_ts: u64) -> Self {
        Self {
            seq,
            keys,
            dt: clamp_delta(dt),
            client_ts,
        }
    }
}
