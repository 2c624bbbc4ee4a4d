//! Time-ordered position histories with retention pruning

use std::collections::VecDeque;

use tracing::debug;

use super::physics::Position;
use crate::util::time::retention_cutoff;

/// Default retention window for every history (ms)
pub const DEFAULT_RETENTION_MS: u64 = 5_000;

/// An entry that can live in a [`History`]
pub trait Stamped {
    /// Input sequence the entry belongs to
    fn sequence(&self) -> u64;
    /// Timestamp (unix ms) the history is ordered and pruned by
    fn timestamp(&self) -> u64;
}

/// Authoritative position record kept by the server per entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSnapshot {
    /// Input sequence that produced this position, 0 for the spawn record
    pub seq: u64,
    pub position: Position,
    pub client_ts: u64,
    pub server_ts: u64,
}

impl Stamped for PositionSnapshot {
    fn sequence(&self) -> u64 {
        self.seq
    }

    fn timestamp(&self) -> u64 {
        self.server_ts
    }
}

/// Append-only history, non-decreasing in both sequence and timestamp.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T: Stamped> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Refuses (and returns `false`) anything that would
    /// move sequence or timestamp backwards.
    pub fn push(&mut self, entry: T) -> bool {
        if let Some(last) = self.entries.back() {
            if entry.sequence() < last.sequence() || entry.timestamp() < last.timestamp() {
                debug!(
                    seq = entry.sequence(),
                    ts = entry.timestamp(),
                    last_seq = last.sequence(),
                    last_ts = last.timestamp(),
                    "Refusing out-of-order history entry"
                );
                return false;
            }
        }
        self.entries.push_back(entry);
        true
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn find_by_seq(&self, seq: u64) -> Option<&T> {
        self.entries.iter().find(|e| e.sequence() == seq)
    }

    pub fn find_by_seq_mut(&mut self, seq: u64) -> Option<&mut T> {
        self.entries.iter_mut().find(|e| e.sequence() == seq)
    }

    /// First adjacent pair with `prev.ts < t < next.ts`
    pub fn bracketing(&self, t: u64) -> Option<(&T, &T)> {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .find(|(prev, next)| prev.timestamp() < t && t < next.timestamp())
    }

    /// Drop every entry older than `window_ms` before `now_ms`, keeping the
    /// most recent entry even when it is stale. Returns how many were removed.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) -> usize {
        if self.entries.len() <= 1 {
            return 0;
        }

        let cutoff = retention_cutoff(now_ms, window_ms);
        let keep_from = self
            .entries
            .iter()
            .position(|e| e.timestamp() >= cutoff)
            .unwrap_or(self.entries.len() - 1);

        self.entries.drain(..keep_from);
        keep_from
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
