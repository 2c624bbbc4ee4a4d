//! Delayed interpolation of remote entities

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::game::entity::EntityId;
use crate::game::history::{History, Stamped};
use crate::game::physics::{Obstacle, Position};
use crate::ws::protocol::EntitySnapshot;

/// Default render delay behind wall-clock time (ms)
pub const DEFAULT_INTERPOLATION_DELAY_MS: u64 = 100;

/// One received snapshot of a remote entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteSample {
    pub seq: u64,
    pub position: Position,
    /// Local receipt time (unix ms); samples are ordered and pruned by it
    pub received_at: u64,
    pub server_ts: u64,
}

impl Stamped for RemoteSample {
    fn sequence(&self) -> u64 {
        self.seq
    }

    fn timestamp(&self) -> u64 {
        self.received_at
    }
}

/// Lifecycle of a remote identity on this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Unknown,
    Tracked,
    Removed,
}

#[derive(Debug)]
struct RemoteEntity {
    history: History<RemoteSample>,
    /// Position shown on the last rendered frame
    rendered: Position,
}

/// Buffers remote snapshots and renders them a fixed delay in the past
#[derive(Debug)]
pub struct Interpolator {
    delay_ms: u64,
    radius: f64,
    remotes: HashMap<EntityId, RemoteEntity>,
    departed: HashSet<EntityId>,
}

impl Interpolator {
    pub fn new(delay_ms: u64, radius: f64) -> Self {
        Self {
            delay_ms,
            radius,
            remotes: HashMap::new(),
            departed: HashSet::new(),
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }

    pub fn state(&self, id: &EntityId) -> RemoteState {
        if self.remotes.contains_key(id) {
            RemoteState::Tracked
        } else if self.departed.contains(id) {
            RemoteState::Removed
        } else {
            RemoteState::Unknown
        }
    }

    /// Record a snapshot; starts tracking unknown identities.
    /// Returns `false` when the snapshot was ignored.
    pub fn ingest(&mut self, snapshot: &EntitySnapshot, received_at: u64) -> bool {
        if self.departed.contains(&snapshot.id) {
            debug!(entity_id = %snapshot.id, "Snapshot for departed entity ignored");
            return false;
        }

        let sample = RemoteSample {
            seq: snapshot.seq,
            position: snapshot.position(),
            received_at,
            server_ts: snapshot.st,
        };

        let remote = self.remotes.entry(snapshot.id).or_insert_with(|| {
            debug!(entity_id = %snapshot.id, "Tracking remote entity");
            RemoteEntity {
                history: History::new(),
                rendered: sample.position,
            }
        });
        remote.history.push(sample)
    }

    /// Stop tracking an identity for good
    pub fn depart(&mut self, id: EntityId) -> bool {
        self.departed.insert(id);
        self.remotes.remove(&id).is_some()
    }

    /// Position of `id` at `render_time`: lerp between the bracketing pair,
    /// else the most recent sample.
    pub fn sample(&self, id: &EntityId, render_time: u64) -> Option<Position> {
        let history = &self.remotes.get(id)?.history;
        interpolate(history, render_time)
    }

    /// Render every remote at `now - delay` and remember the result
    pub fn render(&mut self, now_ms: u64) -> Vec<(EntityId, Position)> {
        let render_time = now_ms.saturating_sub(self.delay_ms);
        let mut frame = Vec::with_capacity(self.remotes.len());

        for (id, remote) in self.remotes.iter_mut() {
            if let Some(position) = interpolate(&remote.history, render_time) {
                remote.rendered = position;
            }
            frame.push((*id, remote.rendered));
        }

        frame
    }

    /// Rendered remote bodies, for local collision prediction
    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.remotes
            .values()
            .map(|r| Obstacle {
                position: r.rendered,
                radius: self.radius,
            })
            .collect()
    }

    pub fn prune(&mut self, now_ms: u64, window_ms: u64) -> usize {
        self.remotes
            .values_mut()
            .map(|r| r.history.prune(now_ms, window_ms))
            .sum()
    }
}

fn interpolate(history: &History<RemoteSample>, render_time: u64) -> Option<Position> {
    if let Some((prev, next)) = history.bracketing(render_time) {
        let span = (next.received_at - prev.received_at) as f64;
        let t = (render_time - prev.received_at) as f64 / span;
        return Some(prev.position.lerp(next.position, t).rounded());
    }
    history.latest().map(|s| s.position)
}
