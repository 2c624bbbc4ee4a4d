//! Authoritative entity record and its pending-command inbox

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::command::InputCommand;
use super::history::{History, PositionSnapshot};
use super::physics::{EntityParams, Obstacle, Position};

/// Opaque identity assigned on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Commands written by a connection handler and drained by the tick.
#[derive(Debug, Default)]
pub struct CommandInbox {
    pending: Mutex<Vec<InputCommand>>,
}

impl CommandInbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, cmd: InputCommand) {
        self.pending.lock().push(cmd);
    }

    /// Take everything received so far, leaving the inbox empty.
    pub fn drain(&self) -> Vec<InputCommand> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Server-side entity state (authoritative)
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub position: Position,
    pub params: EntityParams,

    // Input tracking
    /// Highest sequence applied so far, `None` before the first command
    pub latest_seq: Option<u64>,
    pub latest_client_ts: u64,
    pub inbox: Arc<CommandInbox>,

    pub history: History<PositionSnapshot>,
}

impl Entity {
    pub fn new(id: EntityId, spawn: Position, params: EntityParams, now_ms: u64) -> Self {
        let mut history = History::new();
        history.push(PositionSnapshot {
            seq: 0,
            position: spawn,
            client_ts: 0,
            server_ts: now_ms,
        });

        Self {
            id,
            position: spawn,
            params,
            latest_seq: None,
            latest_client_ts: 0,
            inbox: CommandInbox::new(),
            history,
        }
    }

    /// Sequence reported in snapshots
    pub fn acked_seq(&self) -> u64 {
        self.latest_seq.unwrap_or(0)
    }

    /// Whether a command with `seq` has not been applied yet
    pub fn accepts(&self, seq: u64) -> bool {
        self.latest_seq.map_or(true, |latest| seq > latest)
    }

    /// Commit a processed command's result and append it to history.
    pub fn commit(&mut self, cmd: &InputCommand, position: Position, server_ts: u64) {
        self.position = position;
        self.latest_seq = Some(cmd.seq);
        self.latest_client_ts = cmd.client_ts;

        let server_ts = self
            .history
            .latest()
            .map_or(server_ts, |last| server_ts.max(last.server_ts));
        self.history.push(PositionSnapshot {
            seq: cmd.seq,
            position,
            client_ts: cmd.client_ts,
            server_ts,
        });
    }

    pub fn as_obstacle(&self) -> Obstacle {
        Obstacle {
            position: self.position,
            radius: self.params.radius,
        }
    }
}
