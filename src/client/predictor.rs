//! Local prediction of the controlled entity

use std::collections::VecDeque;

use tracing::debug;

use crate::game::command::InputCommand;
use crate::game::history::{History, Stamped};
use crate::game::physics::{EntityParams, Obstacle, PhysicsSystem, Position, WorldBounds};
use crate::util::time::retention_cutoff;

/// Locally predicted position after applying one command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPosition {
    pub seq: u64,
    pub position: Position,
    pub client_ts: u64,
}

impl Stamped for PredictedPosition {
    fn sequence(&self) -> u64 {
        self.seq
    }

    fn timestamp(&self) -> u64 {
        self.client_ts
    }
}

/// Client-side prediction for the locally controlled entity.
///
/// Runs the same integration as the server against the rendered positions of
/// remote entities, and records one history entry per command so an
/// authoritative snapshot can later be matched by sequence.
#[derive(Debug)]
pub struct Predictor {
    position: Position,
    params: EntityParams,
    bounds: WorldBounds,
    history: History<PredictedPosition>,
    /// Sent but not yet acknowledged, oldest first
    unacked: VecDeque<InputCommand>,
}

impl Predictor {
    pub fn new(params: EntityParams, bounds: WorldBounds) -> Self {
        Self {
            position: Position::default(),
            params,
            bounds,
            history: History::new(),
            unacked: VecDeque::new(),
        }
    }

    /// Start over at a spawn point
    pub fn reset(&mut self, spawn: Position) {
        self.position = spawn;
        self.history.clear();
        self.unacked.clear();
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn history(&self) -> &History<PredictedPosition> {
        &self.history
    }

    pub fn unacked(&self) -> impl Iterator<Item = &InputCommand> {
        self.unacked.iter()
    }

    /// Apply `cmd` immediately and record the result under its sequence
    pub fn predict(&mut self, cmd: InputCommand, obstacles: &[Obstacle]) -> Position {
        let out = PhysicsSystem::step(
            self.position,
            cmd.keys,
            cmd.dt,
            &self.params,
            obstacles,
            &self.bounds,
        );
        self.position = out.position;

        let recorded = self.history.push(PredictedPosition {
            seq: cmd.seq,
            position: out.position,
            client_ts: cmd.client_ts,
        });
        if !recorded {
            debug!(seq = cmd.seq, "Prediction not recorded, history order violated");
        }

        self.unacked.push_back(cmd);
        out.position
    }

    /// Forget commands the server has processed
    pub fn acknowledge(&mut self, seq: u64) {
        while self.unacked.front().is_some_and(|c| c.seq <= seq) {
            self.unacked.pop_front();
        }
    }

    /// Overwrite the local position, keeping history untouched
    pub fn snap_to(&mut self, authoritative: Position) {
        self.position = authoritative;
    }

    /// Overwrite the local position, then re-apply every unacknowledged
    /// command on top of it, rewriting their history entries.
    pub fn replay_from(&mut self, authoritative: Position, obstacles: &[Obstacle]) -> Position {
        let mut position = authoritative;
        for cmd in &self.unacked {
            position = PhysicsSystem::step(
                position,
                cmd.keys,
                cmd.dt,
                &self.params,
                obstacles,
                &self.bounds,
            )
            .position;
            if let Some(entry) = self.history.find_by_seq_mut(cmd.seq) {
                entry.position = position;
            }
        }
        self.position = position;
        position
    }

    /// Drop history and unacknowledged commands older than the window
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) -> usize {
        let cutoff = retention_cutoff(now_ms, window_ms);
        let before = self.unacked.len();
        self.unacked.retain(|c| c.client_ts >= cutoff);
        let dropped_unacked = before - self.unacked.len();
        if dropped_unacked > 0 {
            debug!(dropped_unacked, "Discarded stale unacknowledged commands");
        }

        self.history.prune(now_ms, window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::command::DirectionSet;

    fn forward(seq: u64, ts: u64) -> InputCommand {
        InputCommand::new(seq, DirectionSet::from_held(true, false, false, false), 0.1, ts)
    }

    fn predictor() -> Predictor {
        Predictor::new(EntityParams::default(), WorldBounds::default())
    }

    #[test]
    fn test_every_command_gets_one_history_entry() {
        let mut p = predictor();
        for seq in 0..5 {
            p.predict(forward(seq, 100 + seq), &[]);
        }

        assert_eq!(p.history().len(), 5);
        for seq in 0..5 {
            let entry = p.history().find_by_seq(seq).unwrap();
            assert_eq!(entry.position.y, crate::game::physics::round_to_precision(0.5 * (seq + 1) as f64));
        }
        assert_eq!(p.position(), Position::new(0.0, 2.5));
    }

    #[test]
    fn test_prediction_mirrors_collision_against_obstacles() {
        let mut p = predictor();
        let blocker = Obstacle {
            position: Position::new(0.0, 1.2),
            radius: 0.5,
        };
        p.predict(forward(0, 1), &[blocker]);
        assert_eq!(p.position(), Position::new(0.0, 0.0));
        assert_eq!(p.history().find_by_seq(0).map(|e| e.position), Some(Position::default()));
    }

    #[test]
    fn test_acknowledge_drops_processed_commands() {
        let mut p = predictor();
        for seq in 0..4 {
            p.predict(forward(seq, seq), &[]);
        }
        p.acknowledge(1);
        let left: Vec<u64> = p.unacked().map(|c| c.seq).collect();
        assert_eq!(left, vec![2, 3]);
    }

    #[test]
    fn test_replay_reapplies_unacked_commands() {
        let mut p = predictor();
        for seq in 0..3 {
            p.predict(forward(seq, seq), &[]);
        }
        p.acknowledge(0);

        // Server put seq 0 at x = 1 instead of x = 0.
        let end = p.replay_from(Position::new(1.0, 0.5), &[]);
        assert_eq!(end, Position::new(1.0, 1.5));
        assert_eq!(p.history().find_by_seq(1).map(|e| e.position), Some(Position::new(1.0, 1.0)));
        assert_eq!(p.history().find_by_seq(2).map(|e| e.position), Some(Position::new(1.0, 1.5)));
    }

    #[test]
    fn test_prune_keeps_latest_prediction() {
        let mut p = predictor();
        for seq in 0..3 {
            p.predict(forward(seq, 1_000 + seq), &[]);
        }
        assert_eq!(p.prune(100_000, 5_000), 2);
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.unacked().count(), 0);
    }
}
