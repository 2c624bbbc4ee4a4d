//! Reconciliation of predictions against authoritative snapshots

use tracing::debug;

use super::predictor::Predictor;
use crate::game::physics::{Obstacle, Position};
use crate::ws::protocol::EntitySnapshot;

/// How a mismatching prediction is corrected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Overwrite the local position with the authoritative one
    #[default]
    Snap,
    /// Overwrite, then re-apply every command the server has not processed yet.
    /// Avoids the visible pop of `Snap` but changes observable behavior.
    Replay,
}

/// Result of checking one authoritative snapshot of the local entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// Prediction for that sequence matched exactly
    Confirmed { seq: u64 },
    /// Local state was overwritten
    Corrected {
        seq: u64,
        /// What we had predicted for `seq`, if we still remember it
        predicted: Option<Position>,
        authoritative: Position,
        /// Local position after the correction
        now_at: Position,
    },
}

/// Compares authoritative snapshots of the local entity with prediction history
#[derive(Debug, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
    corrections: u64,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self {
            policy,
            corrections: 0,
        }
    }

    /// Number of corrections applied so far
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn reconcile(
        &mut self,
        predictor: &mut Predictor,
        snapshot: &EntitySnapshot,
        obstacles: &[Obstacle],
    ) -> Reconciliation {
        let authoritative = snapshot.position();
        let predicted = predictor
            .history()
            .find_by_seq(snapshot.seq)
            .map(|entry| entry.position);

        predictor.acknowledge(snapshot.seq);

        if predicted == Some(authoritative) {
            return Reconciliation::Confirmed { seq: snapshot.seq };
        }

        let now_at = match self.policy {
            ReconcilePolicy::Snap => {
                predictor.snap_to(authoritative);
                authoritative
            }
            ReconcilePolicy::Replay => predictor.replay_from(authoritative, obstacles),
        };
        self.corrections += 1;

        debug!(
            seq = snapshot.seq,
            predicted = ?predicted,
            server_x = authoritative.x,
            server_y = authoritative.y,
            policy = ?self.policy,
            "Prediction corrected"
        );

        Reconciliation::Corrected {
            seq: snapshot.seq,
            predicted,
            authoritative,
            now_at,
        }
    }
}
