//! Client side: prediction, reconciliation and remote interpolation

pub mod input;
pub mod interpolator;
pub mod predictor;
pub mod reconciler;
pub mod session;

pub use input::InputQueue;
pub use interpolator::{Interpolator, RemoteState};
pub use predictor::Predictor;
pub use reconciler::{ReconcilePolicy, Reconciler, Reconciliation};
pub use session::{ClientSession, RenderFrame, SessionEvent};

use crate::game::history::DEFAULT_RETENTION_MS;
use crate::game::physics::{WorldBounds, DEFAULT_RADIUS, DEFAULT_SPEED};
use interpolator::DEFAULT_INTERPOLATION_DELAY_MS;

/// Client tuning. Movement parameters must match the server's.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub speed: f64,
    pub radius: f64,
    pub bounds: WorldBounds,
    pub interpolation_delay_ms: u64,
    pub retention_ms: u64,
    pub policy: ReconcilePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            radius: DEFAULT_RADIUS,
            bounds: WorldBounds::default(),
            interpolation_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            retention_ms: DEFAULT_RETENTION_MS,
            policy: ReconcilePolicy::default(),
        }
    }
}
