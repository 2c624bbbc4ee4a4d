//! Client session tying input, prediction and interpolation together

use tracing::{debug, info};

use super::input::InputQueue;
use super::interpolator::Interpolator;
use super::predictor::Predictor;
use super::reconciler::{Reconciler, Reconciliation};
use super::ClientConfig;
use crate::game::command::DirectionSet;
use crate::game::entity::EntityId;
use crate::game::physics::{EntityParams, Position};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// What handling one server message did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { id: EntityId, spawn: Position },
    Reconciled(Reconciliation),
    RemoteUpdated { id: EntityId, accepted: bool },
    RemoteDeparted { id: EntityId },
    Pong { rtt_ms: u64, server_time: u64 },
    /// Message for the local entity before `connected`, or our own departure
    Ignored,
}

/// Everything an external renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    /// Predicted local position
    pub own: Option<Position>,
    /// Last authoritative position of the local entity
    pub server_ghost: Option<Position>,
    pub remotes: Vec<(EntityId, Position)>,
}

/// Client side of one connection.
///
/// Owns input capture, prediction, reconciliation and remote interpolation.
/// Driven from a single thread: the caller feeds it server messages as they
/// arrive and calls [`ClientSession::step`] and [`ClientSession::frame`] once
/// per rendered frame.
#[derive(Debug)]
pub struct ClientSession {
    config: ClientConfig,
    own_id: Option<EntityId>,
    input: InputQueue,
    predictor: Predictor,
    reconciler: Reconciler,
    interpolator: Interpolator,
    server_ghost: Option<Position>,
    last_prune: u64,
}

impl ClientSession {
    pub fn new(config: ClientConfig) -> Self {
        let params = EntityParams {
            speed: config.speed,
            radius: config.radius,
        };
        Self {
            own_id: None,
            input: InputQueue::new(),
            predictor: Predictor::new(params, config.bounds),
            reconciler: Reconciler::new(config.policy),
            interpolator: Interpolator::new(config.interpolation_delay_ms, config.radius),
            server_ghost: None,
            last_prune: 0,
            config,
        }
    }

    pub fn own_id(&self) -> Option<EntityId> {
        self.own_id
    }

    pub fn position(&self) -> Option<Position> {
        self.own_id.map(|_| self.predictor.position())
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn corrections(&self) -> u64 {
        self.reconciler.corrections()
    }

    /// Capture this frame's intent, predict it, and return the message to
    /// send. `None` while not connected or when nothing is held.
    ///
    /// Histories are pruned once per retention window whether or not
    /// anything was held.
    pub fn step(&mut self, keys: DirectionSet, frame_dt: f64, now_ms: u64) -> Option<ClientMsg> {
        let msg = match self.own_id {
            Some(_) => self.predict_frame(keys, frame_dt, now_ms),
            None => None,
        };
        self.maybe_prune(now_ms);
        msg
    }

    fn predict_frame(&mut self, keys: DirectionSet, frame_dt: f64, now_ms: u64) -> Option<ClientMsg> {
        let cmd = self.input.capture(keys, frame_dt, now_ms)?;
        let obstacles = self.interpolator.obstacles();
        self.predictor.predict(cmd, &obstacles);
        Some(ClientMsg::from_command(&cmd))
    }

    pub fn handle(&mut self, msg: ServerMsg, now_ms: u64) -> SessionEvent {
        match msg {
            ServerMsg::Connected { id, x, y } => {
                let spawn = Position::new(x, y);
                self.own_id = Some(id);
                self.predictor.reset(spawn);
                self.server_ghost = Some(spawn);
                self.last_prune = now_ms;
                info!(entity_id = %id, x, y, "Connected");
                SessionEvent::Connected { id, spawn }
            }
            ServerMsg::Snapshot(snapshot) => match self.own_id {
                Some(own) if own == snapshot.id => {
                    self.server_ghost = Some(snapshot.position());
                    let obstacles = self.interpolator.obstacles();
                    let outcome = self
                        .reconciler
                        .reconcile(&mut self.predictor, &snapshot, &obstacles);
                    SessionEvent::Reconciled(outcome)
                }
                Some(_) => {
                    let accepted = self.interpolator.ingest(&snapshot, now_ms);
                    SessionEvent::RemoteUpdated {
                        id: snapshot.id,
                        accepted,
                    }
                }
                None => {
                    debug!(entity_id = %snapshot.id, "Snapshot before connected");
                    SessionEvent::Ignored
                }
            },
            ServerMsg::Departed { id } => {
                if self.own_id == Some(id) {
                    return SessionEvent::Ignored;
                }
                self.interpolator.depart(id);
                debug!(entity_id = %id, "Remote departed");
                SessionEvent::RemoteDeparted { id }
            }
            ServerMsg::Pong { t, server_time } => SessionEvent::Pong {
                rtt_ms: now_ms.saturating_sub(t),
                server_time,
            },
        }
    }

    pub fn frame(&mut self, now_ms: u64) -> RenderFrame {
        self.maybe_prune(now_ms);
        RenderFrame {
            own: self.position(),
            server_ghost: self.server_ghost,
            remotes: self.interpolator.render(now_ms),
        }
    }

    pub fn ping(&self, now_ms: u64) -> ClientMsg {
        ClientMsg::Ping { t: now_ms }
    }

    /// Trim prediction and remote histories to the retention window
    pub fn prune(&mut self, now_ms: u64) -> usize {
        self.last_prune = now_ms;
        let window = self.config.retention_ms;
        self.predictor.prune(now_ms, window) + self.interpolator.prune(now_ms, window)
    }

    fn maybe_prune(&mut self, now_ms: u64) {
        if self.own_id.is_some() && now_ms.saturating_sub(self.last_prune) >= self.config.retention_ms {
            let removed = self.prune(now_ms);
            debug!(removed, "Pruned client histories");
        }
    }
}
