//! Connection registry and snapshot fan-out

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::entity::{CommandInbox, EntityId};
use super::physics::Position;
use super::snapshot::{join_messages, snapshot_of};
use super::world::{TickOutcome, World, WorldConfig};
use crate::util::time::unix_millis;
use crate::ws::protocol::ServerMsg;

/// Outbound queue of one viewer
pub type Outbound = mpsc::Sender<ServerMsg>;

/// What a connection handler gets back from [`Registry::connect`]
#[derive(Debug, Clone)]
pub struct ConnectTicket {
    pub id: EntityId,
    pub spawn: Position,
    /// Where this connection's input commands go
    pub inbox: Arc<CommandInbox>,
}

/// Fan-out counters
#[derive(Debug, Default)]
pub struct BroadcastStats {
    sent: AtomicU64,
    dropped: AtomicU64,
    evicted: AtomicU64,
}

impl BroadcastStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Live snapshots or pongs skipped because a queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Viewers cut off because a message they must not miss did not fit
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

/// Result of one non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Full,
    Closed,
}

/// Identity → entity for every live connection.
///
/// Entity state sits behind one world lock. Connect, disconnect and each
/// tick's broadcast all hold it, so a newcomer's catch-up snapshots always
/// reach it before any live snapshot. The outbound senders live in a
/// `DashMap` so counting and iterating viewers never waits on the world.
///
/// Live snapshots may be dropped on a full queue since the next one
/// supersedes them. The greeting, catch-up, spawn announcements and
/// departures may not: a viewer whose queue cannot take one of those is
/// evicted. Dropping its sender closes the socket writer, and the
/// connection handler then disconnects it like any other viewer.
pub struct Registry {
    world: Mutex<World>,
    connections: DashMap<EntityId, Outbound>,
    stats: BroadcastStats,
}

impl Registry {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            world: Mutex::new(World::new(config)),
            connections: DashMap::new(),
            stats: BroadcastStats::default(),
        }
    }

    /// Register a new viewer: spawn its entity, greet it, catch it up on
    /// every existing entity and announce it to everyone else.
    pub fn connect(&self, outbound: Outbound) -> ConnectTicket {
        let mut world = self.world.lock();
        let now = unix_millis();

        let (id, spawn, inbox) = world.spawn(now);

        let mut greeted = true;
        if let Some(newcomer) = world.get(&id) {
            for msg in join_messages(&world, newcomer, now) {
                if self.deliver(id, &outbound, msg) != Delivery::Sent {
                    greeted = false;
                    break;
                }
            }
            let announce = ServerMsg::Snapshot(snapshot_of(newcomer, now));
            self.broadcast_reliable(&announce);
        }

        if greeted {
            self.connections.insert(id, outbound);
            info!(entity_id = %id, connections = self.connections.len(), "Viewer connected");
        } else {
            self.stats.evicted.fetch_add(1, Ordering::Relaxed);
            warn!(entity_id = %id, "Outbound queue too small for catch-up, closing viewer");
        }
        drop(world);

        ConnectTicket { id, spawn, inbox }
    }

    /// Drop a viewer and its entity, then tell everyone it left.
    /// Returns `false` if the identity was already gone.
    pub fn disconnect(&self, id: EntityId) -> bool {
        let mut world = self.world.lock();
        let removed = world.remove(&id).is_some();
        self.connections.remove(&id);

        if removed {
            self.broadcast_reliable(&ServerMsg::Departed { id });
            info!(entity_id = %id, connections = self.connections.len(), "Viewer disconnected");
        }
        removed
    }

    /// Run `step` against the world and broadcast every resulting update
    /// before anyone else can touch the world.
    pub fn advance<F>(&self, step: F) -> TickOutcome
    where
        F: FnOnce(&mut World) -> TickOutcome,
    {
        let mut world = self.world.lock();
        let outcome = step(&mut world);
        for update in &outcome.updates {
            self.broadcast(&ServerMsg::Snapshot(*update));
        }
        outcome
    }

    /// Send directly to one viewer (e.g. a pong)
    pub fn send_to(&self, id: EntityId, msg: ServerMsg) -> bool {
        match self.connections.get(&id) {
            Some(outbound) => self.deliver(id, outbound.value(), msg) == Delivery::Sent,
            None => false,
        }
    }

    /// Trim server-side histories to the retention window
    pub fn prune_histories(&self, now_ms: u64, window_ms: u64) -> usize {
        self.world.lock().prune_histories(now_ms, window_ms)
    }

    /// Read-only access to the world
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.world.lock())
    }

    pub fn entity_count(&self) -> usize {
        self.world.lock().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Best-effort fan-out; a full queue skips this message only
    fn broadcast(&self, msg: &ServerMsg) {
        for entry in self.connections.iter() {
            self.deliver(*entry.key(), entry.value(), msg.clone());
        }
    }

    /// Fan-out that every viewer must receive; evicts those that cannot
    fn broadcast_reliable(&self, msg: &ServerMsg) {
        let failed: Vec<EntityId> = self
            .connections
            .iter()
            .filter(|entry| self.deliver(*entry.key(), entry.value(), msg.clone()) != Delivery::Sent)
            .map(|entry| *entry.key())
            .collect();

        for id in failed {
            self.evict(id);
        }
    }

    fn evict(&self, id: EntityId) {
        if self.connections.remove(&id).is_some() {
            self.stats.evicted.fetch_add(1, Ordering::Relaxed);
            warn!(entity_id = %id, "Viewer missed a required message, closing it");
        }
    }

    fn deliver(&self, id: EntityId, outbound: &Outbound, msg: ServerMsg) -> Delivery {
        match outbound.try_send(msg) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(entity_id = %id, "Outbound queue full, dropping message");
                Delivery::Full
            }
            Err(TrySendError::Closed(_)) => {
                debug!(entity_id = %id, "Outbound queue closed");
                Delivery::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::command::{DirectionSet, InputCommand};

    fn registry() -> Registry {
        Registry::new(WorldConfig::default())
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn snapshot_ids(msgs: &[ServerMsg]) -> Vec<EntityId> {
        msgs.iter()
            .filter_map(|m| match m {
                ServerMsg::Snapshot(s) => Some(s.id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_connect_greets_newcomer_with_own_spawn() {
        let reg = registry();
        let (tx, mut rx) = mpsc::channel(16);
        let ticket = reg.connect(tx);

        let msgs = drain(&mut rx);
        assert_eq!(
            msgs,
            vec![ServerMsg::Connected {
                id: ticket.id,
                x: ticket.spawn.x,
                y: ticket.spawn.y
            }]
        );
        assert_eq!(reg.entity_count(), 1);
        assert_eq!(reg.connection_count(), 1);
    }

    #[test]
    fn test_late_joiner_gets_exactly_one_snapshot_per_existing_entity() {
        let reg = registry();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let a = reg.connect(tx_a);
        let b = reg.connect(tx_b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let (tx_c, mut rx_c) = mpsc::channel(16);
        let c = reg.connect(tx_c);

        // A moves after C joined; C must see the catch-up first.
        a.inbox.push(InputCommand::new(0, DirectionSet::from_held(true, false, false, false), 0.1, 1));
        reg.advance(|w| w.step(unix_millis()));

        let msgs = drain(&mut rx_c);
        assert!(matches!(msgs[0], ServerMsg::Connected { id, .. } if id == c.id));

        let catch_up = snapshot_ids(&msgs[1..3]);
        assert_eq!(catch_up.len(), 2);
        assert!(catch_up.contains(&a.id) && catch_up.contains(&b.id));

        let live = snapshot_ids(&msgs[3..]);
        assert_eq!(live, vec![a.id]);

        // Existing viewers heard about C exactly once.
        assert_eq!(snapshot_ids(&drain(&mut rx_b)), vec![c.id, a.id]);
    }

    #[test]
    fn test_disconnect_broadcasts_departure_to_others() {
        let reg = registry();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let a = reg.connect(tx_a);
        reg.connect(tx_b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert!(reg.disconnect(a.id));
        assert!(!reg.disconnect(a.id));

        assert_eq!(drain(&mut rx_b), vec![ServerMsg::Departed { id: a.id }]);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(reg.entity_count(), 1);
    }

    #[test]
    fn test_full_outbound_drops_live_snapshot_without_blocking() {
        let reg = registry();
        let (tx_a, mut rx_a) = mpsc::channel(2);
        let a = reg.connect(tx_a);
        let (tx_b, _rx_b) = mpsc::channel(16);
        reg.connect(tx_b);

        // A's queue holds its greeting and B's spawn; A's own move does not fit.
        a.inbox.push(InputCommand::new(0, DirectionSet::from_held(true, false, false, false), 0.1, 1));
        reg.advance(|w| w.step(unix_millis()));

        assert_eq!(reg.stats().dropped(), 1);
        assert_eq!(reg.stats().evicted(), 0);
        assert_eq!(reg.connection_count(), 2);
        assert_eq!(drain(&mut rx_a).len(), 2);
    }

    #[test]
    fn test_viewer_that_cannot_take_departure_is_evicted() {
        let reg = registry();
        let (tx_a, mut rx_a) = mpsc::channel(2);
        let a = reg.connect(tx_a);
        let (tx_b, _rx_b) = mpsc::channel(16);
        let b = reg.connect(tx_b);

        // A's queue is full with its greeting and B's spawn.
        assert!(reg.disconnect(b.id));
        assert_eq!(reg.stats().evicted(), 1);
        assert_eq!(reg.connection_count(), 0);

        // A gets what was queued, then its queue reports closed instead of
        // leaving B tracked forever.
        assert_eq!(drain(&mut rx_a).len(), 2);
        assert!(matches!(rx_a.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));

        // The handler's disconnect then removes A's entity too.
        assert!(reg.disconnect(a.id));
        assert_eq!(reg.entity_count(), 0);
    }

    #[test]
    fn test_newcomer_without_room_for_catch_up_is_not_registered() {
        let reg = registry();
        let (tx_a, _rx_a) = mpsc::channel(16);
        let (tx_b, _rx_b) = mpsc::channel(16);
        reg.connect(tx_a);
        reg.connect(tx_b);

        // Connected plus two catch-up snapshots cannot fit in two slots.
        let (tx_c, mut rx_c) = mpsc::channel(2);
        let c = reg.connect(tx_c);

        assert_eq!(reg.connection_count(), 2);
        assert_eq!(reg.stats().evicted(), 1);
        assert_eq!(drain(&mut rx_c).len(), 2);
        assert!(matches!(rx_c.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));

        assert!(reg.disconnect(c.id));
        assert_eq!(reg.entity_count(), 2);
    }

    #[test]
    fn test_send_to_unknown_viewer() {
        let reg = registry();
        assert!(!reg.send_to(EntityId::new_random(), ServerMsg::Pong { t: 1, server_time: 2 }));
    }
}
