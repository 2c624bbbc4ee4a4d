//! Snapshot building for network transmission

use crate::ws::protocol::{EntitySnapshot, ServerMsg};

use super::entity::{Entity, EntityId};
use super::world::World;

/// Authoritative snapshot of one entity, stamped with the send time
pub fn snapshot_of(entity: &Entity, server_ts: u64) -> EntitySnapshot {
    EntitySnapshot {
        id: entity.id,
        x: entity.position.x,
        y: entity.position.y,
        seq: entity.acked_seq(),
        ct: entity.latest_client_ts,
        st: server_ts,
    }
}

/// Messages a freshly connected viewer needs before any live update:
/// its own identity first, then one snapshot per pre-existing entity.
pub fn join_messages(world: &World, newcomer: &Entity, server_ts: u64) -> Vec<ServerMsg> {
    let mut msgs = Vec::with_capacity(world.len());
    msgs.push(ServerMsg::Connected {
        id: newcomer.id,
        x: newcomer.position.x,
        y: newcomer.position.y,
    });
    msgs.extend(catch_up(world, newcomer.id, server_ts));
    msgs
}

/// One snapshot for every entity except `except`
pub fn catch_up(world: &World, except: EntityId, server_ts: u64) -> impl Iterator<Item = ServerMsg> + '_ {
    world
        .iter()
        .filter(move |e| e.id != except)
        .map(move |e| ServerMsg::Snapshot(snapshot_of(e, server_ts)))
}
