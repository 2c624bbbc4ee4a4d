//! Authoritative world state and the per-tick command pass

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::command::InputCommand;
use super::entity::{CommandInbox, Entity, EntityId};
use super::physics::{EntityParams, Obstacle, PhysicsSystem, Position, WorldBounds};
use super::snapshot::snapshot_of;
use crate::ws::protocol::EntitySnapshot;

/// Draws attempted before accepting an overlapping spawn point
const SPAWN_ATTEMPTS: usize = 8;

/// Default half extent of the spawn sub-region
pub const DEFAULT_SPAWN_RANGE: i32 = 10;

/// World configuration
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub bounds: WorldBounds,
    /// Speed and radius given to every new entity
    pub params: EntityParams,
    /// Spawns land on integer points in `[-spawn_range, spawn_range]`
    pub spawn_range: i32,
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::default(),
            params: EntityParams::default(),
            spawn_range: DEFAULT_SPAWN_RANGE,
            seed: 0,
        }
    }
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// One snapshot per entity that applied at least one new command
    pub updates: Vec<EntitySnapshot>,
    /// Commands applied this tick
    pub applied: usize,
    /// Commands dropped as already applied or stale
    pub stale: usize,
    /// New commands with no net movement, skipped without acknowledging
    pub idle: usize,
}

/// World state (owned behind the registry lock)
pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    config: WorldConfig,
    rng: ChaCha8Rng,
    tick: u64,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            entities: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            tick: 0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Total entries across every entity's history
    pub fn history_entries(&self) -> usize {
        self.entities.values().map(|e| e.history.len()).sum()
    }

    /// Pick a spawn point, preferring one that overlaps nobody
    pub fn generate_spawn_position(&mut self) -> Position {
        let range = self.config.spawn_range.max(0);
        let radius = self.config.params.radius;
        let mut candidate = Position::default();

        for _ in 0..SPAWN_ATTEMPTS {
            candidate = Position::new(
                self.rng.gen_range(-range..=range) as f64,
                self.rng.gen_range(-range..=range) as f64,
            );
            let free = !self.entities.values().any(|e| {
                PhysicsSystem::circles_collide(candidate, radius, e.position, e.params.radius)
            });
            if free {
                break;
            }
        }

        self.config.bounds.clamp(candidate)
    }

    /// Spawn a new entity with a fresh identity at a random point
    pub fn spawn(&mut self, now_ms: u64) -> (EntityId, Position, Arc<CommandInbox>) {
        let id = EntityId::new_random();
        let position = self.generate_spawn_position();
        self.spawn_at(id, position, now_ms)
    }

    /// Spawn with an explicit identity and position
    pub fn spawn_at(
        &mut self,
        id: EntityId,
        position: Position,
        now_ms: u64,
    ) -> (EntityId, Position, Arc<CommandInbox>) {
        let position = self.config.bounds.clamp(position);
        let entity = Entity::new(id, position, self.config.params, now_ms);
        let inbox = entity.inbox.clone();
        self.entities.insert(id, entity);

        info!(entity_id = %id, x = position.x, y = position.y, entities = self.entities.len(), "Entity spawned");
        (id, position, inbox)
    }

    /// Remove an entity; anything still in its inbox is discarded with it
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        let removed = self.entities.remove(id);
        if let Some(entity) = &removed {
            let discarded = entity.inbox.len();
            info!(entity_id = %id, discarded, entities = self.entities.len(), "Entity removed");
        }
        removed
    }

    /// Run one simulation tick.
    ///
    /// Every entity drains its inbox in arrival order. A command is applied
    /// only if its sequence is above the entity's latest processed one, and
    /// "latest" moves after every applied command, so `[0, 2, 1]` applies 0
    /// and 2 and drops 1. A command whose keys cancel out is skipped and
    /// does not move "latest". Entities moved earlier in the pass are already at
    /// their new positions when later entities test for collisions.
    pub fn step(&mut self, server_now: u64) -> TickOutcome {
        self.tick += 1;
        let mut outcome = TickOutcome::default();

        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let commands = match self.entities.get(&id) {
                Some(entity) => entity.inbox.drain(),
                None => continue,
            };
            if commands.is_empty() {
                continue;
            }

            let (applied, idle) = self.apply_commands(id, &commands, server_now);
            outcome.applied += applied;
            outcome.idle += idle;
            outcome.stale += commands.len() - applied - idle;

            if applied > 0 {
                if let Some(entity) = self.entities.get(&id) {
                    outcome.updates.push(snapshot_of(entity, server_now));
                }
            }
        }

        if outcome.applied > 0 || outcome.stale > 0 || outcome.idle > 0 {
            debug!(
                tick = self.tick,
                applied = outcome.applied,
                stale = outcome.stale,
                idle = outcome.idle,
                updated = outcome.updates.len(),
                "Tick processed input"
            );
        }

        outcome
    }

    /// Apply one entity's drained commands in buffer order.
    /// Returns `(applied, idle)`.
    fn apply_commands(&mut self, id: EntityId, commands: &[InputCommand], server_now: u64) -> (usize, usize) {
        let obstacles: Vec<Obstacle> = self
            .entities
            .values()
            .filter(|e| e.id != id)
            .map(Entity::as_obstacle)
            .collect();

        let bounds = self.config.bounds;
        let Some(entity) = self.entities.get_mut(&id) else {
            return (0, 0);
        };

        let (mut applied, mut idle) = (0, 0);
        for cmd in commands {
            if !entity.accepts(cmd.seq) {
                continue;
            }

            let (dx, dy) = PhysicsSystem::movement_vector(cmd.keys, entity.params.speed, cmd.dt);
            if dx == 0.0 && dy == 0.0 {
                idle += 1;
                continue;
            }

            let out = PhysicsSystem::step(
                entity.position,
                cmd.keys,
                cmd.dt,
                &entity.params,
                &obstacles,
                &bounds,
            );
            entity.commit(cmd, out.position, server_now);
            applied += 1;
        }

        (applied, idle)
    }

    /// Trim every entity's history to the retention window
    pub fn prune_histories(&mut self, now_ms: u64, window_ms: u64) -> usize {
        self.entities
            .values_mut()
            .map(|e| e.history.prune(now_ms, window_ms))
            .sum()
    }
}
