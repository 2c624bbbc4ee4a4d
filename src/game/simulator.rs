//! Authoritative tick driver and server-side history pruning

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::registry::Registry;
use super::world::TickOutcome;
use crate::util::time::{unix_millis, Timer};

/// Counters exposed on the health endpoint
#[derive(Debug, Default)]
pub struct TickStats {
    ticks: AtomicU64,
    last_tick_micros: AtomicU64,
    applied: AtomicU64,
    stale: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TickStatsSnapshot {
    pub ticks: u64,
    pub last_tick_micros: u64,
    pub commands_applied: u64,
    pub commands_stale: u64,
}

impl TickStats {
    fn record(&self, outcome: &TickOutcome, micros: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_micros.store(micros, Ordering::Relaxed);
        self.applied.fetch_add(outcome.applied as u64, Ordering::Relaxed);
        self.stale.fetch_add(outcome.stale as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TickStatsSnapshot {
        TickStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            last_tick_micros: self.last_tick_micros.load(Ordering::Relaxed),
            commands_applied: self.applied.load(Ordering::Relaxed),
            commands_stale: self.stale.load(Ordering::Relaxed),
        }
    }
}

/// Advances the world once per tick and hands updates to the registry.
pub struct Simulator {
    registry: Arc<Registry>,
    stats: TickStats,
}

impl Simulator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            stats: TickStats::default(),
        }
    }

    /// One authoritative tick at the current wall-clock time
    pub fn tick(&self) -> TickOutcome {
        self.tick_at(unix_millis())
    }

    pub fn tick_at(&self, server_now: u64) -> TickOutcome {
        let timer = Timer::new();
        let outcome = self.registry.advance(|world| world.step(server_now));
        self.stats.record(&outcome, timer.elapsed_micros());
        outcome
    }

    pub fn stats(&self) -> TickStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Periodic eviction of server-side position history
pub struct HistoryPruner {
    registry: Arc<Registry>,
    window_ms: u64,
}

impl HistoryPruner {
    pub fn new(registry: Arc<Registry>, window_ms: u64) -> Self {
        Self { registry, window_ms }
    }

    pub fn run_once(&self) -> usize {
        self.run_at(unix_millis())
    }

    pub fn run_at(&self, now_ms: u64) -> usize {
        let removed = self.registry.prune_histories(now_ms, self.window_ms);
        if removed > 0 {
            debug!(removed, "Pruned server position history");
        }
        removed
    }
}
