//! Time utilities for simulation and history bookkeeping

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Millisecond threshold below which a timestamp falls outside a retention window.
pub fn retention_cutoff(now_ms: u64, window_ms: u64) -> u64 {
    now_ms.saturating_sub(window_ms)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
