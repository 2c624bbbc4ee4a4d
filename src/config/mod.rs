//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::history::DEFAULT_RETENTION_MS;
use crate::game::physics::{EntityParams, WorldBounds, DEFAULT_HALF_EXTENT, DEFAULT_RADIUS, DEFAULT_SPEED};
use crate::game::world::{WorldConfig, DEFAULT_SPAWN_RANGE};
use crate::util::rate_limit::DEFAULT_INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated; `None` allows any
    pub client_origin: Option<String>,
    /// Per-connection outbound queue length
    pub outbound_capacity: usize,
    /// Input messages accepted per second per connection
    pub input_rate_limit: u32,
    pub simulation: SimulationConfig,
}

/// Tick cadence and world tuning
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub tick_ms: u64,
    /// History retention window, also the prune cadence
    pub retention_ms: u64,
    pub spawn_range: i32,
    pub half_extent: f64,
    pub speed: f64,
    pub radius: f64,
    pub spawn_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            retention_ms: DEFAULT_RETENTION_MS,
            spawn_range: DEFAULT_SPAWN_RANGE,
            half_extent: DEFAULT_HALF_EXTENT,
            speed: DEFAULT_SPEED,
            radius: DEFAULT_RADIUS,
            spawn_seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn retention_period(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            bounds: WorldBounds {
                half_extent: self.half_extent,
            },
            params: EntityParams {
                speed: self.speed,
                radius: self.radius,
            },
            spawn_range: self.spawn_range,
            seed: self.spawn_seed.unwrap_or_else(rand::random),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when both are set
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:4004".to_string())
        };

        let defaults = SimulationConfig::default();
        let simulation = SimulationConfig {
            tick_ms: parse_or("TICK_MS", defaults.tick_ms)?,
            retention_ms: parse_or("RETENTION_MS", defaults.retention_ms)?,
            spawn_range: parse_or("SPAWN_RANGE", defaults.spawn_range)?,
            half_extent: parse_or("WORLD_HALF_EXTENT", defaults.half_extent)?,
            speed: parse_or("ENTITY_SPEED", defaults.speed)?,
            radius: parse_or("ENTITY_RADIUS", defaults.radius)?,
            spawn_seed: parse_opt("SPAWN_SEED")?,
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            outbound_capacity: parse_or("OUTBOUND_CAPACITY", 256)?,
            input_rate_limit: parse_or("INPUT_RATE_LIMIT", DEFAULT_INPUT_RATE_LIMIT)?,
            simulation,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.tick_ms == 0 {
            return Err(ConfigError::Invalid("TICK_MS"));
        }
        if sim.retention_ms == 0 {
            return Err(ConfigError::Invalid("RETENTION_MS"));
        }
        if sim.spawn_range < 0 {
            return Err(ConfigError::Invalid("SPAWN_RANGE"));
        }
        if !(sim.half_extent.is_finite() && sim.half_extent > 0.0) {
            return Err(ConfigError::Invalid("WORLD_HALF_EXTENT"));
        }
        if !(sim.speed.is_finite() && sim.speed >= 0.0) {
            return Err(ConfigError::Invalid("ENTITY_SPEED"));
        }
        if !(sim.radius.is_finite() && sim.radius >= 0.0) {
            return Err(ConfigError::Invalid("ENTITY_RADIUS"));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_CAPACITY"));
        }
        if self.input_rate_limit == 0 {
            return Err(ConfigError::Invalid("INPUT_RATE_LIMIT"));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn parse_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variable_uses_default() {
        let v: u64 = parse_or("ARENA_SYNC_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn test_unparsable_variable_is_rejected() {
        env::set_var("ARENA_SYNC_TEST_BAD_NUMBER", "not-a-number");
        let err = parse_or::<u64>("ARENA_SYNC_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("ARENA_SYNC_TEST_BAD_NUMBER")));
    }

    #[test]
    fn test_world_config_carries_tuning() {
        let sim = SimulationConfig {
            spawn_seed: Some(7),
            speed: 3.0,
            ..SimulationConfig::default()
        };
        let world = sim.world_config();
        assert_eq!(world.seed, 7);
        assert_eq!(world.params.speed, 3.0);
        assert_eq!(world.bounds.half_extent, DEFAULT_HALF_EXTENT);
        assert_eq!(sim.tick_period(), Duration::from_millis(100));
    }
}
