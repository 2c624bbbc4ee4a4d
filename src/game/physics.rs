//! Movement integration, collision and world bounds
//!
//! Shared by the authoritative simulator and the client-side predictor so both
//! sides run the exact same arithmetic.

use serde::{Deserialize, Serialize};

use super::command::DirectionSet;

/// Decimal digits kept after every integration step
pub const POSITION_PRECISION: i32 = 5;

/// Default movement speed (units per second)
pub const DEFAULT_SPEED: f64 = 5.0;
/// Default collision radius
pub const DEFAULT_RADIUS: f64 = 0.5;
/// Default half extent of the square world
pub const DEFAULT_HALF_EXTENT: f64 = 15.0;

/// 2D position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn rounded(self) -> Self {
        Self {
            x: round_to_precision(self.x),
            y: round_to_precision(self.y),
        }
    }

    /// Linear interpolation, `t` in `[0, 1]`
    pub fn lerp(self, to: Position, t: f64) -> Self {
        Self {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Round to [`POSITION_PRECISION`] decimal digits
pub fn round_to_precision(v: f64) -> f64 {
    let scale = 10f64.powi(POSITION_PRECISION);
    (v * scale).round() / scale
}

/// Per-entity movement constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityParams {
    pub speed: f64,
    pub radius: f64,
}

impl Default for EntityParams {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            radius: DEFAULT_RADIUS,
        }
    }
}

/// Square world centred on the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub half_extent: f64,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            half_extent: DEFAULT_HALF_EXTENT,
        }
    }
}

impl WorldBounds {
    /// Hard clamp, each axis independently
    pub fn clamp(&self, p: Position) -> Position {
        Position {
            x: p.x.clamp(-self.half_extent, self.half_extent),
            y: p.y.clamp(-self.half_extent, self.half_extent),
        }
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x.abs() <= self.half_extent && p.y.abs() <= self.half_extent
    }
}

/// Another body a moving entity must not overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub position: Position,
    pub radius: f64,
}

/// Result of one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub position: Position,
    /// The tentative move hit another body and was cancelled
    pub collided: bool,
}

/// Physics system for integrating entity movement
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Displacement for one command: `direction * speed * dt`
    pub fn movement_vector(keys: DirectionSet, speed: f64, dt: f64) -> (f64, f64) {
        let (ax, ay) = keys.axes();
        (ax * speed * dt, ay * speed * dt)
    }

    /// Circle-vs-circle overlap test (touching counts as colliding)
    pub fn circles_collide(a: Position, ra: f64, b: Position, rb: f64) -> bool {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        let combined = ra + rb;
        dx * dx + dy * dy <= combined * combined
    }

    /// Integrate one command from `from`.
    ///
    /// Order: move, round, test every obstacle, cancel the whole step on any
    /// hit (subtract the same vector, round again), then clamp to the world.
    pub fn step(
        from: Position,
        keys: DirectionSet,
        dt: f64,
        params: &EntityParams,
        obstacles: &[Obstacle],
        bounds: &WorldBounds,
    ) -> StepOutcome {
        let (dx, dy) = Self::movement_vector(keys, params.speed, dt);

        let tentative = Position::new(from.x + dx, from.y + dy).rounded();

        let collided = obstacles
            .iter()
            .any(|o| Self::circles_collide(tentative, params.radius, o.position, o.radius));

        let resolved = if collided {
            Position::new(tentative.x - dx, tentative.y - dy).rounded()
        } else {
            tentative
        };

        StepOutcome {
            position: bounds.clamp(resolved),
            collided,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward() -> DirectionSet {
        DirectionSet::from_held(true, false, false, false)
    }

    #[test]
    fn test_rounding_to_five_digits() {
        assert_eq!(round_to_precision(0.123456789), 0.12346);
        assert_eq!(round_to_precision(-1.000004), -1.0);
        assert_eq!(round_to_precision(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_sign_convention() {
        let left = DirectionSet::from_held(false, false, true, false);
        assert_eq!(PhysicsSystem::movement_vector(left, 5.0, 0.1), (0.5, 0.0));

        let back_right = DirectionSet::from_held(false, true, false, true);
        assert_eq!(PhysicsSystem::movement_vector(back_right, 5.0, 0.1), (-0.5, -0.5));
    }

    #[test]
    fn test_free_step() {
        let out = PhysicsSystem::step(
            Position::default(),
            forward(),
            0.1,
            &EntityParams::default(),
            &[],
            &WorldBounds::default(),
        );
        assert!(!out.collided);
        assert_eq!(out.position, Position::new(0.0, 0.5));
    }

    #[test]
    fn test_collision_cancels_whole_step() {
        let start = Position::new(0.0, 0.0);
        let blocker = Obstacle {
            position: Position::new(0.0, 1.4),
            radius: 0.5,
        };

        let out = PhysicsSystem::step(
            start,
            forward(),
            0.1,
            &EntityParams::default(),
            &[blocker],
            &WorldBounds::default(),
        );
        assert!(out.collided);
        assert_eq!(out.position, start);
    }

    #[test]
    fn test_collision_outcome_ignores_obstacle_order() {
        let start = Position::new(2.0, 2.0);
        let near = Obstacle {
            position: Position::new(2.0, 3.2),
            radius: 0.5,
        };
        let far = Obstacle {
            position: Position::new(-8.0, -8.0),
            radius: 0.5,
        };
        let params = EntityParams::default();
        let bounds = WorldBounds::default();

        let a = PhysicsSystem::step(start, forward(), 0.1, &params, &[near, far], &bounds);
        let b = PhysicsSystem::step(start, forward(), 0.1, &params, &[far, near], &bounds);
        assert_eq!(a, b);
        assert_eq!(a.position, start);
    }

    #[test]
    fn test_world_edge_is_clamped_not_cancelled() {
        let out = PhysicsSystem::step(
            Position::new(0.0, 14.9),
            forward(),
            0.25,
            &EntityParams::default(),
            &[],
            &WorldBounds::default(),
        );
        assert!(!out.collided);
        assert_eq!(out.position, Position::new(0.0, 15.0));
    }

    #[test]
    fn test_bounds_hold_over_many_steps() {
        let params = EntityParams::default();
        let bounds = WorldBounds::default();
        let keys = [
            DirectionSet::from_held(true, false, true, false),
            DirectionSet::from_held(false, true, false, true),
            DirectionSet::from_held(true, false, false, true),
        ];

        let mut p = Position::default();
        for i in 0..600 {
            // First 200 steps walk straight into the corner.
            let k = if i < 200 { keys[0] } else { keys[i % keys.len()] };
            let dt = if i % 200 < 150 { 0.25 } else { 0.07 };
            p = PhysicsSystem::step(p, k, dt, &params, &[], &bounds).position;
            assert!(bounds.contains(p), "escaped bounds at step {i}: {p:?}");
        }
    }

    #[test]
    fn test_touching_counts_as_collision() {
        assert!(PhysicsSystem::circles_collide(
            Position::new(0.0, 0.0),
            0.5,
            Position::new(1.0, 0.0),
            0.5
        ));
        assert!(!PhysicsSystem::circles_collide(
            Position::new(0.0, 0.0),
            0.5,
            Position::new(1.00001, 0.0),
            0.5
        ));
    }
}
