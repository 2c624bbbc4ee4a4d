//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default input quota per connection, well above any display refresh rate
pub const DEFAULT_INPUT_RATE_LIMIT: u32 = 1_000;

/// Quota of `requests_per_second`, never below one
pub fn per_second_quota(requests_per_second: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
}

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    Arc::new(RateLimiter::direct(per_second_quota(requests_per_second)))
}

/// Per-connection input flood guard.
///
/// Clients emit one command per rendered frame while a key is held, and a
/// rejected command is never applied by the server, so the quota has to sit
/// above the client frame rate.
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new(inputs_per_second: u32) -> Self {
        Self {
            input_limiter: create_limiter(inputs_per_second),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use std::time::Duration;

    /// Inputs rejected when sending `rate` per second for `secs` seconds
    fn rejected_at(quota_rps: u32, rate: u64, secs: u64) -> usize {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::direct_with_clock(per_second_quota(quota_rps), &clock);
        let gap = Duration::from_nanos(1_000_000_000 / rate);
        (0..rate * secs)
            .filter(|_| {
                clock.advance(gap);
                limiter.check().is_err()
            })
            .count()
    }

    #[test]
    fn test_default_quota_keeps_up_with_high_refresh_displays() {
        assert_eq!(rejected_at(DEFAULT_INPUT_RATE_LIMIT, 144, 10), 0);
        assert_eq!(rejected_at(DEFAULT_INPUT_RATE_LIMIT, 240, 10), 0);
    }

    #[test]
    fn test_quota_below_frame_rate_loses_inputs() {
        assert!(rejected_at(120, 144, 10) > 0);
    }

    #[test]
    fn test_burst_beyond_quota_is_rejected() {
        let limiter = ConnectionRateLimiter::new(3);
        let allowed = (0..10).filter(|_| limiter.check_input()).count();
        assert_eq!(allowed, 3);
    }

    #[test]
    fn test_zero_quota_falls_back_to_one() {
        let limiter = ConnectionRateLimiter::new(0);
        assert!(limiter.check_input());
        assert!(!limiter.check_input());
    }
}
