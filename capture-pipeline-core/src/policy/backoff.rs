//! Two-lane retry delay curves.
//!
//! Light lane: `attempt * base_delay`, uncapped — log artifacts are cheap
//! and frequent, so retries stay prompt.
//!
//! Heavy lane: `base_delay * 2^(attempt-1)` up to `max_cap` — audio is
//! bandwidth-heavy, tolerates staleness, and must not hammer metered or
//! battery-constrained links.
//!
//! Both curves add jitter sampled uniformly from [-max_jitter, +max_jitter];
//! the final delay is clamped at zero so a retry is never scheduled in the
//! past. Attempt counting starts at 1.

use std::time::Duration;

use rand::Rng;

use crate::models::config::LaneBackoffConfig;
use crate::models::lane::Lane;

/// Jitter-free portion of the delay curve.
pub fn base_component(lane: Lane, attempt: u32, config: &LaneBackoffConfig) -> Duration {
    let attempt = attempt.max(1);
    match lane {
        Lane::Light => config.base_delay.saturating_mul(attempt),
        Lane::Heavy => {
            let raw = match 1u32.checked_shl(attempt - 1) {
                Some(factor) => config.base_delay.saturating_mul(factor),
                None => Duration::MAX,
            };
            match config.max_cap {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
    }
}

/// Full delay for the given attempt: base curve plus sampled jitter,
/// clamped at zero.
pub fn delay(lane: Lane, attempt: u32, config: &LaneBackoffConfig) -> Duration {
    apply_jitter(
        base_component(lane, attempt, config),
        sample_jitter_millis(config.max_jitter),
    )
}

fn sample_jitter_millis(max_jitter: Duration) -> i64 {
    let j = max_jitter.as_millis() as i64;
    if j == 0 {
        return 0;
    }
    rand::rng().random_range(-j..=j)
}

fn apply_jitter(base: Duration, jitter_millis: i64) -> Duration {
    let millis = base.as_millis() as i64 + jitter_millis;
    Duration::from_millis(millis.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_config() -> LaneBackoffConfig {
        LaneBackoffConfig {
            base_delay: Duration::from_secs(10),
            max_jitter: Duration::from_secs(5),
            max_cap: None,
            max_attempts: 10,
        }
    }

    fn heavy_config() -> LaneBackoffConfig {
        LaneBackoffConfig {
            base_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(15),
            max_cap: Some(Duration::from_secs(1800)),
            max_attempts: 8,
        }
    }

    #[test]
    fn light_base_is_linear() {
        let config = light_config();
        for attempt in 1..=20 {
            assert_eq!(
                base_component(Lane::Light, attempt, &config),
                Duration::from_secs(10) * attempt,
            );
        }
    }

    #[test]
    fn light_delay_stays_in_jitter_window() {
        let config = light_config();
        for _ in 0..200 {
            let d = delay(Lane::Light, 3, &config);
            assert!(d >= Duration::from_secs(25));
            assert!(d <= Duration::from_secs(35));
        }
    }

    #[test]
    fn heavy_base_doubles_until_cap() {
        let config = heavy_config();
        assert_eq!(base_component(Lane::Heavy, 1, &config), Duration::from_secs(30));
        assert_eq!(base_component(Lane::Heavy, 2, &config), Duration::from_secs(60));
        assert_eq!(base_component(Lane::Heavy, 4, &config), Duration::from_secs(240));
        // 30 * 2^6 = 1920 > cap
        assert_eq!(base_component(Lane::Heavy, 7, &config), Duration::from_secs(1800));
        assert_eq!(base_component(Lane::Heavy, 40, &config), Duration::from_secs(1800));
    }

    #[test]
    fn heavy_base_is_non_decreasing_and_capped() {
        let config = heavy_config();
        let mut previous = Duration::ZERO;
        for attempt in 1..=64 {
            let d = base_component(Lane::Heavy, attempt, &config);
            assert!(d >= previous);
            assert!(d <= Duration::from_secs(1800));
            previous = d;
        }
    }

    #[test]
    fn heavy_delay_never_exceeds_cap_plus_jitter() {
        let config = heavy_config();
        for _ in 0..200 {
            let d = delay(Lane::Heavy, 50, &config);
            assert!(d <= Duration::from_secs(1800 + 15));
        }
    }

    #[test]
    fn negative_jitter_clamps_at_zero() {
        assert_eq!(apply_jitter(Duration::from_secs(1), -5_000), Duration::ZERO);
        assert_eq!(
            apply_jitter(Duration::from_secs(10), -2_000),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn attempt_zero_is_treated_as_one() {
        let config = heavy_config();
        assert_eq!(
            base_component(Lane::Heavy, 0, &config),
            base_component(Lane::Heavy, 1, &config)
        );
    }
}
