//! Retry backoff policy.
//!
//! Shared by the block-cache fetch loop and the reconnect state machine.
//! With `max_ms == base_ms` the delay degenerates to a fixed interval,
//! which is the default reconnect configuration.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
///
/// Total for every input: arithmetic saturates instead of overflowing, and
/// an out-of-range attempt number simply pins the delay at the cap.
pub fn delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(63);
    let factor = 1u64 << exp;
    let ms = base_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        assert_eq!(delay(1, 1000, 30_000), Duration::from_millis(1000));
        assert_eq!(delay(2, 1000, 30_000), Duration::from_millis(2000));
        assert_eq!(delay(3, 1000, 30_000), Duration::from_millis(4000));
        assert_eq!(delay(6, 1000, 30_000), Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_monotone_and_capped() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=40 {
            let d = delay(attempt, 1000, 30_000);
            assert!(d >= previous, "delay decreased at attempt {attempt}");
            assert!(d <= Duration::from_millis(30_000));
            previous = d;
        }
    }

    #[test]
    fn test_fixed_delay_when_cap_equals_base() {
        // The default reconnect configuration: cap == base, so every
        // attempt waits the same 5 seconds.
        for attempt in 1..=10 {
            assert_eq!(delay(attempt, 5000, 5000), Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(delay(u32::MAX, 1000, 30_000), Duration::from_millis(30_000));
    }
}
