//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// capped at `max_ms`, plus up to 10% jitter. Attempt 0 waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_is_immediate() {
        assert_eq!(calculate_backoff(0, 200, 5000), Duration::ZERO);
    }

    #[test]
    fn test_delay_doubles_within_jitter() {
        for (attempt, floor) in [(1, 200), (2, 400), (3, 800)] {
            let delay = calculate_backoff(attempt, 200, 5000).as_millis() as u64;
            assert!(delay >= floor && delay < floor + floor / 10 + 1, "attempt {attempt}: {delay}");
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let delay = calculate_backoff(40, 200, 5000).as_millis() as u64;
        assert!((5000..5500).contains(&delay));
    }
}
