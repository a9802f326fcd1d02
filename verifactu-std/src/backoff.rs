use std::time::Duration;

/// Computes the exponential-backoff-with-jitter delay for `attempt` (0-based)
/// given the policy parameters in milliseconds.
///
/// `delay = clamp(initial * multiplier^attempt + jitter, 0, max)` where
/// `jitter` is drawn uniformly from `[-1, 1] * jitter_factor * initial *
/// multiplier^attempt`. `sample` must be a value in `[0.0, 1.0]` supplied by
/// the caller (kept as a parameter so this function stays pure and testable;
/// callers pass `rand` output or a fixed value in tests).
pub fn delay_with_jitter(
    attempt: u32,
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
    sample: f64,
) -> Duration {
    debug_assert!(max_ms >= initial_ms);
    debug_assert!(multiplier >= 1.0);
    debug_assert!((0.0..=1.0).contains(&jitter_factor));
    debug_assert!((0.0..=1.0).contains(&sample));

    let factor = multiplier.powi(attempt as i32);
    let base_ms = (initial_ms as f64) * factor;
    // map `sample` from [0, 1] to [-1, 1]
    let signed_unit = sample * 2.0 - 1.0;
    let jitter_ms = signed_unit * jitter_factor * base_ms;
    let raw_ms = base_ms + jitter_ms;

    let clamped_ms = raw_ms.max(0.0).min(max_ms as f64);
    Duration::from_millis(clamped_ms.round() as u64)
}

/// An iterator of backoff [`Duration`]s at a fixed jitter sample, useful for
/// deterministic tests and for callers who don't need true randomness.
///
/// ```
/// # use verifactu_std::backoff::iter_with_params;
/// let mut it = iter_with_params(1000, 30_000, 2.0, 0.0);
/// assert_eq!(it.next().unwrap().as_millis(), 1000);
/// assert_eq!(it.next().unwrap().as_millis(), 2000);
/// assert_eq!(it.next().unwrap().as_millis(), 4000);
/// ```
pub fn iter_with_params(
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
) -> impl Iterator<Item = Duration> {
    (0u32..).map(move |attempt| {
        delay_with_jitter(
            attempt,
            initial_ms,
            max_ms,
            multiplier,
            jitter_factor,
            0.5,
        )
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_jitter_matches_pure_exponential() {
        let mut it = iter_with_params(1000, 30_000, 2.0, 0.0);
        assert_eq!(it.next().unwrap(), Duration::from_millis(1000));
        assert_eq!(it.next().unwrap(), Duration::from_millis(2000));
        assert_eq!(it.next().unwrap(), Duration::from_millis(4000));
        assert_eq!(it.next().unwrap(), Duration::from_millis(8000));
    }

    #[test]
    fn clamps_to_max() {
        let d = delay_with_jitter(20, 1000, 30_000, 2.0, 0.0, 0.5);
        assert_eq!(d, Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for attempt in 0..8 {
            let lo = delay_with_jitter(attempt, 1000, 30_000, 2.0, 0.1, 0.0);
            let hi = delay_with_jitter(attempt, 1000, 30_000, 2.0, 0.1, 1.0);
            assert!(lo <= hi);
        }
    }

    #[test]
    fn no_integer_overflow() {
        let mut it = iter_with_params(1000, 30_000, 2.0, 0.1);
        for _ in 0..200 {
            it.next();
        }
    }
}
