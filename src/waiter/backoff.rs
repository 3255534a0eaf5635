//! Polling interval schedule shared by the waiter and the retry helper.

use std::time::Duration;

/// Exponential backoff without jitter.
///
/// The first interval is `min`, each following one doubles, capped at `max`.
/// With `min == max` the interval is fixed.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a schedule between `min` and `max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            next: min.min(max),
            max,
        }
    }

    /// The next interval, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        current
    }

    /// The next interval, clamped so the sleep never runs past `remaining`.
    pub fn next_delay_within(&mut self, remaining: Duration) -> Duration {
        self.next_delay().min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn test_fixed_interval() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(10));
        for _ in 0..4 {
            assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        }
    }

    #[test]
    fn test_clamped_to_remaining() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(10));
        assert_eq!(
            backoff.next_delay_within(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
        // The schedule still advanced.
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_min_above_max_uses_max() {
        let mut backoff = Backoff::new(Duration::from_secs(20), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }
}
