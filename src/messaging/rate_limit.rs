// Rate limiting for slider-driven setters
// Applies at most once per interval; the latest value always lands (trailing edge)

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimited<T> {
    interval: Duration,
    last_applied: Option<Instant>,
    pending: Option<T>,
}

impl<T> RateLimited<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_applied: None,
            pending: None,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        self.last_applied
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Offer a new value. Returns it when it may be applied right away,
    /// otherwise keeps it (replacing any older pending value).
    pub fn submit(&mut self, value: T, now: Instant) -> Option<T> {
        if self.ready(now) {
            self.last_applied = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Returns the pending value once the interval has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.ready(now) {
            self.last_applied = Some(now);
            self.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(16);

    #[test]
    fn test_first_value_applies_immediately() {
        let mut limiter = RateLimited::new(INTERVAL);
        let t0 = Instant::now();
        assert_eq!(limiter.submit(0.3, t0), Some(0.3));
        assert_eq!(limiter.poll(t0 + INTERVAL), None);
    }

    #[test]
    fn test_burst_coalesces_to_latest_value() {
        let t0 = Instant::now();
        let mut limiter = RateLimited::new(INTERVAL);

        assert_eq!(limiter.submit(1, t0), Some(1));
        assert_eq!(limiter.submit(2, t0 + Duration::from_millis(2)), None);
        assert_eq!(limiter.submit(3, t0 + Duration::from_millis(5)), None);
        assert_eq!(limiter.poll(t0 + Duration::from_millis(10)), None);

        // Trailing edge: the last value wins once the interval has passed
        assert_eq!(limiter.poll(t0 + Duration::from_millis(16)), Some(3));
        assert_eq!(limiter.poll(t0 + Duration::from_millis(40)), None);
    }

    #[test]
    fn test_at_most_once_per_interval() {
        let t0 = Instant::now();
        let mut limiter = RateLimited::new(INTERVAL);
        let mut applied = Vec::new();

        for ms in 0..100u64 {
            let now = t0 + Duration::from_millis(ms);
            if let Some(v) = limiter.submit(ms, now) {
                applied.push((ms, v));
            }
            if let Some(v) = limiter.poll(now) {
                applied.push((ms, v));
            }
        }
        if let Some(v) = limiter.poll(t0 + Duration::from_millis(200)) {
            applied.push((200, v));
        }

        for pair in applied.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= 16);
        }
        assert_eq!(applied.last().map(|(_, v)| *v), Some(99));
    }
}
