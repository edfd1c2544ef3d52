//! Rate limiting for repeated log messages.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Allows an action at most once per interval.
///
/// Shareable across threads; calls between allowed firings are counted so
/// the next message can report how many were suppressed.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    state: Mutex<ThrottleState>,
}

#[derive(Debug, Default)]
struct ThrottleState {
    last: Option<Instant>,
    suppressed: u64,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Returns `Some(suppressed)` when the action may fire now.
    pub fn check(&self) -> Option<u64> {
        self.check_at(Instant::now())
    }

    /// True when the action may fire now.
    #[inline]
    pub fn ready(&self) -> bool {
        self.check().is_some()
    }

    fn check_at(&self, now: Instant) -> Option<u64> {
        let mut state = self.state.lock();
        let due = state
            .last
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            state.last = Some(now);
            Some(std::mem::take(&mut state.suppressed))
        } else {
            state.suppressed += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_fires() {
        let throttle = Throttle::new(Duration::from_secs(4));
        assert_eq!(throttle.check(), Some(0));
    }

    #[test]
    fn test_suppresses_within_interval() {
        let throttle = Throttle::new(Duration::from_secs(4));
        let t0 = Instant::now();
        assert_eq!(throttle.check_at(t0), Some(0));
        assert_eq!(throttle.check_at(t0 + Duration::from_secs(1)), None);
        assert_eq!(throttle.check_at(t0 + Duration::from_secs(3)), None);
        assert_eq!(throttle.check_at(t0 + Duration::from_secs(4)), Some(2));
        assert_eq!(throttle.check_at(t0 + Duration::from_secs(5)), None);
    }
}
