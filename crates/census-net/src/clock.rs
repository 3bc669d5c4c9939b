//! Wall-clock tick source.

use std::time::Instant;

use census_node::Clock;
use census_sync::{Ticks, TICKS_PER_SECOND};

/// A monotonic clock counting ticks since its construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Ticks {
        let micros = self.origin.elapsed().as_micros() as i64;
        micros * TICKS_PER_SECOND / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_monotonic() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0);
    }
}
