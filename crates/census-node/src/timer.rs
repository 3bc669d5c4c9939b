//! One-shot epoch timer with phase-preserving re-arm.

use census_sync::Ticks;

/// A timer the event loop polls for expiry.
///
/// [`EpochTimer::reset`] re-schedules by adding the interval to the
/// *previous* expiration rather than to the current time. The epoch
/// boundary is processed a little after the timer fires; restarting from
/// "now" would leak that processing latency into every epoch and
/// accumulate drift. [`EpochTimer::adjust`] shifts the pending expiration
/// for closed-loop corrections.
#[derive(Debug, Clone, Copy)]
pub struct EpochTimer {
    interval: Ticks,
    expiration: Ticks,
    armed: bool,
}

impl Default for EpochTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochTimer {
    /// A disarmed timer.
    pub fn new() -> Self {
        Self {
            interval: 0,
            expiration: 0,
            armed: false,
        }
    }

    /// Arm to fire `interval` ticks from `now`.
    pub fn set(&mut self, now: Ticks, interval: Ticks) {
        assert!(interval > 0, "timer interval must be positive");
        self.interval = interval;
        self.expiration = now + interval;
        self.armed = true;
    }

    /// Re-arm for the next period, preserving phase: the new expiration
    /// is exactly one interval after the previous one.
    pub fn reset(&mut self) {
        assert!(self.armed, "reset of a disarmed timer");
        self.expiration += self.interval;
    }

    /// Shift the pending expiration by `delta` ticks.
    pub fn adjust(&mut self, delta: Ticks) {
        assert!(self.armed, "adjust of a disarmed timer");
        self.expiration += delta;
    }

    /// Disarm.
    pub fn stop(&mut self) {
        self.armed = false;
    }

    /// Whether the timer is armed and its expiration has passed.
    pub fn expired(&self, now: Ticks) -> bool {
        self.armed && now >= self.expiration
    }

    /// The pending expiration time.
    pub fn expiration_time(&self) -> Ticks {
        assert!(self.armed, "expiration of a disarmed timer");
        self.expiration
    }

    /// Whether the timer is armed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
