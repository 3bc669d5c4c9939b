//! Epoch bookkeeping and the closed-loop offset controller.

use census_wire::SyncFrame;
use tracing::{debug, error, trace};

use crate::{EpochTiming, OffsetStats, SyncConfig, Ticks};

/// What to do between the beacon send and the epoch boundary, based on
/// the offsets gathered so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfEpochWait {
    /// On time; wait for the epoch timer.
    WaitForTimer,
    /// Running late by more than the threshold: process the boundary now
    /// without waiting, to re-enter the right sync window sooner.
    EndNow,
    /// Running fast by more than the threshold: hold the boundary open
    /// for this many extra ticks.
    DelayBy(Ticks),
}

/// The synchronizer core: epoch counter, epoch boundary times, current
/// timing phase and the per-epoch offset statistics.
///
/// Owns no timers and no radio; the task layer feeds it received beacons
/// and asks it for boundary decisions.
#[derive(Debug)]
pub struct EpochSync {
    config: SyncConfig,
    timing: EpochTiming,
    epoch: i16,
    epoch_start_time: Ticks,
    epoch_end_time: Ticks,
    stats: OffsetStats,
}

impl EpochSync {
    /// A synchronizer at epoch zero, on warm-up timings, not yet started.
    pub fn new(config: SyncConfig) -> Self {
        config.validate();
        Self {
            config,
            timing: config.warmup,
            epoch: 0,
            epoch_start_time: -1,
            epoch_end_time: -1,
            stats: OffsetStats::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The timing parameters of the current phase.
    pub fn timing(&self) -> EpochTiming {
        self.timing
    }

    /// Current epoch index.
    pub fn epoch(&self) -> i16 {
        self.epoch
    }

    /// When the current epoch started.
    pub fn epoch_start_time(&self) -> Ticks {
        self.epoch_start_time
    }

    /// When the current epoch is expected to end.
    pub fn epoch_end_time(&self) -> Ticks {
        self.epoch_end_time
    }

    /// This epoch's offset statistics.
    pub fn stats(&self) -> &OffsetStats {
        &self.stats
    }

    /// Record the epoch boundary times after the timer was (re)armed.
    pub fn record_epoch_times(&mut self, start: Ticks, end: Ticks) {
        self.epoch_start_time = start;
        self.epoch_end_time = end;
    }

    /// Push the recorded epoch end, mirroring a held-open boundary.
    pub fn extend_epoch_end(&mut self, delta: Ticks) {
        self.epoch_end_time += delta;
    }

    /// Reset the offset statistics; called at every epoch start.
    pub fn at_epoch_start(&mut self) {
        self.stats.reset();
    }

    /// Whether this epoch boundary is the one-time warm-up/steady
    /// transition.
    pub fn at_sync_transition(&self) -> bool {
        self.epoch == self.config.epochs_until_synced
    }

    /// Whether the warm-up period is over and epoch-end signals flow.
    pub fn past_warmup(&self) -> bool {
        self.epoch > self.config.epochs_until_synced
    }

    /// Switch to steady-state timings; happens exactly once.
    pub fn switch_to_steady(&mut self) {
        self.timing = self.config.steady;
    }

    /// Advance the epoch counter at the boundary.
    pub fn increment_epoch(&mut self) {
        self.epoch += 1;
    }

    /// The beacon for this node's current epoch position.
    ///
    /// Panics if called outside the epoch bounds; the task only sends
    /// strictly inside the epoch.
    pub fn beacon(&self, now: Ticks, sender_id: Option<u16>) -> SyncFrame {
        assert!(now > self.epoch_start_time, "beacon before epoch start");
        assert!(now < self.epoch_end_time, "beacon after epoch end");
        SyncFrame {
            sender_id,
            epoch: self.epoch,
            time_from_epoch_start: (now - self.epoch_start_time) as i32,
            time_to_epoch_end: (self.epoch_end_time - now) as i32,
        }
    }

    /// Fold one received beacon into the offset statistics.
    ///
    /// Returns the computed offset for tracing, or `None` when the frame
    /// contributed nothing (sender behind us, or timing anomalies).
    pub fn observe(&mut self, now: Ticks, frame: &SyncFrame) -> Option<Ticks> {
        let distance = i32::from(self.epoch) - i32::from(frame.epoch);

        let offset = if distance > 0 {
            // We are ahead; slower nodes adjust to us.
            debug!(
                ours = self.epoch,
                theirs = frame.epoch,
                "discarding sync beacon from a slower node"
            );
            return None;
        } else if distance < 0 {
            if distance == -1 {
                if self.epoch_end_time <= now {
                    // Boundary processing is overdue; the offset math
                    // below needs a live epoch.
                    debug!(epoch = self.epoch, "beacon raced the epoch boundary");
                    return None;
                }
                let time_to_epoch_end = self.epoch_end_time - now;
                time_to_epoch_end + Ticks::from(frame.time_from_epoch_start)
            } else {
                // Far ahead: a coarse whole-epoch correction. Deliberately
                // ignores within-epoch elapsed time on both sides.
                self.timing.interval * (Ticks::from(frame.epoch) - Ticks::from(self.epoch))
            }
        } else {
            if now > self.epoch_end_time {
                // The epoch expired but the boundary has not been
                // processed yet: something is delaying the task loop.
                error!(
                    epoch = self.epoch,
                    late = now - self.epoch_end_time,
                    "sync beacon received after end of epoch"
                );
                return None;
            }

            let time_from_epoch_start = (now - self.epoch_start_time).max(1);
            let time_to_epoch_end = self.epoch_end_time - now;
            let offset = time_to_epoch_end - Ticks::from(frame.time_to_epoch_end);

            // Extrapolate linearly to guess the offset at this epoch's end.
            offset * self.timing.interval / time_from_epoch_start
        };

        self.stats.record(offset);
        trace!(epoch = self.epoch, offset, "sync offset observed");
        Some(offset)
    }

    /// Decide how to approach the epoch boundary.
    pub fn pre_wait_decision(&self) -> EndOfEpochWait {
        if let Some(avg) = self.stats.average() {
            if avg > self.config.pre_wait_threshold {
                return EndOfEpochWait::EndNow;
            }
            if avg < -self.config.pre_wait_threshold {
                return EndOfEpochWait::DelayBy(-avg / 2);
            }
        }
        EndOfEpochWait::WaitForTimer
    }

    /// The clamped timer correction for the next epoch, or `None` when
    /// the compensated average sits inside the dead band.
    pub fn adjustment(&self) -> Option<Ticks> {
        let avg = self.stats.average()? + self.config.tx_delay_compensation;
        if avg.abs() <= self.config.adjust_threshold {
            return None;
        }
        let adjust = (-avg / 2).clamp(-self.config.adjust_clamp, self.config.adjust_clamp);
        debug!(
            observations = self.stats.count(),
            avg, adjust, "feedback-correcting next epoch timer"
        );
        Some(adjust)
    }
}
