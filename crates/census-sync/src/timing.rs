//! Epoch timing parameters.
//!
//! Each epoch is partitioned as:
//!
//! ```text
//! ts  td1          tsyncs     td2     tsyncd   te
//! |---|--------------|----------|--------|-----|
//! ```
//!
//! - `ts..td1` (`start_delay`): statistics are computed and logged; no
//!   consensus traffic yet.
//! - `td1..td2`: consensus transmissions may start.
//! - `tsyncs..tsyncd` (`sync_start..sync_end`): sync beacons are sent.
//! - `td2..te` (`end_delay`): transmissions started near `td2` drain.

use crate::{Ticks, TICKS_PER_SECOND};

/// Per-phase epoch timing: the epoch length and the beacon window inside
/// it. `sync_start` and `sync_end` are offsets from the epoch start; the
/// beacon is sent at a random instant inside `[sync_start, sync_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochTiming {
    /// Epoch length.
    pub interval: Ticks,
    /// Earliest beacon send offset within the epoch.
    pub sync_start: Ticks,
    /// Latest beacon send offset within the epoch.
    pub sync_end: Ticks,
}

impl EpochTiming {
    /// Coarse timings used while the network is still converging.
    pub const fn warmup() -> Self {
        Self {
            interval: 10 * TICKS_PER_SECOND,
            sync_start: 4 * TICKS_PER_SECOND,
            sync_end: 8 * TICKS_PER_SECOND,
        }
    }

    /// Tightened steady-state timings.
    pub const fn steady() -> Self {
        Self {
            interval: 10 * TICKS_PER_SECOND,
            sync_start: 3 * TICKS_PER_SECOND,
            sync_end: 9 * TICKS_PER_SECOND + TICKS_PER_SECOND / 2,
        }
    }

    /// Width of the beacon send window.
    pub const fn sync_xfer_interval(&self) -> Ticks {
        self.sync_end - self.sync_start
    }
}

/// Full synchronizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Timings for the initial convergence phase.
    pub warmup: EpochTiming,
    /// Timings after convergence.
    pub steady: EpochTiming,
    /// Warm-up length: epochs before the "synced" signal fires.
    pub epochs_until_synced: i16,
    /// Quiet period at each epoch start for statistics and logging.
    pub start_delay: Ticks,
    /// Drain period at each epoch end; also the per-epoch transmit budget.
    pub end_delay: Ticks,
    /// Offset average beyond which the epoch end is rushed or delayed
    /// instead of waiting for the timer.
    pub pre_wait_threshold: Ticks,
    /// Offset average magnitude below which no timer correction happens.
    pub adjust_threshold: Ticks,
    /// Hard bound on a single timer correction.
    pub adjust_clamp: Ticks,
    /// Fixed compensation for known transmit and propagation delay, added
    /// to the measured average before the correction.
    pub tx_delay_compensation: Ticks,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            warmup: EpochTiming::warmup(),
            steady: EpochTiming::steady(),
            epochs_until_synced: 10,
            start_delay: TICKS_PER_SECOND / 2,
            end_delay: TICKS_PER_SECOND,
            pre_wait_threshold: TICKS_PER_SECOND,
            adjust_threshold: 1,
            adjust_clamp: TICKS_PER_SECOND / 2,
            tx_delay_compensation: 0,
        }
    }
}

impl SyncConfig {
    /// Window in which consensus transmissions may start.
    pub const fn epoch_xfer_interval(&self) -> Ticks {
        self.steady.interval - self.start_delay - self.end_delay
    }

    /// Reject configurations the protocol cannot run on.
    ///
    /// These mirror the dimensioning rules the original deployment
    /// enforced at build time; a bad configuration is a programming
    /// error.
    pub fn validate(&self) {
        assert!(
            self.warmup.interval >= 2 * TICKS_PER_SECOND,
            "warm-up epoch interval too short"
        );
        assert!(
            self.warmup.sync_start >= TICKS_PER_SECOND / 2,
            "warm-up sync window starts too early"
        );
        assert!(
            self.warmup.sync_xfer_interval() > 2 * TICKS_PER_SECOND,
            "warm-up sync window too narrow"
        );
        assert!(
            self.steady.sync_xfer_interval() > 0,
            "steady sync window is empty"
        );
        assert!(
            self.start_delay >= TICKS_PER_SECOND / 2,
            "epoch start delay too short"
        );
        assert!(
            self.end_delay >= TICKS_PER_SECOND / 4,
            "epoch end delay too short"
        );
        assert!(
            self.epoch_xfer_interval() > TICKS_PER_SECOND,
            "consensus transfer window too narrow"
        );
        assert!(self.epochs_until_synced > 0);
        assert!(self.adjust_clamp > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SyncConfig::default().validate();
    }

    #[test]
    fn default_windows_match_deployment_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.warmup.interval, 1280);
        assert_eq!(cfg.warmup.sync_xfer_interval(), 512);
        assert_eq!(cfg.steady.sync_xfer_interval(), 832);
        assert_eq!(cfg.epoch_xfer_interval(), 1280 - 64 - 128);
    }

    #[test]
    #[should_panic(expected = "interval too short")]
    fn short_interval_is_rejected() {
        let mut cfg = SyncConfig::default();
        cfg.warmup.interval = TICKS_PER_SECOND;
        cfg.validate();
    }

    #[test]
    #[should_panic(expected = "transfer window too narrow")]
    fn narrow_transfer_window_is_rejected() {
        let mut cfg = SyncConfig::default();
        cfg.start_delay = 5 * TICKS_PER_SECOND;
        cfg.end_delay = 4 * TICKS_PER_SECOND;
        cfg.validate();
    }
}
