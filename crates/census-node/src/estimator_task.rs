//! The size estimator task.
//!
//! Gated entirely by the synchronizer's signals: the first `Synced`
//! starts it, every `EpochEnded` afterwards runs the epoch boundary. In
//! between, the task transmits its window snapshot fragment by fragment —
//! at most one frame in flight, each gated on the send-completion event —
//! and the receive path folds peer fragments into the window whenever
//! they arrive.
//!
//! There is no cancellation: a boundary signal arriving mid-transmission
//! simply abandons the rest of the snapshot (the radio is released and
//! the machine moves forward), which max-consensus absorbs the same way
//! it absorbs packet loss.

use census_estimator::{EstimatorParams, SizeEstimator, SufficientStats};
use census_rng::UniformRng;
use census_sync::{SyncConfig, Ticks};
use census_wire::WireConfig;
use tracing::{debug, info, trace, warn};

use crate::{BroadcastLink, EpochTimer, NodeIdentity, RadioArbiter, SyncSignal, CONSENSUS_CHANNEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EstimatorState {
    /// Waiting for the synchronizer's first `Synced` signal.
    AwaitStart,
    /// Waiting for the randomized transfer start instant.
    AwaitXferSlot,
    /// Spinning on the radio lock, one attempt per step.
    AwaitRadio,
    /// A fragment is in flight; waiting for its send-completion.
    AwaitSendComplete,
    /// Done transmitting (or bailed); waiting for the next epoch signal.
    AwaitEpochEnd,
}

/// The size estimator state machine.
#[derive(Debug)]
pub struct EstimatorTask {
    estimator: SizeEstimator,
    state: EstimatorState,
    send_timer: EpochTimer,
    jitter: UniformRng,
    identity: NodeIdentity,
    sync_config: SyncConfig,
    tx_start: Ticks,
    holds_radio: bool,
}

impl EstimatorTask {
    /// Build the task around a freshly sampled estimator.
    ///
    /// The epoch counter is jumped to the synchronizer's warm-up count so
    /// the first active epoch lines up with the `Synced` transition.
    pub fn new(
        params: EstimatorParams,
        wire: WireConfig,
        sync_config: SyncConfig,
        identity: NodeIdentity,
    ) -> Self {
        let mut estimator = SizeEstimator::new(
            params,
            wire,
            UniformRng::from_seed(identity.sample_seed()),
        );
        estimator.jump_to_epoch(sync_config.epochs_until_synced);

        Self {
            estimator,
            state: EstimatorState::AwaitStart,
            send_timer: EpochTimer::new(),
            jitter: UniformRng::from_seed(identity.xfer_jitter_seed()),
            identity,
            sync_config,
            tx_start: 0,
            holds_radio: false,
        }
    }

    /// The estimator core, for inspection.
    pub fn estimator(&self) -> &SizeEstimator {
        &self.estimator
    }

    /// Mutable access to the estimator core, for enable/disable control.
    pub fn estimator_mut(&mut self) -> &mut SizeEstimator {
        &mut self.estimator
    }

    /// Feed one received consensus fragment in.
    pub fn on_frame(&mut self, bytes: &[u8]) {
        self.estimator.absorb_frame(bytes);
    }

    /// Epoch boundary: run the per-epoch work and schedule transmission.
    ///
    /// Returns the epoch's sufficient statistics when the estimator is
    /// enabled.
    pub fn on_signal(
        &mut self,
        now: Ticks,
        signal: SyncSignal,
        radio: &mut RadioArbiter,
    ) -> Option<SufficientStats> {
        if self.holds_radio {
            // Boundary overran an in-flight transmission; drop the tail.
            debug!(
                epoch = self.estimator.epoch(),
                "abandoning transmission at epoch boundary"
            );
            radio.unlock();
            self.holds_radio = false;
        }

        if signal == SyncSignal::Synced {
            info!(epoch = self.estimator.epoch(), "estimator starting");
        }

        let stats = self.estimator.at_epoch_start();
        if let Some(stats) = &stats {
            let formatted: Vec<String> = stats.columns.iter().map(|s| s.to_string()).collect();
            info!(
                epoch = stats.epoch,
                stats = %formatted.join(" "),
                "sufficient statistics"
            );
        }

        if self.estimator.is_enabled() {
            let send_wait = self.sync_config.start_delay
                + self
                    .jitter
                    .next_below(self.sync_config.epoch_xfer_interval() as u64)
                    as Ticks;
            self.send_timer.set(now, send_wait);
            self.state = EstimatorState::AwaitXferSlot;
        } else {
            self.state = EstimatorState::AwaitEpochEnd;
        }

        stats
    }

    /// Send-completion for the last queued fragment: either queue the
    /// next one, finish, or bail on an exhausted transmit budget.
    pub fn on_sent(
        &mut self,
        now: Ticks,
        radio: &mut RadioArbiter,
        link: &mut dyn BroadcastLink,
    ) {
        if self.state != EstimatorState::AwaitSendComplete {
            return;
        }
        debug_assert!(self.holds_radio);

        if self.estimator.pending_bytes() == 0 {
            trace!(
                epoch = self.estimator.epoch(),
                elapsed = now - self.tx_start,
                "consensus data sent"
            );
            self.release_radio(radio);
            return;
        }

        if now - self.tx_start > self.sync_config.end_delay {
            // Loss of the tail is acceptable; peers rebroadcast the same
            // consensus state anyway.
            warn!(
                epoch = self.estimator.epoch(),
                pending = self.estimator.pending_bytes(),
                "transmission exceeded its budget, bailing"
            );
            self.release_radio(radio);
            return;
        }

        self.queue_next(link);
    }

    /// Step the state machine.
    pub fn poll(&mut self, now: Ticks, radio: &mut RadioArbiter, link: &mut dyn BroadcastLink) {
        loop {
            match self.state {
                EstimatorState::AwaitStart
                | EstimatorState::AwaitEpochEnd
                | EstimatorState::AwaitSendComplete => return,

                EstimatorState::AwaitXferSlot => {
                    if !self.send_timer.expired(now) {
                        return;
                    }
                    self.state = EstimatorState::AwaitRadio;
                }

                EstimatorState::AwaitRadio => {
                    if !radio.try_lock() {
                        return; // yield; retry on the next step
                    }
                    self.holds_radio = true;
                    self.tx_start = now;
                    self.queue_next(link);
                    self.state = EstimatorState::AwaitSendComplete;
                    return;
                }
            }
        }
    }

    fn queue_next(&mut self, link: &mut dyn BroadcastLink) {
        let (frame, _remaining) = self.estimator.queue_frame(self.identity.id16);
        link.send(CONSENSUS_CHANNEL, &frame);
    }

    fn release_radio(&mut self, radio: &mut RadioArbiter) {
        radio.unlock();
        self.holds_radio = false;
        self.state = EstimatorState::AwaitEpochEnd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_wire::SplitFrame;

    #[derive(Default)]
    struct RecordingLink {
        sent: Vec<(crate::ChannelId, Vec<u8>)>,
    }

    impl BroadcastLink for RecordingLink {
        fn send(&mut self, channel: crate::ChannelId, frame: &[u8]) {
            self.sent.push((channel, frame.to_vec()));
        }
    }

    fn task() -> EstimatorTask {
        EstimatorTask::new(
            EstimatorParams { rows: 10, cols: 3 },
            WireConfig::default(),
            SyncConfig::default(),
            NodeIdentity::new(0xfeed_f00d),
        )
    }

    /// Drive one full epoch of transmission, completing each frame on the
    /// next tick. Returns the sent frames.
    fn run_epoch(task: &mut EstimatorTask, signal: SyncSignal) -> Vec<Vec<u8>> {
        let mut radio = RadioArbiter::new();
        let mut link = RecordingLink::default();

        let stats = task.on_signal(0, signal, &mut radio);
        assert!(stats.is_some());

        let mut sent = 0;
        for now in 1..5000 {
            task.poll(now, &mut radio, &mut link);
            // Complete any newly queued frame on the following tick.
            if link.sent.len() > sent {
                sent = link.sent.len();
                task.on_sent(now, &mut radio, &mut link);
            }
            if task.state == EstimatorState::AwaitEpochEnd {
                break;
            }
        }
        assert!(!radio.is_locked());
        link.sent.into_iter().map(|(_, f)| f).collect()
    }

    #[test]
    fn transmits_the_whole_snapshot_after_synced() {
        let mut task = task();
        let frames = run_epoch(&mut task, SyncSignal::Synced);

        // 10*3 cells = 60 bytes: one frame.
        assert_eq!(frames.len(), 1);
        let parsed = SplitFrame::parse(WireConfig::default(), &frames[0]).unwrap();
        assert_eq!(parsed.epoch, task.estimator().epoch());
        assert_eq!(parsed.sender_id, Some(0xf00d));
        assert_eq!(parsed.payload.len(), 60);
    }

    #[test]
    fn multi_fragment_snapshot_is_fully_sent() {
        let mut task = EstimatorTask::new(
            EstimatorParams { rows: 100, cols: 7 },
            WireConfig::default(),
            SyncConfig::default(),
            NodeIdentity::new(0xfeed_f00d),
        );
        let frames = run_epoch(&mut task, SyncSignal::Synced);
        // 1400 bytes over 104-byte payloads.
        assert_eq!(frames.len(), 14);
        assert_eq!(task.estimator().pending_bytes(), 0);
    }

    #[test]
    fn boundary_mid_transmission_releases_the_radio() {
        let mut task = task();
        let mut radio = RadioArbiter::new();
        let mut link = RecordingLink::default();

        task.on_signal(0, SyncSignal::Synced, &mut radio);
        // Walk to the in-flight state without completing the send.
        let mut now = 1;
        while task.state != EstimatorState::AwaitSendComplete {
            task.poll(now, &mut radio, &mut link);
            now += 1;
        }
        assert!(radio.is_locked());

        let stats = task.on_signal(now, SyncSignal::EpochEnded, &mut radio);
        assert!(stats.is_some());
        assert!(!radio.is_locked());
    }

    #[test]
    fn disabled_estimator_skips_transmission() {
        let mut task = task();
        let mut radio = RadioArbiter::new();

        task.estimator_mut().disable();
        let stats = task.on_signal(0, SyncSignal::Synced, &mut radio);
        assert!(stats.is_none());
        assert_eq!(task.state, EstimatorState::AwaitEpochEnd);
    }

    #[test]
    fn epochs_align_with_warmup_count() {
        let task = task();
        assert_eq!(
            task.estimator().epoch(),
            SyncConfig::default().epochs_until_synced
        );
    }
}
