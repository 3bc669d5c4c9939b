//! The epoch synchronizer task.
//!
//! One state machine per node, stepped by the event loop. Every
//! historical suspension point of the protocol is a named state with a
//! documented entry condition:
//!
//! ```text
//! StartOfEpoch ──schedule──▶ AwaitSendSlot ──timer──▶ AwaitRadio
//!      │ (window closed)                                   │ lock
//!      ▼                                                   ▼
//! EvaluateWait ◀──────unlock on send-completion──── AwaitSendComplete
//!   │    │    │
//!   │    │    └─(fast)─▶ DelayingEpochEnd ──timer──▶ end of epoch
//!   │    └─(late)──────────────────────────────────▶ end of epoch
//!   └─(on time)─▶ AwaitEpochEnd ──epoch timer──────▶ end of epoch
//! ```
//!
//! The boundary either re-arms the epoch timer phase-preservingly and
//! applies the closed-loop correction, or — exactly once, after the
//! warm-up count — switches to steady-state timings and signals "synced".

use census_rng::UniformRng;
use census_sync::{EndOfEpochWait, EpochSync, SyncConfig, Ticks};
use census_wire::{SyncFrame, WireConfig};
use tracing::{debug, info, trace};

use crate::{BroadcastLink, EpochTimer, NodeIdentity, RadioArbiter, SYNC_CHANNEL};

/// Signals the synchronizer raises for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    /// The network-wide epoch clock is considered stable. Fired exactly
    /// once, at the warm-up/steady transition.
    Synced,
    /// A steady-state epoch ended. Fired every epoch after the
    /// transition.
    EpochEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncerState {
    /// Entry: epoch boundary processed. Resets statistics and schedules
    /// the beacon.
    StartOfEpoch,
    /// Waiting for the randomized beacon send instant.
    AwaitSendSlot,
    /// Spinning on the radio lock, one attempt per step.
    AwaitRadio,
    /// Beacon queued; waiting for the send-completion event.
    AwaitSendComplete,
    /// Beacon handled; decide how to approach the boundary.
    EvaluateWait,
    /// On time: waiting for the epoch timer.
    AwaitEpochEnd,
    /// Running fast: holding the boundary open for a computed delay.
    DelayingEpochEnd,
}

/// The epoch synchronizer state machine.
#[derive(Debug)]
pub struct SyncerTask {
    sync: EpochSync,
    state: SyncerState,
    epoch_timer: EpochTimer,
    send_timer: EpochTimer,
    delay_timer: EpochTimer,
    jitter: UniformRng,
    identity: NodeIdentity,
    wire: WireConfig,
    started: bool,
}

impl SyncerTask {
    /// Build the task; it stays inert until [`SyncerTask::start`].
    pub fn new(config: SyncConfig, wire: WireConfig, identity: NodeIdentity) -> Self {
        Self {
            sync: EpochSync::new(config),
            state: SyncerState::StartOfEpoch,
            epoch_timer: EpochTimer::new(),
            send_timer: EpochTimer::new(),
            delay_timer: EpochTimer::new(),
            jitter: UniformRng::from_seed(identity.sync_jitter_seed()),
            identity,
            wire,
            started: false,
        }
    }

    /// Arm the epoch clock and begin the first epoch at `now`.
    pub fn start(&mut self, now: Ticks) {
        assert!(!self.started, "syncer started twice");
        let interval = self.sync.timing().interval;
        info!(interval, "epoch timer started");
        self.epoch_timer.set(now, interval);
        self.sync
            .record_epoch_times(now, self.epoch_timer.expiration_time());
        self.started = true;
    }

    /// Whether [`SyncerTask::start`] has run.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The synchronizer core, for inspection.
    pub fn sync(&self) -> &EpochSync {
        &self.sync
    }

    /// Feed one received beacon frame in.
    pub fn on_frame(&mut self, now: Ticks, bytes: &[u8]) {
        if !self.started {
            return;
        }
        match SyncFrame::parse(self.wire, bytes) {
            Ok(frame) => {
                self.sync.observe(now, &frame);
            }
            Err(err) => {
                trace!(epoch = self.sync.epoch(), %err, "discarding corrupt sync beacon");
            }
        }
    }

    /// Send-completion for the beacon: release the radio.
    pub fn on_sent(&mut self, radio: &mut RadioArbiter) {
        if self.state == SyncerState::AwaitSendComplete {
            radio.unlock();
            self.state = SyncerState::EvaluateWait;
        }
    }

    /// Step the state machine, following transitions until it blocks.
    pub fn poll(
        &mut self,
        now: Ticks,
        radio: &mut RadioArbiter,
        link: &mut dyn BroadcastLink,
        signals: &mut Vec<SyncSignal>,
    ) {
        if !self.started {
            return;
        }

        loop {
            match self.state {
                SyncerState::StartOfEpoch => {
                    self.sync.at_epoch_start();
                    let timing = self.sync.timing();
                    let time_to_epoch_end = self.sync.epoch_end_time() - now;

                    // The beacon must not delay the boundary; when the
                    // end is already nearer than the send window, skip
                    // this epoch's beacon.
                    if time_to_epoch_end > timing.sync_start {
                        let mut send_wait = timing.sync_start
                            + self.jitter.next_below(timing.sync_xfer_interval() as u64) as Ticks;
                        if send_wait > time_to_epoch_end {
                            send_wait = timing.sync_start;
                        }
                        self.send_timer.set(now, send_wait);
                        self.state = SyncerState::AwaitSendSlot;
                    } else {
                        debug!(epoch = self.sync.epoch(), "skipping sync beacon");
                        self.state = SyncerState::EvaluateWait;
                    }
                }

                SyncerState::AwaitSendSlot => {
                    if !self.send_timer.expired(now) {
                        return;
                    }
                    self.state = SyncerState::AwaitRadio;
                }

                SyncerState::AwaitRadio => {
                    // Contention (or spin latency) can eat the rest of the
                    // window; sending after the boundary would tag the
                    // beacon with a stale epoch.
                    if now >= self.sync.epoch_end_time() {
                        debug!(epoch = self.sync.epoch(), "sync send window closed");
                        self.state = SyncerState::EvaluateWait;
                        continue;
                    }
                    if !radio.try_lock() {
                        return; // yield; retry on the next step
                    }
                    let beacon = self
                        .sync
                        .beacon(now, self.wire.sender_id.then_some(self.identity.id16));
                    link.send(SYNC_CHANNEL, &beacon.encode(self.wire));
                    self.state = SyncerState::AwaitSendComplete;
                }

                SyncerState::AwaitSendComplete => {
                    // Leaves via on_sent.
                    return;
                }

                SyncerState::EvaluateWait => {
                    if self.epoch_timer.expired(now) {
                        let late = now - self.sync.epoch_end_time();
                        if late > 0 {
                            trace!(epoch = self.sync.epoch(), late, "boundary processed late");
                        }
                        self.end_of_epoch(now, signals);
                        continue;
                    }
                    match self.sync.pre_wait_decision() {
                        EndOfEpochWait::WaitForTimer => {
                            self.state = SyncerState::AwaitEpochEnd;
                        }
                        EndOfEpochWait::EndNow => {
                            trace!(
                                epoch = self.sync.epoch(),
                                "running late, not waiting for end of epoch"
                            );
                            self.end_of_epoch(now, signals);
                            continue;
                        }
                        EndOfEpochWait::DelayBy(delay) => {
                            trace!(
                                epoch = self.sync.epoch(),
                                delay,
                                "running fast, delaying end of epoch"
                            );
                            let time_to_epoch_end = self.sync.epoch_end_time() - now;
                            self.delay_timer.set(now, time_to_epoch_end + delay);
                            self.sync.extend_epoch_end(delay);
                            self.state = SyncerState::DelayingEpochEnd;
                        }
                    }
                }

                SyncerState::AwaitEpochEnd => {
                    if !self.epoch_timer.expired(now) {
                        return;
                    }
                    self.end_of_epoch(now, signals);
                }

                SyncerState::DelayingEpochEnd => {
                    if !self.delay_timer.expired(now) {
                        return;
                    }
                    self.end_of_epoch(now, signals);
                }
            }
        }
    }

    /// Process the epoch boundary and re-enter `StartOfEpoch`.
    fn end_of_epoch(&mut self, now: Ticks, signals: &mut Vec<SyncSignal>) {
        trace!(epoch = self.sync.epoch(), "epoch ended");

        if let (Some(min), Some(max), Some(avg)) = (
            self.sync.stats().min(),
            self.sync.stats().max(),
            self.sync.stats().average(),
        ) {
            trace!(
                epoch = self.sync.epoch(),
                observations = self.sync.stats().count(),
                min,
                avg,
                max,
                "epoch offset statistics"
            );
        }

        if self.sync.at_sync_transition() {
            // Warm-up is over: tighten the timings once and let the
            // estimator start.
            self.sync.switch_to_steady();
            self.epoch_timer.stop();
            self.epoch_timer.set(now, self.sync.timing().interval);
            self.sync
                .record_epoch_times(now, self.epoch_timer.expiration_time());
            self.sync.increment_epoch();
            info!(epoch = self.sync.epoch(), "epoch clock synced");
            signals.push(SyncSignal::Synced);
        } else {
            // Phase-preserving re-arm, then the closed-loop correction
            // from this epoch's offset observations.
            if !self.epoch_timer.expired(now) {
                trace!(
                    epoch = self.sync.epoch(),
                    "boundary reached before timer expiry"
                );
            }
            self.epoch_timer.reset();
            self.sync
                .record_epoch_times(now, self.epoch_timer.expiration_time());
            self.sync.increment_epoch();
            if let Some(adjust) = self.sync.adjustment() {
                self.epoch_timer.adjust(adjust);
                self.sync
                    .record_epoch_times(now, self.epoch_timer.expiration_time());
            }
            if self.sync.past_warmup() {
                signals.push(SyncSignal::EpochEnded);
            }
        }

        self.state = SyncerState::StartOfEpoch;
    }
}
