//! One census node: both tasks, the radio arbiter and the event routing.

use census_estimator::{EstimatorParams, SufficientStats};
use census_sync::{SyncConfig, Ticks};
use census_wire::WireConfig;
use tracing::trace;

use crate::{
    BroadcastLink, EstimatorTask, LinkEvent, NodeIdentity, RadioArbiter, SyncSignal, SyncerTask,
    CONSENSUS_CHANNEL, SYNC_CHANNEL,
};

/// Everything a node needs to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// Frame header layout.
    pub wire: WireConfig,
    /// Epoch timing and the offset controller.
    pub sync: SyncConfig,
    /// Consensus window dimensions.
    pub estimator: EstimatorParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wire: WireConfig::default(),
            sync: SyncConfig::default(),
            estimator: EstimatorParams::default(),
        }
    }
}

/// What a node surfaces to its host per step.
///
/// These are the node's named signals: downstream consumers (a serial
/// logger, the simulation's collector) wait on them.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// The epoch clock reached steady state. Fired once.
    Synced,
    /// A steady-state epoch ended.
    EpochEnded,
    /// Sufficient statistics for a completed epoch.
    Stats(SufficientStats),
}

/// A complete census node.
///
/// The host drives it with [`Node::tick`] from a single-threaded event
/// loop, handing in the link events that arrived since the previous step.
/// Everything else — timers, radio arbitration, epoch signals — happens
/// inside.
#[derive(Debug)]
pub struct Node {
    identity: NodeIdentity,
    syncer: SyncerTask,
    estimator: EstimatorTask,
    radio: RadioArbiter,
}

impl Node {
    /// Build a node. The configuration is validated here; a bad one is a
    /// deployment error and panics.
    pub fn new(identity: NodeIdentity, config: NodeConfig) -> Self {
        config.sync.validate();
        Self {
            identity,
            syncer: SyncerTask::new(config.sync, config.wire, identity),
            estimator: EstimatorTask::new(config.estimator, config.wire, config.sync, identity),
            radio: RadioArbiter::new(),
        }
    }

    /// The node's identity.
    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    /// Whether the epoch clock is running.
    pub fn is_started(&self) -> bool {
        self.syncer.is_started()
    }

    /// Start the epoch clock at `now`.
    pub fn start(&mut self, now: Ticks) {
        self.syncer.start(now);
    }

    /// The synchronizer task, for inspection.
    pub fn syncer(&self) -> &SyncerTask {
        &self.syncer
    }

    /// The estimator task, for inspection and enable/disable control.
    pub fn estimator(&self) -> &EstimatorTask {
        &self.estimator
    }

    /// Mutable access to the estimator task.
    pub fn estimator_mut(&mut self) -> &mut EstimatorTask {
        &mut self.estimator
    }

    /// One event-loop step.
    ///
    /// Routes the link events that arrived since the last step (receive
    /// handling runs here, between task steps, preserving the
    /// no-preemption invariant), then steps the synchronizer, delivers
    /// its signals to the estimator, and steps the estimator.
    pub fn tick(
        &mut self,
        now: Ticks,
        link: &mut dyn BroadcastLink,
        events: Vec<LinkEvent>,
    ) -> Vec<NodeEvent> {
        let mut out = Vec::new();
        if !self.syncer.is_started() {
            return out;
        }

        for event in events {
            match event {
                LinkEvent::Received { channel, frame } => match channel {
                    SYNC_CHANNEL => self.syncer.on_frame(now, &frame),
                    CONSENSUS_CHANNEL => self.estimator.on_frame(&frame),
                    other => trace!(channel = other.0, "frame on unknown channel"),
                },
                LinkEvent::Sent { channel } => match channel {
                    SYNC_CHANNEL => self.syncer.on_sent(&mut self.radio),
                    CONSENSUS_CHANNEL => self.estimator.on_sent(now, &mut self.radio, link),
                    other => trace!(channel = other.0, "completion on unknown channel"),
                },
            }
        }

        let mut signals = Vec::new();
        self.syncer.poll(now, &mut self.radio, link, &mut signals);
        for signal in signals {
            out.push(match signal {
                SyncSignal::Synced => NodeEvent::Synced,
                SyncSignal::EpochEnded => NodeEvent::EpochEnded,
            });
            if let Some(stats) = self.estimator.on_signal(now, signal, &mut self.radio) {
                out.push(NodeEvent::Stats(stats));
            }
        }

        self.estimator.poll(now, &mut self.radio, link);
        out
    }
}
