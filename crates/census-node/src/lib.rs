//! Census node runtime
//!
//! Wires the epoch synchronizer and the size estimator into one node,
//! structured for a single-threaded cooperative event loop: each task is
//! an explicit state machine that suspends only at documented points —
//! waiting for a timer, for a send-completion, for the radio lock, or for
//! an epoch signal. The driver (a simulation or a real transport) feeds
//! link events in and steps [`Node::tick`]; receive handling therefore
//! always runs *between* task steps, never concurrently with them, which
//! is what lets the estimator's window be shared between its task and the
//! receive path without locking.
//!
//! The collaborator surface mirrors the embedded original: a monotonic
//! tick [`Clock`], a phase-preserving [`EpochTimer`], a [`BroadcastLink`]
//! with send-completion events, a stable [`NodeIdentity`], and the
//! [`RadioArbiter`] that keeps the two tasks from interleaving
//! transmissions.

mod clock;
mod estimator_task;
mod identity;
mod link;
mod node;
mod radio;
mod syncer_task;
mod timer;

pub use clock::Clock;
pub use estimator_task::EstimatorTask;
pub use identity::NodeIdentity;
pub use link::{BroadcastLink, ChannelId, LinkEvent, CONSENSUS_CHANNEL, SYNC_CHANNEL};
pub use node::{Node, NodeConfig, NodeEvent};
pub use radio::RadioArbiter;
pub use syncer_task::{SyncSignal, SyncerTask};
pub use timer::EpochTimer;
