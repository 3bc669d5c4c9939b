//! Census epoch synchronization
//!
//! Keeps every node's epoch boundaries aligned despite independent clocks
//! and variable radio delay. Once per epoch each node broadcasts a timing
//! beacon at a random instant inside a sync window; receivers turn each
//! beacon into an estimated clock offset, average the offsets at the
//! epoch boundary, and feed half the negative average back into the next
//! epoch timer — a simple proportional controller that converges in a
//! handful of epochs and then holds the network within a tick or two.
//!
//! Offset classification depends on how far apart two nodes are:
//!
//! - sender behind us: ignored, slower nodes adjust to faster ones;
//! - sender one epoch ahead: our remaining time plus its elapsed time;
//! - sender further ahead: a coarse whole-epoch correction;
//! - same epoch: the time-to-end difference, linearly extrapolated to the
//!   epoch boundary.
//!
//! The first [`SyncConfig::epochs_until_synced`] epochs run on coarser
//! warm-up timings; after that the node switches to steady-state timings
//! once, signals "synced", and starts driving the estimator.
//!
//! This crate holds the pure synchronization logic — epoch bookkeeping,
//! offset statistics and the control law. The task state machine that
//! owns the timers and the radio lives in `census-node`.

mod offsets;
mod syncer;
mod timing;

pub use offsets::OffsetStats;
pub use syncer::{EndOfEpochWait, EpochSync};
pub use timing::{EpochTiming, SyncConfig};

/// Kernel time, in ticks of the node's monotonic clock.
pub type Ticks = i64;

/// Tick rate of the node clock.
pub const TICKS_PER_SECOND: Ticks = 128;
