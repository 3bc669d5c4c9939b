//! Census max-consensus size estimator
//!
//! Each node keeps an M×D window of uniform samples: one column drawn per
//! epoch, D epochs of history. During an epoch every node gossips its
//! window over local broadcast and folds whatever it hears back in by
//! element-wise maximum. Because the maximum of N independent uniforms
//! concentrates near `N/(N+1)`, the per-column product of M max-consensus
//! cells — the sufficient statistic — carries the network size, which an
//! off-node collector recovers from the statistics stream.
//!
//! The algorithm is loss-tolerant by construction: a dropped fragment
//! merely delays convergence of a few cells, and redundant broadcasts from
//! other nodes are the retry mechanism.
//!
//! [`ConsensusWindow`] is the rotating sample matrix; [`SizeEstimator`]
//! drives sampling, fragmentation and folding per epoch.

mod estimator;
mod window;

pub use estimator::{EstimatorParams, SizeEstimator, SufficientStats};
pub use window::ConsensusWindow;
