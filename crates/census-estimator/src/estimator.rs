//! Per-epoch sampling, gossip folding and sufficient statistics.

use census_math::{Fractional16, Fractional48};
use census_rng::UniformRng;
use census_wire::{FrameSplitter, SplitFrame, WireConfig};
use tracing::{debug, info, trace};

use crate::ConsensusWindow;

/// Window dimensions of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorParams {
    /// Samples drawn per column at each epoch (M).
    pub rows: usize,
    /// Columns of epoch history kept in the window (D).
    pub cols: usize,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self { rows: 100, cols: 7 }
    }
}

/// One epoch's sufficient statistics: the per-column product of all M
/// cell values, tagged with the epoch they were computed for.
///
/// Aggregated off-node, `-M*D / sum(ln p_k)` estimates the network size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SufficientStats {
    /// Epoch the statistics summarize.
    pub epoch: i16,
    /// One product per window column.
    pub columns: Vec<Fractional48>,
}

impl SufficientStats {
    /// Off-node aggregation: recover the network-size estimate.
    ///
    /// Each consensus cell is the maximum of one uniform sample per
    /// reachable node; `E[ln max] = -1/N`, so the log of a column's
    /// M-cell product concentrates at `-M/N` and
    /// `N ≈ -M*D / sum(ln p_k)`. This runs on the collector, not on the
    /// nodes, and uses floating point freely.
    pub fn estimate_size(&self, rows: usize) -> f64 {
        let log_sum: f64 = self.columns.iter().map(|s| s.ln()).sum();
        -((rows * self.columns.len()) as f64) / log_sum
    }
}

/// The max-consensus size estimator.
///
/// Holds the sliding sample window, the per-epoch transmit snapshot with
/// its embedded [`FrameSplitter`], and the node's deterministic sample
/// stream. Mutated from two directions that the cooperative scheduler
/// keeps from overlapping: the owning task at epoch boundaries and the
/// receive path whenever gossip frames arrive.
#[derive(Debug)]
pub struct SizeEstimator {
    params: EstimatorParams,
    wire: WireConfig,
    enabled: bool,
    epoch: i16,
    window: ConsensusWindow,
    splitter: FrameSplitter,
    tx_snapshot: Vec<u8>,
    rng: UniformRng,
    min_seq_seen: u16,
    max_seq_seen: u16,
}

impl SizeEstimator {
    /// Build an estimator and fill its window with fresh samples.
    ///
    /// Starts enabled, mirroring the node boot path; `rng` must be the
    /// node's own seeded stream so matrices differ between nodes.
    pub fn new(params: EstimatorParams, wire: WireConfig, rng: UniformRng) -> Self {
        assert!(params.rows > 0 && params.cols > 0, "degenerate window");

        info!(
            rows = params.rows,
            cols = params.cols,
            "size estimator initialized"
        );

        let window = ConsensusWindow::new(params.rows, params.cols);
        let mut estimator = Self {
            params,
            wire,
            enabled: false,
            epoch: 0,
            window,
            splitter: FrameSplitter::new(wire),
            tx_snapshot: Vec::new(),
            rng,
            min_seq_seen: u16::MAX,
            max_seq_seen: 0,
        };
        estimator.fill_window();
        estimator.enabled = true;
        estimator
    }

    /// Whether the estimator participates in the current epoch.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The estimator's current epoch.
    pub fn epoch(&self) -> i16 {
        self.epoch
    }

    /// The window dimensions.
    pub fn params(&self) -> EstimatorParams {
        self.params
    }

    /// Read access to the sample window, for diagnostics and tests.
    pub fn window(&self) -> &ConsensusWindow {
        &self.window
    }

    /// Skip the epoch counter forward, aligning with the synchronizer's
    /// warm-up count before the first active epoch.
    pub fn jump_to_epoch(&mut self, nr_epochs: i16) {
        let new_epoch = self.epoch + nr_epochs;
        info!(from = self.epoch, to = new_epoch, "jumping epoch");
        self.epoch = new_epoch;
    }

    /// Resume participation. Requires the estimator to be disabled.
    ///
    /// The whole window is refilled with fresh samples: data folded in
    /// while disabled is stale across epochs and must not leak into new
    /// statistics.
    pub fn enable(&mut self) {
        assert!(!self.enabled, "estimator already enabled");
        self.fill_window();
        self.enabled = true;
    }

    /// Suspend participation. Requires the estimator to be enabled.
    ///
    /// Subsequent epoch boundaries only advance the epoch counter, and
    /// received gossip is ignored.
    pub fn disable(&mut self) {
        assert!(self.enabled, "estimator already disabled");
        self.enabled = false;
    }

    /// Run the epoch boundary.
    ///
    /// While disabled this only advances the epoch counter. Enabled, it
    /// computes the D per-column sufficient statistics over the
    /// consensus-folded window, ages the oldest column out, resamples the
    /// fresh column, re-snapshots the transmit buffer and re-arms the
    /// splitter for the new epoch.
    pub fn at_epoch_start(&mut self) -> Option<SufficientStats> {
        if !self.enabled {
            self.epoch += 1;
            return None;
        }

        if self.min_seq_seen <= self.max_seq_seen {
            trace!(
                epoch = self.epoch,
                min = self.min_seq_seen,
                max = self.max_seq_seen,
                "received consensus fragment range"
            );
        }

        let columns: Vec<Fractional48> = (0..self.params.cols)
            .map(|col| {
                let mut cells = self.window.column(col);
                let first = cells.next().expect("window has at least one row");
                let mut product = Fractional48::from_fixpoint(first.to_fixpoint());
                for cell in cells {
                    product.mul_fixpoint(cell.to_fixpoint());
                }
                product
            })
            .collect();
        let stats = SufficientStats {
            epoch: self.epoch,
            columns,
        };

        self.epoch += 1;
        self.window.shift();
        self.resample_column(0);
        self.window.snapshot_to(&mut self.tx_snapshot);
        self.splitter.begin(self.epoch, self.tx_snapshot.len());
        self.min_seq_seen = u16::MAX;
        self.max_seq_seen = 0;

        Some(stats)
    }

    /// Bytes of the current snapshot not yet queued for transmission.
    pub fn pending_bytes(&self) -> usize {
        self.splitter.remaining()
    }

    /// Queue the next gossip fragment of this epoch's snapshot.
    ///
    /// Returns the encoded frame and the byte count still remaining.
    pub fn queue_frame(&mut self, sender_id: u16) -> (Vec<u8>, usize) {
        self.splitter.queue(&self.tx_snapshot, sender_id)
    }

    /// Fold one received gossip frame into the window.
    ///
    /// Ignored entirely while disabled. Corrupt frames and frames from a
    /// different epoch are discarded quietly; both are routine on a lossy
    /// broadcast channel.
    pub fn absorb_frame(&mut self, bytes: &[u8]) {
        if !self.enabled {
            return;
        }

        let frame = match SplitFrame::parse(self.wire, bytes) {
            Ok(frame) => frame,
            Err(err) => {
                trace!(epoch = self.epoch, %err, "discarding corrupt consensus frame");
                return;
            }
        };

        if frame.epoch != self.epoch {
            debug!(
                ours = self.epoch,
                theirs = frame.epoch,
                "discarding consensus frame from another epoch"
            );
            return;
        }

        // Every fragment but the last carries exactly payload_len bytes,
        // and the matrix is always sent in storage order, so the sequence
        // id alone fixes the fold position.
        let cells_per_frame = self.wire.split_payload_len() / Fractional16::SIZE;
        let start_cell = usize::from(frame.seq) * cells_per_frame;
        let incoming = frame
            .payload
            .chunks_exact(Fractional16::SIZE)
            .map(|pair| Fractional16::from_le_bytes([pair[0], pair[1]]));
        self.window.merge_max(start_cell, incoming);

        self.min_seq_seen = self.min_seq_seen.min(u16::from(frame.seq));
        self.max_seq_seen = self.max_seq_seen.max(u16::from(frame.seq));
    }

    fn fill_window(&mut self) {
        for col in 0..self.params.cols {
            self.resample_column(col);
        }
        self.window.snapshot_to(&mut self.tx_snapshot);
    }

    fn resample_column(&mut self, col: usize) {
        for cell in self.window.column_mut(col) {
            *cell = Fractional16::from_fixpoint(self.rng.next_fixpoint());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_math::Fixpoint32;

    fn estimator(rows: usize, cols: usize) -> SizeEstimator {
        SizeEstimator::new(
            EstimatorParams { rows, cols },
            WireConfig::default(),
            UniformRng::from_seed(0xACE1),
        )
    }

    /// Recompute one column's product independently through the public
    /// window accessor.
    fn column_product(est: &SizeEstimator, col: usize) -> Fractional48 {
        let mut product: Option<Fractional48> = None;
        for row in 0..est.params().rows {
            let fix = est.window().get(row, col).to_fixpoint();
            match product.as_mut() {
                None => product = Some(Fractional48::from_fixpoint(fix)),
                Some(acc) => acc.mul_fixpoint(fix),
            }
        }
        product.unwrap()
    }

    #[test]
    fn starts_enabled_with_filled_window() {
        let est = estimator(4, 3);
        assert!(est.is_enabled());
        assert_eq!(est.epoch(), 0);
        // All 12 cells sampled; overwhelmingly unlikely any is zero.
        let nonzero = (0..3)
            .flat_map(|c| (0..4).map(move |r| (r, c)))
            .filter(|&(r, c)| est.window().get(r, c).to_bits() != 0)
            .count();
        assert!(nonzero >= 10);
    }

    #[test]
    fn isolated_epoch_emits_one_stat_per_column() {
        let mut est = estimator(100, 7);
        let stats = est.at_epoch_start().expect("enabled estimator");
        assert_eq!(stats.epoch, 0);
        assert_eq!(stats.columns.len(), 7);
        for stat in &stats.columns {
            assert!(!stat.is_zero());
            // A product of 100 values below one is far below one.
            assert!(stat.exponent() < 0);
        }
        assert_eq!(est.epoch(), 1);
    }

    #[test]
    fn statistics_match_independent_recomputation() {
        let mut est = estimator(50, 4);
        let expected: Vec<Fractional48> = (0..4).map(|c| column_product(&est, c)).collect();
        let stats = est.at_epoch_start().unwrap();
        assert_eq!(stats.columns, expected);
    }

    #[test]
    fn epoch_start_rotates_and_resamples() {
        let mut est = estimator(3, 2);
        let old_col0: Vec<Fractional16> = est.window().column(0).collect();

        est.at_epoch_start().unwrap();

        // The old column 0 is now column 1; column 0 holds fresh samples.
        let new_col1: Vec<Fractional16> = est.window().column(1).collect();
        assert_eq!(new_col1, old_col0);
        let new_col0: Vec<Fractional16> = est.window().column(0).collect();
        assert_ne!(new_col0, old_col0);
    }

    #[test]
    fn disabled_estimator_only_counts_epochs() {
        let mut est = estimator(5, 3);
        est.disable();
        assert!(est.at_epoch_start().is_none());
        assert!(est.at_epoch_start().is_none());
        assert_eq!(est.epoch(), 2);
    }

    #[test]
    fn jump_aligns_epoch_counter() {
        let mut est = estimator(2, 2);
        est.jump_to_epoch(10);
        assert_eq!(est.epoch(), 10);
        let stats = est.at_epoch_start().unwrap();
        assert_eq!(stats.epoch, 10);
        assert_eq!(est.epoch(), 11);
    }

    #[test]
    #[should_panic(expected = "already enabled")]
    fn double_enable_panics() {
        let mut est = estimator(2, 2);
        est.enable();
    }

    #[test]
    #[should_panic(expected = "already disabled")]
    fn double_disable_panics() {
        let mut est = estimator(2, 2);
        est.disable();
        est.disable();
    }

    #[test]
    fn transmit_covers_whole_snapshot() {
        let mut est = estimator(100, 7);
        est.at_epoch_start().unwrap();

        let byte_len = est.window().byte_len();
        let payload = WireConfig::default().split_payload_len();
        let expected_frames = byte_len.div_ceil(payload);

        let mut frames = 0;
        loop {
            let (frame, remaining) = est.queue_frame(1);
            frames += 1;
            assert!(!frame.is_empty());
            if remaining == 0 {
                break;
            }
        }
        assert_eq!(frames, expected_frames);
        assert_eq!(est.pending_bytes(), 0);
    }

    #[test]
    fn gossip_folds_element_wise_maximum() {
        let params = EstimatorParams { rows: 10, cols: 2 };
        let wire = WireConfig::default();
        let mut a = SizeEstimator::new(params, wire, UniformRng::from_seed(0xA));
        let mut b = SizeEstimator::new(params, wire, UniformRng::from_seed(0xB));
        a.at_epoch_start().unwrap();
        b.at_epoch_start().unwrap();
        assert_eq!(a.epoch(), b.epoch());

        // Exchange full snapshots in both directions.
        loop {
            let (frame, remaining) = a.queue_frame(0xA);
            b.absorb_frame(&frame);
            if remaining == 0 {
                break;
            }
        }
        loop {
            let (frame, remaining) = b.queue_frame(0xB);
            a.absorb_frame(&frame);
            if remaining == 0 {
                break;
            }
        }

        for col in 0..2 {
            for row in 0..10 {
                assert_eq!(a.window().get(row, col), b.window().get(row, col));
            }
        }

        // Consensus reached: the next statistics agree on every column.
        let stats_a = a.at_epoch_start().unwrap();
        let stats_b = b.at_epoch_start().unwrap();
        assert_eq!(stats_a.columns, stats_b.columns);
    }

    #[test]
    fn size_estimate_inverts_the_log_product() {
        // One column holding exactly 2^-20: ln p = -20 ln 2, so a window
        // of 100 rows estimates 100 / (20 ln 2).
        let stats = SufficientStats {
            epoch: 0,
            columns: vec![Fractional48::from_fixpoint(Fixpoint32::from_bits(
                1 << 12,
            ))],
        };
        let expected = 100.0 / (20.0 * std::f64::consts::LN_2);
        assert!((stats.estimate_size(100) - expected).abs() < 1e-9);
    }

    #[test]
    fn stale_epoch_frames_are_ignored() {
        let params = EstimatorParams { rows: 4, cols: 2 };
        let wire = WireConfig::default();
        let mut a = SizeEstimator::new(params, wire, UniformRng::from_seed(0xA));
        let mut b = SizeEstimator::new(params, wire, UniformRng::from_seed(0xB));
        a.at_epoch_start().unwrap();
        b.at_epoch_start().unwrap();
        b.at_epoch_start().unwrap(); // b is now one epoch ahead

        let before: Vec<Fractional16> = b.window().column(0).collect();
        let (frame, _) = a.queue_frame(0xA);
        b.absorb_frame(&frame);
        let after: Vec<Fractional16> = b.window().column(0).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn corrupt_frames_are_ignored() {
        let mut est = estimator(4, 2);
        est.at_epoch_start().unwrap();
        let (mut frame, _) = est.queue_frame(7);
        frame[5] ^= 0xFF;

        let before: Vec<Fractional16> = est.window().column(0).collect();
        est.absorb_frame(&frame);
        let after: Vec<Fractional16> = est.window().column(0).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn disabled_estimator_ignores_gossip() {
        let params = EstimatorParams { rows: 4, cols: 2 };
        let wire = WireConfig::default();
        let mut a = SizeEstimator::new(params, wire, UniformRng::from_seed(0xA));
        let mut b = SizeEstimator::new(params, wire, UniformRng::from_seed(0xB));
        a.at_epoch_start().unwrap();
        b.at_epoch_start().unwrap();

        b.disable();
        let (frame, _) = a.queue_frame(0xA);
        let before: Vec<Fractional16> = b.window().column(0).collect();
        b.absorb_frame(&frame);
        let after: Vec<Fractional16> = b.window().column(0).collect();
        assert_eq!(before, after);
    }
}
