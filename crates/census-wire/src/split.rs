//! Buffer fragmentation into sequence-numbered frames.

use crate::checksum::{seal_frame_checksum, verify_frame_checksum};
use crate::{WireConfig, WireError};

/// Fragments one buffer per epoch into MTU-sized frames.
///
/// Re-armed with [`FrameSplitter::begin`] at every epoch boundary and
/// drained by exactly `ceil(len / payload)` calls to
/// [`FrameSplitter::queue`]. The splitter tracks only cursor state; the
/// buffer itself is borrowed per call so the caller keeps ownership of its
/// snapshot.
#[derive(Debug)]
pub struct FrameSplitter {
    cfg: WireConfig,
    epoch: i16,
    next_seq: u16,
    queued: usize,
    remaining: usize,
}

impl FrameSplitter {
    /// An idle splitter; arm it with [`FrameSplitter::begin`].
    pub fn new(cfg: WireConfig) -> Self {
        Self {
            cfg,
            epoch: 0,
            next_seq: 0,
            queued: 0,
            remaining: 0,
        }
    }

    /// Arm the splitter over a buffer of `data_len` bytes tagged with
    /// `epoch`.
    ///
    /// Panics on an empty buffer or one that would need more than 256
    /// frames: both are dimensioning errors, not runtime conditions.
    pub fn begin(&mut self, epoch: i16, data_len: usize) {
        assert!(data_len > 0, "cannot split an empty buffer");
        assert!(
            data_len.div_ceil(self.cfg.split_payload_len()) <= 256,
            "buffer needs more than 256 frames"
        );

        self.epoch = epoch;
        self.next_seq = 0;
        self.queued = 0;
        self.remaining = data_len;
    }

    /// Bytes not yet emitted.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Emit the next frame from `data`.
    ///
    /// Returns the encoded frame and the byte count still remaining after
    /// it (zero signals completion). Calling on a drained splitter is a
    /// programming error and panics.
    pub fn queue(&mut self, data: &[u8], sender_id: u16) -> (Vec<u8>, usize) {
        assert!(self.remaining > 0, "queue called after completion");
        debug_assert!(data.len() >= self.queued + self.remaining);

        let cfg = self.cfg;
        let payload_len = cfg.split_payload_len().min(self.remaining);
        let header_len = cfg.split_header_len();

        let mut frame = vec![0u8; header_len + payload_len];
        if cfg.sender_id {
            let off = cfg.sender_id_offset();
            frame[off..off + 2].copy_from_slice(&sender_id.to_le_bytes());
        }
        let epoch_off = cfg.epoch_offset();
        frame[epoch_off..epoch_off + 2].copy_from_slice(&self.epoch.to_le_bytes());
        frame[epoch_off + 2] = self.next_seq as u8;
        frame[epoch_off + 3] = payload_len as u8;
        frame[header_len..].copy_from_slice(&data[self.queued..self.queued + payload_len]);

        if cfg.checksum {
            seal_frame_checksum(&mut frame);
        }

        self.queued += payload_len;
        self.remaining -= payload_len;
        self.next_seq += 1;

        (frame, self.remaining)
    }
}

/// A parsed view over one received split frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitFrame<'a> {
    /// Sending node id, when the wire format carries one.
    pub sender_id: Option<u16>,
    /// Epoch the fragment belongs to.
    pub epoch: i16,
    /// Position of this fragment in the transfer.
    pub seq: u8,
    /// Fragment payload.
    pub payload: &'a [u8],
}

impl<'a> SplitFrame<'a> {
    /// Validate and decode a received frame.
    ///
    /// Checks the minimum length, the checksum (over the zeroed-field
    /// frame) and that the received length matches the declared payload.
    pub fn parse(cfg: WireConfig, bytes: &'a [u8]) -> Result<Self, WireError> {
        let header_len = cfg.split_header_len();
        if bytes.len() <= header_len {
            return Err(WireError::Truncated { len: bytes.len() });
        }
        if cfg.checksum {
            verify_frame_checksum(bytes)?;
        }

        let epoch_off = cfg.epoch_offset();
        let declared = usize::from(bytes[epoch_off + 3]);
        if bytes.len() != header_len + declared {
            return Err(WireError::LengthMismatch {
                len: bytes.len(),
                declared,
            });
        }

        let sender_id = cfg.sender_id.then(|| {
            let off = cfg.sender_id_offset();
            u16::from_le_bytes([bytes[off], bytes[off + 1]])
        });

        Ok(Self {
            sender_id,
            epoch: i16::from_le_bytes([bytes[epoch_off], bytes[epoch_off + 1]]),
            seq: bytes[epoch_off + 2],
            payload: &bytes[header_len..],
        })
    }
}
