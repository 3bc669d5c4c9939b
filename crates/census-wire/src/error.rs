//! Wire-level parse errors.
//!
//! These describe frames that arrived damaged or inconsistent. They are
//! never escalated past the receive path: broadcast loss is the normal
//! operating regime and the consensus algorithm absorbs it.

use thiserror::Error;

/// Why a received frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// Shorter than the fixed header.
    #[error("frame too short: {len} bytes")]
    Truncated {
        /// Received length.
        len: usize,
    },

    /// Frame length disagrees with the declared payload length.
    #[error("frame length {len} does not match declared payload {declared}")]
    LengthMismatch {
        /// Received length.
        len: usize,
        /// Payload length the header declared.
        declared: usize,
    },

    /// Stored and recomputed CRC differ.
    #[error("checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame.
        stored: u16,
        /// Checksum recomputed over the zeroed-field frame.
        computed: u16,
    },
}
