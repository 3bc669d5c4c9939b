//! Census wire formats
//!
//! Byte-exact encodings for the two frame kinds census nodes broadcast:
//!
//! - **Split frames** ([`FrameSplitter`], [`SplitFrame`]): a large buffer
//!   (the consensus matrix snapshot) fragmented into MTU-sized checksummed
//!   frames, reassembled positionally from an 8-bit sequence id.
//! - **Sync frames** ([`SyncFrame`]): the epoch synchronizer's periodic
//!   timing beacon.
//!
//! Header layout is governed by a [`WireConfig`]: the optional checksum
//! and sender-id fields change both the header size and the per-frame
//! payload budget, and every derived constant comes from the config rather
//! than being duplicated. All fields are little-endian. Parsing is
//! explicit byte-offset extraction; nothing overlays structs on raw
//! buffers.
//!
//! Corruption handling is deliberately quiet: a frame that fails length or
//! checksum validation is an expected loss event on a broadcast radio, and
//! the consensus layer is built to tolerate it.

mod checksum;
mod config;
mod error;
mod split;
mod sync;

pub use checksum::{crc16, seal_frame_checksum, verify_frame_checksum};
pub use config::{WireConfig, LINK_MTU};
pub use error::WireError;
pub use split::{FrameSplitter, SplitFrame};
pub use sync::SyncFrame;

use census_math::Fractional16;

// Every header variant must leave a payload budget that is a whole number
// of matrix cells, or fragment boundaries would split a cell across
// frames.
const _: () = {
    let mut checksum = 0;
    while checksum < 2 {
        let mut sender = 0;
        while sender < 2 {
            let cfg = WireConfig {
                checksum: checksum == 1,
                sender_id: sender == 1,
            };
            assert!(cfg.split_payload_len() % Fractional16::SIZE == 0);
            assert!(cfg.split_payload_len() > 0);
            assert!(cfg.split_payload_len() <= 255);
            sender += 1;
        }
        checksum += 1;
    }
};
