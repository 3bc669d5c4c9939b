//! Header layout configuration.

use census_math::Fractional16;

/// Largest frame the link layer will carry, in bytes.
pub const LINK_MTU: usize = 112;

/// Optional header fields, fixed per deployment.
///
/// Both halves of a deployment must agree on this configuration: the
/// header layout and the payload budget are derived from it, so a mismatch
/// makes every frame unparseable (which the checksum then catches).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Prepend a CRC-16 over the whole frame. When present it is always
    /// the first header field and is computed with itself zeroed.
    pub checksum: bool,
    /// Carry the sending node's 16-bit id, for connectivity diagnostics.
    pub sender_id: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            checksum: true,
            sender_id: true,
        }
    }
}

impl WireConfig {
    /// Byte offset of the sender-id field (when present).
    pub(crate) const fn sender_id_offset(self) -> usize {
        if self.checksum {
            2
        } else {
            0
        }
    }

    /// Byte offset of the epoch field.
    pub(crate) const fn epoch_offset(self) -> usize {
        self.sender_id_offset() + if self.sender_id { 2 } else { 0 }
    }

    /// Split-frame header size: optional fields + epoch + sequence id +
    /// payload length.
    pub const fn split_header_len(self) -> usize {
        self.epoch_offset() + 2 + 1 + 1
    }

    /// Per-frame payload budget: whatever the MTU leaves after the header,
    /// rounded down to a whole number of cells.
    pub const fn split_payload_len(self) -> usize {
        let available = LINK_MTU - self.split_header_len();
        available - available % Fractional16::SIZE
    }

    /// Largest buffer a [`crate::FrameSplitter`] can fragment: the 8-bit
    /// sequence id caps a transfer at 256 frames.
    pub const fn max_split_data_len(self) -> usize {
        self.split_payload_len() * 256
    }

    /// Exact sync-frame size: optional fields + epoch + two 32-bit times.
    pub const fn sync_frame_len(self) -> usize {
        self.epoch_offset() + 2 + 4 + 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_budget_per_header_variant() {
        let both = WireConfig {
            checksum: true,
            sender_id: true,
        };
        assert_eq!(both.split_header_len(), 8);
        assert_eq!(both.split_payload_len(), 104);

        let checksum_only = WireConfig {
            checksum: true,
            sender_id: false,
        };
        assert_eq!(checksum_only.split_header_len(), 6);
        assert_eq!(checksum_only.split_payload_len(), 106);

        let sender_only = WireConfig {
            checksum: false,
            sender_id: true,
        };
        assert_eq!(sender_only.split_header_len(), 6);
        assert_eq!(sender_only.split_payload_len(), 106);

        let bare = WireConfig {
            checksum: false,
            sender_id: false,
        };
        assert_eq!(bare.split_header_len(), 4);
        assert_eq!(bare.split_payload_len(), 108);
    }

    #[test]
    fn frames_fit_the_mtu() {
        let cfg = WireConfig::default();
        assert!(cfg.split_header_len() + cfg.split_payload_len() <= LINK_MTU);
        assert!(cfg.sync_frame_len() <= LINK_MTU);
        assert_eq!(cfg.sync_frame_len(), 14);
    }
}
