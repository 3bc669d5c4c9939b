//! The epoch synchronizer's timing beacon.

use crate::checksum::{seal_frame_checksum, verify_frame_checksum};
use crate::{WireConfig, WireError};

/// One epoch-sync broadcast: where the sender stands in its current epoch.
///
/// Times are in kernel ticks, measured at send time. Receivers combine
/// them with their own epoch position to estimate the mutual clock offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncFrame {
    /// Sending node id, when the wire format carries one.
    pub sender_id: Option<u16>,
    /// The sender's current epoch.
    pub epoch: i16,
    /// Ticks elapsed since the sender's epoch started.
    pub time_from_epoch_start: i32,
    /// Ticks until the sender's epoch ends.
    pub time_to_epoch_end: i32,
}

impl SyncFrame {
    /// Encode for transmission.
    ///
    /// The sender-id presence must match the wire configuration; a
    /// mismatch is a programming error.
    pub fn encode(&self, cfg: WireConfig) -> Vec<u8> {
        assert_eq!(
            cfg.sender_id,
            self.sender_id.is_some(),
            "sender id presence must match wire config"
        );

        let mut frame = vec![0u8; cfg.sync_frame_len()];
        if let Some(id) = self.sender_id {
            let off = cfg.sender_id_offset();
            frame[off..off + 2].copy_from_slice(&id.to_le_bytes());
        }
        let off = cfg.epoch_offset();
        frame[off..off + 2].copy_from_slice(&self.epoch.to_le_bytes());
        frame[off + 2..off + 6].copy_from_slice(&self.time_from_epoch_start.to_le_bytes());
        frame[off + 6..off + 10].copy_from_slice(&self.time_to_epoch_end.to_le_bytes());

        if cfg.checksum {
            seal_frame_checksum(&mut frame);
        }
        frame
    }

    /// Validate and decode a received beacon.
    ///
    /// Sync frames have a fixed size; anything else is corruption.
    pub fn parse(cfg: WireConfig, bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != cfg.sync_frame_len() {
            return Err(WireError::LengthMismatch {
                len: bytes.len(),
                declared: cfg.sync_frame_len(),
            });
        }
        if cfg.checksum {
            verify_frame_checksum(bytes)?;
        }

        let sender_id = cfg.sender_id.then(|| {
            let off = cfg.sender_id_offset();
            u16::from_le_bytes([bytes[off], bytes[off + 1]])
        });
        let off = cfg.epoch_offset();

        Ok(Self {
            sender_id,
            epoch: i16::from_le_bytes([bytes[off], bytes[off + 1]]),
            time_from_epoch_start: i32::from_le_bytes([
                bytes[off + 2],
                bytes[off + 3],
                bytes[off + 4],
                bytes[off + 5],
            ]),
            time_to_epoch_end: i32::from_le_bytes([
                bytes[off + 6],
                bytes[off + 7],
                bytes[off + 8],
                bytes[off + 9],
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cfg = WireConfig::default();
        let frame = SyncFrame {
            sender_id: Some(0x1234),
            epoch: 7,
            time_from_epoch_start: 613,
            time_to_epoch_end: 667,
        };
        let bytes = frame.encode(cfg);
        assert_eq!(bytes.len(), cfg.sync_frame_len());
        assert_eq!(SyncFrame::parse(cfg, &bytes).unwrap(), frame);
    }

    #[test]
    fn round_trip_without_optional_fields() {
        let cfg = WireConfig {
            checksum: false,
            sender_id: false,
        };
        let frame = SyncFrame {
            sender_id: None,
            epoch: -3,
            time_from_epoch_start: 0,
            time_to_epoch_end: i32::MAX,
        };
        let bytes = frame.encode(cfg);
        assert_eq!(bytes.len(), 10);
        assert_eq!(SyncFrame::parse(cfg, &bytes).unwrap(), frame);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let cfg = WireConfig::default();
        assert!(matches!(
            SyncFrame::parse(cfg, &[0u8; 13]),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn corruption_is_rejected() {
        let cfg = WireConfig::default();
        let mut bytes = SyncFrame {
            sender_id: Some(1),
            epoch: 2,
            time_from_epoch_start: 3,
            time_to_epoch_end: 4,
        }
        .encode(cfg);
        bytes[6] ^= 0x80;
        assert!(matches!(
            SyncFrame::parse(cfg, &bytes),
            Err(WireError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "sender id presence")]
    fn sender_id_mismatch_panics() {
        let cfg = WireConfig::default();
        let _ = SyncFrame {
            sender_id: None,
            epoch: 0,
            time_from_epoch_start: 0,
            time_to_epoch_end: 0,
        }
        .encode(cfg);
    }
}
