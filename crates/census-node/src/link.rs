//! The broadcast link collaborator.

/// A logical broadcast channel, multiplexed over one radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u8);

/// Channel carrying epoch-sync beacons.
pub const SYNC_CHANNEL: ChannelId = ChannelId(0x81);

/// Channel carrying consensus matrix fragments.
pub const CONSENSUS_CHANNEL: ChannelId = ChannelId(0x82);

/// Events the link driver feeds into [`crate::Node::tick`].
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A frame arrived on a channel.
    Received {
        /// Channel the frame arrived on.
        channel: ChannelId,
        /// Raw frame bytes, unvalidated.
        frame: Vec<u8>,
    },
    /// A previously queued transmission completed (successfully or after
    /// the MAC gave up; either way the radio is free again).
    Sent {
        /// Channel the transmission was queued on.
        channel: ChannelId,
    },
}

/// Outbound half of the broadcast transport.
///
/// `send` queues one frame for best-effort broadcast; the driver reports
/// completion later with [`LinkEvent::Sent`]. At most one frame is in
/// flight per node, enforced by the radio arbiter, so drivers need no
/// queueing discipline.
pub trait BroadcastLink {
    /// Queue a frame for broadcast on a channel.
    fn send(&mut self, channel: ChannelId, frame: &[u8]);
}
