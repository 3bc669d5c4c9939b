//! The real-clock node driver.

use std::time::Duration;

use census_node::{BroadcastLink, ChannelId, Clock, LinkEvent, Node, NodeEvent};
use census_sync::TICKS_PER_SECOND;
use tracing::debug;

use crate::{MonotonicClock, UdpLink};

/// Collects the node's sends during one tick so they can be flushed
/// through the async socket afterwards.
#[derive(Default)]
struct Outbox {
    sends: Vec<(ChannelId, Vec<u8>)>,
}

impl BroadcastLink for Outbox {
    fn send(&mut self, channel: ChannelId, frame: &[u8]) {
        self.sends.push((channel, frame.to_vec()));
    }
}

/// Drive a node over UDP on the wall clock until the task is cancelled.
///
/// Each iteration drains received datagrams, steps the node once with
/// them, reports its events through `on_event`, and flushes the outbox —
/// completions are fed back on the following tick, mirroring a radio
/// whose send-done interrupt arrives after the MAC finishes.
pub async fn run_node(
    mut node: Node,
    link: UdpLink,
    mut on_event: impl FnMut(NodeEvent),
) -> anyhow::Result<()> {
    let clock = MonotonicClock::new();
    node.start(clock.now());

    let tick = Duration::from_micros(1_000_000 / TICKS_PER_SECOND as u64);
    let mut ticker = tokio::time::interval(tick);
    let mut pending: Vec<LinkEvent> = Vec::new();

    loop {
        ticker.tick().await;
        let now = clock.now();

        while let Some((channel, frame)) = link.try_recv_frame() {
            pending.push(LinkEvent::Received { channel, frame });
        }

        let mut outbox = Outbox::default();
        let events = node.tick(now, &mut outbox, std::mem::take(&mut pending));
        for event in events {
            on_event(event);
        }

        for (channel, frame) in outbox.sends {
            if let Err(err) = link.send_frame(channel, &frame).await {
                // Broadcast is best-effort; a failed send is a lost
                // frame, not a reason to stop the node.
                debug!(%err, "frame send failed");
            }
            pending.push(LinkEvent::Sent { channel });
        }
    }
}
