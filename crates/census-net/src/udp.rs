//! The UDP socket wrapper.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use census_node::ChannelId;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct UdpLinkConfig {
    /// Address to bind to.
    pub bind: SocketAddr,
    /// Peers every frame is sent to.
    pub peers: Vec<SocketAddr>,
    /// Send buffer size in bytes.
    pub sndbuf: usize,
    /// Receive buffer size in bytes.
    pub rcvbuf: usize,
}

impl Default for UdpLinkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:7400".parse().unwrap(),
            peers: Vec::new(),
            sndbuf: 1024 * 1024,
            rcvbuf: 1024 * 1024,
        }
    }
}

/// A bound UDP endpoint carrying census frames.
pub struct UdpLink {
    socket: Arc<UdpSocket>,
    peers: Vec<SocketAddr>,
}

impl UdpLink {
    /// Bind with configured buffer sizes and broadcast permission.
    pub async fn bind(cfg: UdpLinkConfig) -> anyhow::Result<Self> {
        let domain = if cfg.bind.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        // Buffer sizes must be set before binding.
        socket.set_send_buffer_size(cfg.sndbuf)?;
        socket.set_recv_buffer_size(cfg.rcvbuf)?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;

        socket.bind(&cfg.bind.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket)?;

        tracing::info!(
            bind = %cfg.bind,
            peers = cfg.peers.len(),
            "census UDP link bound"
        );

        Ok(Self {
            socket: Arc::new(tokio_socket),
            peers: cfg.peers,
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Broadcast one frame to every configured peer.
    pub async fn send_frame(&self, channel: ChannelId, frame: &[u8]) -> anyhow::Result<()> {
        let mut datagram = BytesMut::with_capacity(1 + frame.len());
        datagram.put_u8(channel.0);
        datagram.put_slice(frame);

        for peer in &self.peers {
            self.socket.send_to(&datagram, peer).await?;
        }
        Ok(())
    }

    /// Wait for the next frame.
    pub async fn recv_frame(&self) -> anyhow::Result<(ChannelId, Vec<u8>)> {
        let mut buf = vec![0u8; 2048];
        loop {
            let (len, _from) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue; // channel byte missing
            }
            return Ok((ChannelId(buf[0]), buf[1..len].to_vec()));
        }
    }

    /// Non-blocking receive, for the driver loop.
    pub fn try_recv_frame(&self) -> Option<(ChannelId, Vec<u8>)> {
        let mut buf = [0u8; 2048];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, _from)) if len > 0 => Some((ChannelId(buf[0]), buf[1..len].to_vec())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_node::SYNC_CHANNEL;

    async fn ephemeral() -> UdpLink {
        UdpLink::bind(UdpLinkConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn bind_assigns_a_port() {
        let link = ephemeral().await;
        assert!(link.local_addr().unwrap().port() > 0);
    }

    #[tokio::test]
    async fn frames_cross_the_loopback() {
        let receiver = ephemeral().await;
        let recv_addr = receiver.local_addr().unwrap();

        let sender = UdpLink::bind(UdpLinkConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            peers: vec![recv_addr],
            ..Default::default()
        })
        .await
        .unwrap();

        sender.send_frame(SYNC_CHANNEL, b"beacon").await.unwrap();

        let (channel, frame) = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            receiver.recv_frame(),
        )
        .await
        .expect("datagram within timeout")
        .unwrap();

        assert_eq!(channel, SYNC_CHANNEL);
        assert_eq!(frame, b"beacon");
    }
}
