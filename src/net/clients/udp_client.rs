use crate::net::clients::GenClient;
use crate::net::protocol::{Request, Response};
use anyhow::bail;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// A pixelflut client that uses UDP for communication with a pixelflut server.
///
/// Note that requests are not buffered or assembled into larger UDP packets in any way.
/// Instead, every request is sent as its own datagram.
///
/// Pixelflut servers never answer datagrams, so [`GenClient::await_response`] and
/// [`GenClient::exchange`] fail right away instead of waiting for a response that never comes.
#[derive(Debug)]
pub struct UdpClient {
    socket: UdpSocket,
}

impl UdpClient {
    /// Send raw bytes as one datagram to the server
    pub async fn send_raw(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.socket.send(data).await?;
        Ok(())
    }
}

#[async_trait]
impl GenClient for UdpClient {
    type ConnectionParam = SocketAddr;

    async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = if addr.is_ipv4() {
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?
        } else {
            UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await?
        };
        socket.connect(addr).await?;
        Ok(Self { socket })
    }

    async fn send_request(&mut self, request: Request) -> std::io::Result<()> {
        let mut buf = BytesMut::with_capacity(64).writer();
        request.write(&mut buf)?;
        self.send_raw(buf.get_ref()).await
    }

    async fn await_response(&mut self) -> anyhow::Result<Response> {
        bail!("pixelflut servers do not send responses over udp")
    }
}
