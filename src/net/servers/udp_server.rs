use crate::command_handler::SharedCommandHandler;
use crate::net::servers::GenServer;
use crate::DaemonResult;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::{AbortHandle, JoinSet};

/// Options with which the `UdpServer` is configured
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UdpServerOptions {
    /// The address to which the server binds
    pub bind_addr: SocketAddr,
}

/// A server implementation using UDP to receive pixelflut messages.
///
/// Every datagram carries exactly one request (everything after the first newline is ignored).
///
/// *Note*: This server **never** sends data back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UdpServer {
    options: UdpServerOptions,
}

impl UdpServer {
    /// Start `n` receiver tasks that share one socket
    pub async fn start_many(
        self,
        handler: SharedCommandHandler,
        n: usize,
        join_set: &mut JoinSet<DaemonResult>,
    ) -> anyhow::Result<Vec<AbortHandle>> {
        let socket = Arc::new(UdpSocket::bind(self.options.bind_addr).await?);
        tracing::info!(
            "Started UDP Server on {} with {} tasks",
            self.options.bind_addr,
            n
        );
        let handles = (0..n)
            .map(|_| {
                let handler = handler.clone();
                let socket = socket.clone();
                join_set.spawn(async move { UdpServer::listen(handler, socket).await })
            })
            .collect();
        Ok(handles)
    }

    #[tracing::instrument(skip_all)]
    async fn listen(handler: SharedCommandHandler, socket: Arc<UdpSocket>) -> DaemonResult {
        loop {
            // fill a buffer from the network
            let mut req_buf = BytesMut::with_capacity(4 * 1024);
            let (_, sender) = socket.recv_buf_from(&mut req_buf).await?;

            // process the received command in the background
            let handler = handler.clone();
            tokio::spawn(async move { Self::handle_datagram(sender, req_buf.freeze(), handler) });
        }
    }

    #[tracing::instrument(skip_all, fields(remote = _sender.to_string()))]
    fn handle_datagram(_sender: SocketAddr, buf: Bytes, handler: SharedCommandHandler) {
        tracing::trace!("Received {}B UDP datagram: {:?}", buf.len(), buf);

        let line = match buf.iter().position(|&b| b == b'\n') {
            Some(i) => buf.slice(..i),
            None => buf,
        };
        if let Err(e) = handler.handle_request(&line) {
            tracing::trace!("Dropping failed UDP request: {e}");
        }
    }
}

#[async_trait]
impl GenServer for UdpServer {
    type Options = UdpServerOptions;

    fn new(options: Self::Options) -> Self {
        Self { options }
    }

    async fn start(
        self,
        handler: SharedCommandHandler,
        join_set: &mut JoinSet<DaemonResult>,
    ) -> anyhow::Result<AbortHandle> {
        let socket = Arc::new(UdpSocket::bind(self.options.bind_addr).await?);
        tracing::info!("Started UDP Server on {}", self.options.bind_addr);

        let handle = join_set.spawn(async move { UdpServer::listen(handler, socket).await });
        Ok(handle)
    }
}
