use crate::command_handler::{write_outcome, CommandHandler, SharedCommandHandler};
use crate::net::protocol::Response;
use crate::net::servers::GenServer;
use crate::DaemonResult;
use async_trait::async_trait;
use bytes::buf::Writer;
use bytes::{BufMut, BytesMut};
use std::io::Write;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinSet};

/// Longest line that is buffered while waiting for its terminating newline
const MAX_LINE_LEN: usize = 64;

/// Amount of accumulated responses after which they are sent to the client
const MAX_RESP_BUF_LEN: usize = 64 * 1024;

/// Options with which the `TcpServer` is configured
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TcpServerOptions {
    /// The address to which the server binds
    pub bind_addr: SocketAddr,
}

/// A server implementation using TCP to transport pixelflut messages.
#[derive(Debug, Copy, Clone)]
pub struct TcpServer {
    options: TcpServerOptions,
}

impl TcpServer {
    #[tracing::instrument(skip_all)]
    async fn handle_listener(listener: TcpListener, handler: SharedCommandHandler) -> DaemonResult {
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = TcpServer::handle_connection(stream, remote_addr, handler).await {
                    tracing::warn!("Got error while handling tcp connection: {e}");
                }
            });
        }
    }

    #[tracing::instrument(skip_all, fields(remote = _remote_addr.to_string()))]
    async fn handle_connection(
        mut stream: TcpStream,
        _remote_addr: SocketAddr,
        handler: SharedCommandHandler,
    ) -> anyhow::Result<()> {
        tracing::debug!("Client connected");

        let mut req_buf = BytesMut::with_capacity(8 * 1024);
        let mut resp_buf = BytesMut::with_capacity(2 * 1024).writer();
        loop {
            // fill the line buffer from the network
            let n = stream.read_buf(&mut req_buf).await?;
            if n == 0 {
                tracing::debug!("Client stream exhausted, likely disconnected");
                return Ok(());
            }
            tracing::trace!("Received {}KiB stream data: {:?}", n / 1024, req_buf);

            // handle all lines contained in the buffer
            answer_lines(&handler, &mut req_buf, &mut resp_buf, &mut stream).await?;

            // clear the buffer if someone is deliberately not sending a newline
            if req_buf.len() > MAX_LINE_LEN {
                tracing::warn!(
                    "Request buffer has {}B but no lines left in it. Client is probably misbehaving.",
                    req_buf.len()
                );
                req_buf.clear();
                resp_buf.write_all(b"line too long\n")?;
            }

            // write accumulated responses back to the sender
            flush_responses(&mut resp_buf, &mut stream).await?;
        }
    }
}

/// Answer every complete line in *req_buf*, leaving an incomplete trailing line in it
///
/// Small responses are collected in *resp_buf* and sent once they reach `MAX_RESP_BUF_LEN`.
/// `STATE` lines are written to *stream* from the shared cache without being copied into the batch.
async fn answer_lines(
    handler: &CommandHandler,
    req_buf: &mut BytesMut,
    resp_buf: &mut Writer<BytesMut>,
    stream: &mut (impl AsyncWrite + Unpin),
) -> std::io::Result<()> {
    while let Some(i) = req_buf.iter().position(|&b| b == b'\n') {
        let line = req_buf.split_to(i + 1);
        match handler.handle_request(&line) {
            Ok(Response::State(state)) => {
                // earlier responses must arrive first
                flush_responses(resp_buf, stream).await?;
                stream.write_all(state.as_line()).await?;
            }
            outcome => write_outcome(&outcome, resp_buf)?,
        }

        if resp_buf.get_ref().len() >= MAX_RESP_BUF_LEN {
            flush_responses(resp_buf, stream).await?;
        }
    }
    Ok(())
}

async fn flush_responses(
    resp_buf: &mut Writer<BytesMut>,
    stream: &mut (impl AsyncWrite + Unpin),
) -> std::io::Result<()> {
    if !resp_buf.get_ref().is_empty() {
        tracing::trace!(
            "Sending back {}KiB response: {:?}",
            resp_buf.get_ref().len() / 1024,
            resp_buf.get_ref()
        );
        stream.write_all_buf(resp_buf.get_mut()).await?;
    }
    Ok(())
}

#[async_trait]
impl GenServer for TcpServer {
    type Options = TcpServerOptions;

    fn new(options: Self::Options) -> Self {
        Self { options }
    }

    async fn start(
        self,
        handler: SharedCommandHandler,
        join_set: &mut JoinSet<DaemonResult>,
    ) -> anyhow::Result<AbortHandle> {
        let listener = TcpListener::bind(self.options.bind_addr).await?;
        tracing::info!("Started TCP Server on {}", self.options.bind_addr);

        let handle = join_set.spawn(async move { TcpServer::handle_listener(listener, handler).await });
        Ok(handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canvas::{Canvas, Color};
    use crate::command_handler::CommandHandler;
    use crate::net::clients::{GenClient, TcpClient};
    use crate::net::protocol::{Request, Response, StateEncodingAlgorithm};
    use crate::state_encoding::StateCache;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Discards everything written to it but counts the bytes
    #[derive(Debug, Default)]
    struct CountingSink {
        written: usize,
    }

    impl AsyncWrite for CountingSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.written += buf.len();
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn start_test_server(width: usize, height: usize) -> (SocketAddr, JoinSet<DaemonResult>) {
        let canvas = Arc::new(Canvas::new(width, height).unwrap());
        let states = Arc::new(StateCache::new(&canvas));
        let handler = Arc::new(CommandHandler::new(canvas, states));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut join_set = JoinSet::new();
        join_set.spawn(async move { TcpServer::handle_listener(listener, handler).await });
        (addr, join_set)
    }

    #[tokio::test]
    async fn test_pipelined_requests() {
        let (addr, mut join_set) = start_test_server(800, 600).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"SIZE\nPX 0 0 ABCDEF\nPX 0 0\nPX 9999 9999 000000\npx 1 1\n")
            .await
            .unwrap();

        let mut reader = BufReader::new(stream);
        let mut lines = Vec::new();
        for _ in 0..5 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            lines.push(line);
        }
        assert_eq!(lines[0], "SIZE 800 600\n");
        assert_eq!(lines[1], "PX 0 0 ABCDEF\n");
        assert_eq!(lines[2], "PX 0 0 ABCDEF\n");
        assert!(lines[3].contains("not inside the canvas"), "{}", lines[3]);
        assert_eq!(lines[4], "PX 1 1 000000\n");

        join_set.shutdown().await;
    }

    #[tokio::test]
    async fn test_pipelined_states_are_not_buffered() {
        let canvas = Arc::new(Canvas::new(800, 600).unwrap());
        let states = Arc::new(StateCache::new(&canvas));
        let state_len = states.get_state(StateEncodingAlgorithm::Rgba64).as_line().len();
        let handler = CommandHandler::new(canvas, states);

        // one full read worth of STATE requests
        let mut req_buf = BytesMut::new();
        let n = 8 * 1024 / b"STATE rgba64\n".len();
        for _ in 0..n {
            req_buf.extend_from_slice(b"STATE rgba64\n");
        }
        let mut resp_buf = BytesMut::with_capacity(2 * 1024).writer();
        let mut sink = CountingSink::default();
        answer_lines(&handler, &mut req_buf, &mut resp_buf, &mut sink)
            .await
            .unwrap();

        assert!(req_buf.is_empty());
        assert_eq!(sink.written, n * state_len);
        assert!(resp_buf.get_ref().capacity() <= MAX_RESP_BUF_LEN);
    }

    #[tokio::test]
    async fn test_small_responses_are_sent_in_bounded_batches() {
        let handler = {
            let canvas = Arc::new(Canvas::new(8, 8).unwrap());
            let states = Arc::new(StateCache::new(&canvas));
            CommandHandler::new(canvas, states)
        };

        let mut req_buf = BytesMut::new();
        for _ in 0..20_000 {
            req_buf.extend_from_slice(b"SIZE\n");
        }
        let mut resp_buf = BytesMut::with_capacity(2 * 1024).writer();
        let mut sink = CountingSink::default();
        answer_lines(&handler, &mut req_buf, &mut resp_buf, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.written + resp_buf.get_ref().len(), 20_000 * b"SIZE 8 8\n".len());
        assert!(resp_buf.get_ref().len() < MAX_RESP_BUF_LEN);
    }

    #[tokio::test]
    async fn test_state_keeps_response_order() {
        let (addr, mut join_set) = start_test_server(1, 1).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"PX 0 0 112233\nSTATE\nSIZE\nSTATE rgba64\nPX 0 0\n")
            .await
            .unwrap();

        let mut reader = BufReader::new(stream);
        let mut lines = Vec::new();
        for _ in 0..5 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            lines.push(line);
        }
        assert_eq!(lines[0], "PX 0 0 112233\n");
        assert!(lines[1].starts_with("STATE rgb64 "), "{}", lines[1]);
        assert_eq!(lines[2], "SIZE 1 1\n");
        assert!(lines[3].starts_with("STATE rgba64 "), "{}", lines[3]);
        assert_eq!(lines[4], "PX 0 0 112233\n");

        join_set.shutdown().await;
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (addr, mut join_set) = start_test_server(8, 8).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[b'A'; MAX_LINE_LEN + 1]).await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "line too long\n");

        // the connection is still usable afterwards
        reader.get_mut().write_all(b"SIZE\n").await.unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "SIZE 8 8\n");

        join_set.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_exchange() {
        let (addr, mut join_set) = start_test_server(16, 16).await;
        let mut client = TcpClient::connect(addr).await.unwrap();

        let color = Color(0x12, 0x34, 0x56);
        assert_eq!(
            client.exchange(Request::SetPixel { x: 3, y: 4, color }).await.unwrap(),
            Response::PxData { x: 3, y: 4, color }
        );
        assert_eq!(
            client.exchange(Request::GetPixel { x: 3, y: 4 }).await.unwrap(),
            Response::PxData { x: 3, y: 4, color }
        );
        assert_eq!(
            client.exchange(Request::GetSize).await.unwrap(),
            Response::Size { width: 16, height: 16 }
        );

        join_set.shutdown().await;
    }
}
