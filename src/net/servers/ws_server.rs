use crate::command_handler::SharedCommandHandler;
use crate::net::servers::GenServer;
use crate::DaemonResult;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinSet};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;

/// The WebSocket sub-protocol that clients need to request
const SUBPROTOCOL: &str = "pixelflut";

const BINARY_REJECTION: &str = "invalid message received. send a text message\n";

/// Options with which the `WsServer` is configured
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WsServerOptions {
    /// The address to which the server binds
    pub bind_addr: SocketAddr,
}

/// A server implementation using WebSocket to transport pixelflut messages
///
/// Every text message is one request and is answered with exactly one text message.
#[derive(Debug, Copy, Clone)]
pub struct WsServer {
    options: WsServerOptions,
}

/// Handshake callback which only accepts clients that offer the pixelflut sub-protocol
fn negotiate_subprotocol(request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    let offered = request
        .headers()
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|protocol| protocol.trim() == SUBPROTOCOL);

    if offered {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        Ok(response)
    } else {
        tracing::debug!("Rejecting WebSocket client which does not speak {SUBPROTOCOL}");
        let mut error = ErrorResponse::new(Some(format!(
            "The {SUBPROTOCOL} sub-protocol must be requested via {SEC_WEBSOCKET_PROTOCOL}"
        )));
        *error.status_mut() = StatusCode::BAD_REQUEST;
        Err(error)
    }
}

impl WsServer {
    #[tracing::instrument(skip_all)]
    async fn handle_listener(listener: TcpListener, handler: SharedCommandHandler) -> DaemonResult {
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = WsServer::handle_connection(stream, remote_addr, handler).await {
                    tracing::warn!("Got error while handling WebSocket connection: {e}");
                }
            });
        }
    }

    #[tracing::instrument(skip_all, fields(remote = _remote_addr.to_string()))]
    async fn handle_connection(
        stream: TcpStream,
        _remote_addr: SocketAddr,
        handler: SharedCommandHandler,
    ) -> anyhow::Result<()> {
        tracing::debug!("Client connected; performing WebSocket handshake");
        let mut stream = tokio_tungstenite::accept_hdr_async(stream, negotiate_subprotocol).await?;

        while let Some(msg) = stream.next().await {
            match msg? {
                Message::Text(request) => {
                    let response = handler.dispatch(request.as_bytes());
                    tracing::trace!("Sending back {}B response", response.len());
                    stream
                        .send(Message::Text(String::from_utf8_lossy(&response).into_owned()))
                        .await?;
                }
                Message::Binary(_) => {
                    stream.send(Message::Text(BINARY_REJECTION.to_owned())).await?;
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }

        tracing::debug!("Client disconnected");
        Ok(())
    }
}

#[async_trait]
impl GenServer for WsServer {
    type Options = WsServerOptions;

    fn new(options: Self::Options) -> Self {
        Self { options }
    }

    async fn start(
        self,
        handler: SharedCommandHandler,
        join_set: &mut JoinSet<DaemonResult>,
    ) -> anyhow::Result<AbortHandle> {
        let listener = TcpListener::bind(self.options.bind_addr).await?;
        tracing::info!("Started WebSocket Server on {}", self.options.bind_addr);

        let handle = join_set.spawn(async move { WsServer::handle_listener(listener, handler).await });
        Ok(handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canvas::Canvas;
    use crate::command_handler::CommandHandler;
    use crate::state_encoding::StateCache;
    use std::sync::Arc;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    async fn start_test_server() -> (SocketAddr, JoinSet<DaemonResult>) {
        let canvas = Arc::new(Canvas::new(800, 600).unwrap());
        let states = Arc::new(StateCache::new(&canvas));
        let handler = Arc::new(CommandHandler::new(canvas, states));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut join_set = JoinSet::new();
        join_set.spawn(async move { WsServer::handle_listener(listener, handler).await });
        (addr, join_set)
    }

    #[tokio::test]
    async fn test_text_messages_are_requests() {
        let (addr, mut join_set) = start_test_server().await;
        let mut request = format!("ws://{addr}/").into_client_request().unwrap();
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        let (mut ws, response) = tokio_tungstenite::connect_async(request).await.unwrap();
        assert_eq!(
            response.headers().get(SEC_WEBSOCKET_PROTOCOL),
            Some(&HeaderValue::from_static(SUBPROTOCOL))
        );

        ws.send(Message::Text("SIZE".to_owned())).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("SIZE 800 600\n".to_owned()));

        ws.send(Message::Text("PX 1 2 ABCDEF\n".to_owned())).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("PX 1 2 ABCDEF\n".to_owned()));

        ws.send(Message::Binary(b"PX 1 2\n".to_vec())).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text(BINARY_REJECTION.to_owned()));

        ws.close(None).await.unwrap();
        join_set.shutdown().await;
    }

    #[tokio::test]
    async fn test_handshake_requires_subprotocol() {
        let (addr, mut join_set) = start_test_server().await;
        let result = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await;
        assert!(result.is_err());
        join_set.shutdown().await;
    }
}
