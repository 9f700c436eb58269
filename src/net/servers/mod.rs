//! Server implementations for different transport protocols

mod gen_server;

pub use gen_server::GenServer;

#[cfg(feature = "tcp")]
mod tcp_server;
#[cfg(feature = "udp")]
mod udp_server;
#[cfg(feature = "ws")]
mod ws_server;

#[cfg(feature = "tcp")]
pub use tcp_server::{TcpServer, TcpServerOptions};
#[cfg(feature = "udp")]
pub use udp_server::{UdpServer, UdpServerOptions};
#[cfg(feature = "ws")]
pub use ws_server::{WsServer, WsServerOptions};
