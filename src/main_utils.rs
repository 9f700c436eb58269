use crate::cli;
use crate::cli::TargetDimension;
use anyhow::{anyhow, bail};
use bytes::buf::Writer;
use bytes::{BufMut, BytesMut};
use pixelcanvas::net::clients::{GenClient, TcpClient};
#[cfg(feature = "udp")]
use pixelcanvas::net::clients::UdpClient;
use pixelcanvas::net::protocol::{Request, Response};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Port that is used when a url does not specify one
pub const DEFAULT_PORT: u16 = 1234;

/// Resolve the socket address that is described by a `scheme://host[:port]` url
pub fn resolve_url(url: &Url) -> anyhow::Result<SocketAddr> {
    url.socket_addrs(|| Some(DEFAULT_PORT))?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{url} does not resolve to any address"))
}

/// A client for any of the supported transport protocols
#[derive(Debug)]
pub enum DynClient {
    Tcp(TcpClient),
    #[cfg(feature = "udp")]
    Udp(UdpClient),
}

impl DynClient {
    pub async fn connect(url: &Url) -> anyhow::Result<Self> {
        tracing::info!("Connecting to pixelflut server at {}", url);
        let addr = resolve_url(url)?;
        match url.scheme() {
            "tcp" => Ok(Self::Tcp(TcpClient::connect(addr).await?)),
            #[cfg(feature = "udp")]
            "udp" => Ok(Self::Udp(UdpClient::connect(addr).await?)),
            scheme => bail!("Unsupported url scheme {}", scheme),
        }
    }

    /// Run a generic client loop that fills its command buffer from the provided function.
    ///
    /// `fill_buf` should be a function that fills the provided buffer with pixelflut commands.
    /// It is given `x_min, x_max, y_min, y_max` as additional arguments so that commands can be generated for the right
    /// dimensions.
    ///
    /// If `requires_buf_refresh` is true, then the command is filled per iteration of the client loop.
    /// Otherwise it is only filled once.
    pub async fn run_loop<F>(
        mut self,
        fill_buf: F,
        opts: &cli::CommonClientOps,
        requires_buf_refresh: bool,
    ) -> anyhow::Result<()>
    where
        F: Fn(&mut Writer<BytesMut>, usize, usize, usize, usize) -> std::io::Result<()>,
    {
        // preparation
        let canvas_size = self.get_size().await?;
        let (x_min, x_max, y_min, y_max) = calc_bounds(canvas_size, opts)?;
        let mut buf = BytesMut::new().writer();

        tracing::info!("Preparing command buffer");
        fill_buf(&mut buf, x_min, x_max, y_min, y_max)?;

        // main loop
        tracing::info!("Running client loop");
        loop {
            // send whole buffer to server (using the most performant method available)
            tracing::debug!("Sending prepared commands to server");
            match &mut self {
                DynClient::Tcp(tcp) => {
                    tcp.get_writer().write_all(buf.get_ref()).await?;
                    tcp.flush().await?;
                }
                #[cfg(feature = "udp")]
                DynClient::Udp(udp) => {
                    // servers only read the first line of each datagram
                    for line in buf.get_ref().split_inclusive(|&b| b == b'\n') {
                        udp.send_raw(line).await?;
                    }
                }
            }

            // abort loop if only one iteration is requested
            if !opts.do_loop {
                return Ok(());
            }

            // refresh buffer content if required
            if requires_buf_refresh {
                buf.get_mut().clear();
                fill_buf(&mut buf, x_min, x_max, y_min, y_max)?;
            }
        }
    }

    /// Get the remote canvas's size
    ///
    /// UDP servers never answer so the size is unknown for them.
    async fn get_size(&mut self) -> anyhow::Result<Option<(usize, usize)>> {
        let client = match self {
            DynClient::Tcp(tcp) => tcp,
            #[cfg(feature = "udp")]
            DynClient::Udp(_) => return Ok(None),
        };
        let Response::Size { width, height } = client.exchange(Request::GetSize).await? else {
            bail!("Server sent invalid response to size request")
        };
        tracing::info!(
            "Successfully exchanged metadata with pixelflut server (width={}, height={})",
            width,
            height
        );
        Ok(Some((width, height)))
    }
}

/// Determine the end of one axis of the rectangle
fn calc_axis_end(
    axis: &str,
    offset: usize,
    dimension: TargetDimension,
    canvas_len: Option<usize>,
) -> anyhow::Result<usize> {
    match (dimension, canvas_len) {
        (TargetDimension::Fill, Some(canvas_len)) => Ok(canvas_len),
        (TargetDimension::Fill, None) => {
            bail!("the canvas {axis} is not known so the rectangle {axis} must be given explicitly")
        }
        (TargetDimension::Specific(len), Some(canvas_len)) if offset + len > canvas_len => bail!(
            "given {axis} {len} combined with offset {offset} is outside of the servers canvas {axis} {canvas_len}"
        ),
        (TargetDimension::Specific(len), _) => Ok(offset + len),
    }
}

/// Determine effective bounds from cli args as well as remote canvas size
///
/// Returns `(x_min, x_max, y_min, y_max)`
pub fn calc_bounds(
    canvas_size: Option<(usize, usize)>,
    opts: &cli::CommonClientOps,
) -> anyhow::Result<(usize, usize, usize, usize)> {
    if let Some((canvas_width, canvas_height)) = canvas_size {
        if opts.x_offset >= canvas_width {
            bail!(
                "given x-offset {} is outside of servers canvas with width {}",
                opts.x_offset,
                canvas_width
            );
        }
        if opts.y_offset >= canvas_height {
            bail!(
                "given y-offset {} is outside of servers canvas with height {}",
                opts.y_offset,
                canvas_height
            );
        }
    }

    let x_max = calc_axis_end("width", opts.x_offset, opts.width, canvas_size.map(|s| s.0))?;
    let y_max = calc_axis_end("height", opts.y_offset, opts.height, canvas_size.map(|s| s.1))?;
    Ok((opts.x_offset, x_max, opts.y_offset, y_max))
}

#[cfg(test)]
mod test {
    use super::*;

    fn opts(width: TargetDimension, height: TargetDimension, x: usize, y: usize) -> cli::CommonClientOps {
        cli::CommonClientOps {
            server: Url::parse("tcp://127.0.0.1").unwrap(),
            width,
            height,
            x_offset: x,
            y_offset: y,
            do_loop: false,
        }
    }

    #[test]
    fn test_resolve_url_uses_default_port() {
        let addr = resolve_url(&Url::parse("tcp://127.0.0.1").unwrap()).unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)));
        let addr = resolve_url(&Url::parse("udp://127.0.0.1:4321").unwrap()).unwrap();
        assert_eq!(addr.port(), 4321);
    }

    #[test]
    fn test_calc_bounds() {
        use TargetDimension::*;
        assert_eq!(
            calc_bounds(Some((800, 600)), &opts(Fill, Fill, 0, 0)).unwrap(),
            (0, 800, 0, 600)
        );
        assert_eq!(
            calc_bounds(Some((800, 600)), &opts(Specific(100), Fill, 700, 10)).unwrap(),
            (700, 800, 10, 600)
        );
        assert!(calc_bounds(Some((800, 600)), &opts(Specific(101), Fill, 700, 0)).is_err());
        assert!(calc_bounds(Some((800, 600)), &opts(Fill, Fill, 800, 0)).is_err());
        assert!(calc_bounds(None, &opts(Fill, Specific(10), 0, 0)).is_err());
        assert_eq!(
            calc_bounds(None, &opts(Specific(10), Specific(20), 5, 5)).unwrap(),
            (5, 15, 5, 25)
        );
    }
}
