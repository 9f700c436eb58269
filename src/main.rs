use anyhow::{anyhow, bail};
use bytes::buf::Writer;
use bytes::BytesMut;
use clap::Parser;
use itertools::Itertools;
use rand::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use crate::cli::{CliOpts, TargetColor};
use crate::main_utils::{resolve_url, DynClient};
use pixelcanvas::canvas::{Canvas, Color};
use pixelcanvas::command_handler::{CommandHandler, SharedCommandHandler};
use pixelcanvas::net::protocol::Request;
use pixelcanvas::net::servers::{GenServer, TcpServer, TcpServerOptions};
#[cfg(feature = "udp")]
use pixelcanvas::net::servers::{UdpServer, UdpServerOptions};
#[cfg(feature = "ws")]
use pixelcanvas::net::servers::{WsServer, WsServerOptions};
use pixelcanvas::sinks::snapshot::{load_or_blank, FileSink, FileSinkOptions};
use pixelcanvas::state_encoding::{start_encoder, StateCache};
use pixelcanvas::DaemonResult;

mod cli;
mod main_utils;

/// Number of tasks that receive from one UDP socket
#[cfg(feature = "udp")]
const UDP_TASKS: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::CliOpts::parse();
    init_logger(&args);

    match &args.command {
        cli::Command::Server(opts) => start_server(opts).await,
        cli::Command::PutRectangle(opts) => put_rectangle(opts).await,
    }
}

#[inline]
fn init_logger(args: &CliOpts) {
    // determine combined log level from cli arguments
    const DEFAULT_LEVEL: u8 = 3;
    let log_level = match DEFAULT_LEVEL
        .saturating_add(args.verbose)
        .saturating_sub(args.quiet)
    {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // configure appropriate level filter
    // tokio is very spammy on higher log levels which is usually not interesting so we filter it out
    let filter = filter::Targets::new()
        .with_default(log_level)
        .with_target("tokio", Ord::min(LevelFilter::WARN, log_level))
        .with_target("runtime", Ord::min(LevelFilter::WARN, log_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

async fn start_server(opts: &cli::ServerOpts) -> anyhow::Result<()> {
    // create a canvas or load an existing snapshot
    let canvas = match &opts.file_opts.snapshot_file {
        Some(path) if !opts.file_opts.new => load_or_blank(path, opts.width, opts.height).await?,
        _ => Canvas::new(opts.width, opts.height)?,
    };
    let canvas = Arc::new(canvas);
    let states = Arc::new(StateCache::new(&canvas));
    let handler = Arc::new(CommandHandler::new(canvas.clone(), states.clone()));

    let mut join_set: JoinSet<DaemonResult> = JoinSet::new();

    // keep the encodings served via STATE up to date
    start_encoder(
        states,
        canvas.clone(),
        Duration::from_millis(opts.state_interval_ms),
        &mut join_set,
    );

    // configure snapshotting
    if let Some(path) = &opts.file_opts.snapshot_file {
        let sink = FileSink::new(
            FileSinkOptions {
                path: path.to_owned(),
                interval: Duration::from_secs(opts.file_opts.snapshot_interval_secs),
            },
            canvas.clone(),
        );
        sink.start(&mut join_set)?;
    }

    for url in &opts.listen {
        start_listener(url, handler.clone(), &mut join_set).await?;
    }

    // wait until one tasks exits
    let result = match join_set.join_next().await {
        None => anyhow!("No background task was started"),
        Some(Err(e)) => anyhow!("Could not join background task: {e}"),
        Some(Ok(Err(e))) => e,
        Some(Ok(Ok(never))) => match never {},
    };
    tracing::error!("A background task exited unexpectedly: {}", result);

    // cancel all other tasks
    join_set.shutdown().await;
    Err(result)
}

async fn start_listener(
    url: &Url,
    handler: SharedCommandHandler,
    join_set: &mut JoinSet<DaemonResult>,
) -> anyhow::Result<()> {
    let bind_addr = resolve_url(url)?;
    match url.scheme() {
        "tcp" => {
            TcpServer::new(TcpServerOptions { bind_addr })
                .start(handler, join_set)
                .await?;
        }
        #[cfg(feature = "udp")]
        "udp" => {
            UdpServer::new(UdpServerOptions { bind_addr })
                .start_many(handler, UDP_TASKS, join_set)
                .await?;
        }
        #[cfg(feature = "ws")]
        "ws" => {
            WsServer::new(WsServerOptions { bind_addr })
                .start(handler, join_set)
                .await?;
        }
        scheme => bail!("Unsupported listen url scheme {scheme:?} in {url}"),
    }
    Ok(())
}

async fn put_rectangle(opts: &cli::PutRectangleData) -> anyhow::Result<()> {
    let once_color = Color::from((random(), random(), random()));
    let fill_buf = |buf: &mut Writer<BytesMut>,
                    x_min: usize,
                    x_max: usize,
                    y_min: usize,
                    y_max: usize|
     -> std::io::Result<()> {
        // select a color
        let color = match opts.color {
            TargetColor::RandomOnce => once_color,
            TargetColor::RandomPerIteration => Color::from((random(), random(), random())),
            TargetColor::Specific(c) => c,
        };

        // accumulate color commands into one large buffer
        tracing::debug!("Filling command-buffer to draw #{color:X} from {x_min},{y_min} to {x_max},{y_max}");
        let mut coords = (x_min..x_max).cartesian_product(y_min..y_max).collect::<Vec<_>>();
        coords.shuffle(&mut thread_rng());
        for (x, y) in coords {
            Request::SetPixel { x, y, color }.write(buf)?;
        }
        Ok(())
    };

    DynClient::connect(&opts.common.server)
        .await?
        .run_loop(
            fill_buf,
            &opts.common,
            matches!(opts.color, TargetColor::RandomPerIteration),
        )
        .await
}
