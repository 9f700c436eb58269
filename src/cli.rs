use clap::{ArgAction, Args, Parser, Subcommand};
use pixelcanvas::canvas::{Color, ColorParseError};
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Command-Line arguments as a well formatted struct, parsed using clap.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub(crate) struct CliOpts {
    #[command(subcommand)]
    pub command: Command,

    /// Increase program verbosity
    ///
    /// The default verbosity level is INFO.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, default_value = "0")]
    pub verbose: u8,

    /// Decrease program verbosity
    ///
    /// The default verbosity level is INFO.
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, default_value = "0")]
    pub quiet: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Start a pixelflut server
    Server(ServerOpts),
    /// Run a pixelflut client to project a colored rectangle onto a servers canvas
    PutRectangle(PutRectangleData),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ServerOpts {
    /// Url on which to bind a server
    ///
    /// Valid protocols are "tcp://", "udp://" and "ws://". The port defaults to 1234.
    #[arg(long = "listen", required = true)]
    pub listen: Vec<Url>,

    /// width of the canvas
    #[arg(short = 'x', long = "width", default_value = "800")]
    pub width: usize,

    /// height of the canvas
    #[arg(short = 'y', long = "height", default_value = "600")]
    pub height: usize,

    /// The interval in milliseconds with which the canvas encodings served via STATE are refreshed
    #[arg(long = "state-interval-ms", default_value = "100")]
    pub state_interval_ms: u64,

    #[command(flatten)]
    pub file_opts: FileOpts,
}

/// Specific options regarding snapshot files
#[derive(Args, Debug, Clone)]
pub(crate) struct FileOpts {
    /// A path into which snapshots are stored
    ///
    /// An existing snapshot at this path is loaded on startup. If it has different dimensions than
    /// the ones given via --width and --height, an empty canvas is created instead.
    #[arg(long = "snapshot")]
    pub snapshot_file: Option<PathBuf>,

    /// The interval in seconds with which snapshots are written to disk
    #[arg(long = "snapshot-interval", default_value = "10")]
    pub snapshot_interval_secs: u64,

    /// Start with an empty canvas even if a snapshot exists
    #[arg(long = "new")]
    pub new: bool,
}

/// Arguments common to all client commands
#[derive(Args, Debug, Clone)]
pub(crate) struct CommonClientOps {
    /// Address of the pixelflut server
    ///
    /// Valid protocols are "tcp://" and "udp://". The port defaults to 1234.
    #[arg(short = 's', long = "server")]
    pub server: Url,
    /// The width of the rectangle that should be drawn
    ///
    /// Possible values: ["fill", <number>]
    #[arg(long = "width", default_value = "fill")]
    pub width: TargetDimension,
    /// The height of the rectangle that should be drawn
    ///
    /// Possible values: ["fill", <number>]
    #[arg(long = "height", default_value = "fill")]
    pub height: TargetDimension,
    /// Offset from the left of the canvas edge to start drawing
    #[arg(short = 'x', default_value = "0")]
    pub x_offset: usize,
    /// Offset from the top of the canvas to start drawing
    #[arg(short = 'y', default_value = "0")]
    pub y_offset: usize,
    /// Only draw the rectangle once
    #[arg(long = "once", action = ArgAction::SetFalse)]
    pub do_loop: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PutRectangleData {
    #[command(flatten)]
    pub common: CommonClientOps,

    /// The color which the rectangle should have.
    ///
    /// Possible values: ["random", "random-per-iteration", <RRGGBB>]
    #[arg(long = "color", default_value = "random")]
    pub color: TargetColor,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum TargetDimension {
    /// Fill all available space
    Fill,
    /// Fill a specific number of pixels
    Specific(usize),
}

impl FromStr for TargetDimension {
    type Err = <usize as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("fill") {
            Ok(TargetDimension::Fill)
        } else {
            let v = usize::from_str(s)?;
            Ok(TargetDimension::Specific(v))
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum TargetColor {
    RandomPerIteration,
    RandomOnce,
    Specific(Color),
}

impl FromStr for TargetColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("random") {
            Ok(TargetColor::RandomOnce)
        } else if s.eq_ignore_ascii_case("random-per-iteration") {
            Ok(TargetColor::RandomPerIteration)
        } else {
            Ok(TargetColor::Specific(Color::from_hex(s)?))
        }
    }
}
