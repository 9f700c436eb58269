//!
//! The shared pixel canvas and its color type
//!

mod color;
mod storage;

use std::sync::Arc;

pub use color::{Color, ColorParseError, COLOR_BYTES};
pub use storage::{Canvas, InvalidCoordinatesError, InvalidSizeError};

/// A canvas that is shared between all server tasks
pub type SharedCanvas = Arc<Canvas>;
