//!
//! Support for saving pixelflut canvases into various sinks
//!

pub mod snapshot;
