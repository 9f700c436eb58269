#![deny(trivial_casts)]
#![warn(
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
    missing_docs,
    missing_debug_implementations,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications
)]

//!
//! A multiplayer pixel canvas that clients draw on through the pixelflut text protocol.
//!
//! The canvas is shared by all connected clients and served over TCP, UDP and WebSocket.
//! Full-canvas encodings requested via `STATE` are computed periodically in the background
//! and served from a cache so that requesting them never stalls pixel writers.
//!

use std::convert::Infallible;

pub mod canvas;
pub mod command_handler;
pub mod net;
pub mod sinks;
pub mod state_encoding;
mod texts;

/// The result type which all background tasks return
///
/// Background tasks run forever so they only ever return when an error occurred.
pub type DaemonResult = anyhow::Result<Infallible>;
