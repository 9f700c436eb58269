//!
//! Networking layer of the pixelflut server
//!
//! [`protocol`] defines the wire format while [`servers`] and [`clients`] move it over the
//! different transport protocols.
//!

pub mod clients;
pub mod protocol;
pub mod servers;
