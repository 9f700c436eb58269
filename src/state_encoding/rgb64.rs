//!
//! *RGB then Base64* encoding
//!
//! The raw canvas buffer already holds 3 bytes per pixel in row-major order so this encoding is
//! a plain base64 encoding of it.
//!

use super::EncodedState;
use crate::net::protocol::StateEncodingAlgorithm;

/// Encode raw canvas data (3 bytes per pixel) as a `STATE rgb64` line
pub fn encode(raw: &[u8]) -> EncodedState {
    EncodedState::encode(StateEncodingAlgorithm::Rgb64, raw)
}
