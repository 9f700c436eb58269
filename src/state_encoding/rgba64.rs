//!
//! *RGBA then Base64* encoding
//!
//! Every pixel is widened to 4 bytes by appending a constant alpha of 255 before the result is
//! base64 encoded.
//!

use super::EncodedState;
use crate::canvas::COLOR_BYTES;
use crate::net::protocol::StateEncodingAlgorithm;

const ALPHA: u8 = 0xFF;

/// Encode raw canvas data (3 bytes per pixel) as a `STATE rgba64` line
pub fn encode(raw: &[u8]) -> EncodedState {
    let mut rgba = Vec::with_capacity(raw.len() / COLOR_BYTES * 4);
    for pixel in raw.chunks_exact(COLOR_BYTES) {
        rgba.extend_from_slice(pixel);
        rgba.push(ALPHA);
    }
    EncodedState::encode(StateEncodingAlgorithm::Rgba64, &rgba)
}
