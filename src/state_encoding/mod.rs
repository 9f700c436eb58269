//!
//! Encoding of the canvas with different algorithms
//!
//! A pixelflut server is able to send its complete canvas using different encoding mechanisms to
//! requesting clients.
//! Because encoding the whole canvas is expensive, encodings are not computed per request but
//! periodically by a background task and then served from a [`StateCache`].
//!

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::canvas::{Canvas, SharedCanvas};
use crate::net::protocol::StateEncodingAlgorithm;
use crate::DaemonResult;

pub mod rgb64;
pub mod rgba64;

/// A complete `STATE` response line holding the canvas encoded with one algorithm
///
/// The line is stored exactly as it is sent on the wire (`STATE <algorithm> <base64>\n`) and is
/// cheap to clone.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EncodedState {
    alg: StateEncodingAlgorithm,
    line: Bytes,
}

impl EncodedState {
    /// Wrap an already base64 encoded *payload* into a response line
    pub fn wrap(alg: StateEncodingAlgorithm, payload: &[u8]) -> Self {
        let mut line = Vec::with_capacity(Self::prefix_len(alg) + payload.len() + 1);
        line.extend_from_slice(b"STATE ");
        line.extend_from_slice(alg.tag().as_bytes());
        line.push(b' ');
        line.extend_from_slice(payload);
        line.push(b'\n');
        Self {
            alg,
            line: line.into(),
        }
    }

    /// Base64 encode *raw* canvas data and wrap it into a response line
    fn encode(alg: StateEncodingAlgorithm, raw: &[u8]) -> Self {
        let mut line = String::with_capacity(Self::prefix_len(alg) + raw.len().div_ceil(3) * 4 + 1);
        line.push_str("STATE ");
        line.push_str(alg.tag());
        line.push(' ');
        STANDARD.encode_string(raw, &mut line);
        line.push('\n');
        Self {
            alg,
            line: line.into(),
        }
    }

    #[inline]
    fn prefix_len(alg: StateEncodingAlgorithm) -> usize {
        "STATE ".len() + alg.tag().len() + 1
    }

    /// The algorithm with which the canvas is encoded
    pub fn algorithm(&self) -> StateEncodingAlgorithm {
        self.alg
    }

    /// The complete response line including the trailing newline
    pub fn as_line(&self) -> &Bytes {
        &self.line
    }

    /// The base64 encoded canvas data without any framing
    pub fn payload(&self) -> &[u8] {
        &self.line[Self::prefix_len(self.alg)..self.line.len() - 1]
    }

    /// Decode the payload back into raw pixel data as described by the algorithm
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.payload())
    }
}

/// A [`StateCache`] that is shared between all server tasks
pub type SharedStateCache = Arc<StateCache>;

/// Holds the most recently computed encodings of a canvas
///
/// Both encodings are always computed from the same copy of the canvas and published together so
/// that readers never observe a mixed pair.
#[derive(Debug)]
pub struct StateCache {
    states: RwLock<EncodedStates>,
}

#[derive(Debug, Clone)]
struct EncodedStates {
    rgb64: EncodedState,
    rgba64: EncodedState,
}

impl EncodedStates {
    fn from_canvas(canvas: &Canvas) -> Self {
        let raw = canvas.raw_data();
        Self {
            rgb64: rgb64::encode(&raw),
            rgba64: rgba64::encode(&raw),
        }
    }
}

impl StateCache {
    /// Create a new cache that is already seeded with the current content of *canvas*
    pub fn new(canvas: &Canvas) -> Self {
        canvas.take_dirty();
        Self {
            states: RwLock::new(EncodedStates::from_canvas(canvas)),
        }
    }

    /// Get the most recently published encoding of the canvas
    ///
    /// This never computes anything and never waits for a fresher encoding.
    pub fn get_state(&self, alg: StateEncodingAlgorithm) -> EncodedState {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        match alg {
            StateEncodingAlgorithm::Rgb64 => states.rgb64.clone(),
            StateEncodingAlgorithm::Rgba64 => states.rgba64.clone(),
        }
    }

    /// Re-encode the canvas if any pixel has been written since the last refresh
    ///
    /// Returns whether new encodings have been published.
    pub fn refresh_if_dirty(&self, canvas: &Canvas) -> bool {
        if !canvas.take_dirty() {
            return false;
        }
        self.refresh(canvas);
        true
    }

    /// Unconditionally re-encode the canvas and publish the result
    pub fn refresh(&self, canvas: &Canvas) {
        let states = EncodedStates::from_canvas(canvas);
        *self.states.write().unwrap_or_else(PoisonError::into_inner) = states;
    }
}

/// Start a background task that periodically refreshes *cache* from *canvas*
pub fn start_encoder(
    cache: SharedStateCache,
    canvas: SharedCanvas,
    period: Duration,
    join_set: &mut JoinSet<DaemonResult>,
) -> AbortHandle {
    tracing::info!("Starting state encoder with an interval of {}ms", period.as_millis());
    join_set.spawn(async move { run_encoder(cache, canvas, period).await })
}

#[tracing::instrument(skip_all)]
async fn run_encoder(cache: SharedStateCache, canvas: SharedCanvas, period: Duration) -> DaemonResult {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;

        // encoding is linear in canvas size so it is kept away from the async worker threads
        let cache = cache.clone();
        let canvas = canvas.clone();
        if tokio::task::spawn_blocking(move || cache.refresh_if_dirty(&canvas)).await? {
            tracing::trace!("Published new canvas encodings");
        }
    }
}
