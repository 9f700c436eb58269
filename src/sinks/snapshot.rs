//! A sink for periodically snapshotting the canvas into a file and restoring it on startup
//!
//! A snapshot file consists of a 4-byte header (`width` and `height` as big-endian u16) followed by
//! the raw canvas data with 3 bytes per pixel in row-major order.
//! Files in the legacy format, which only has one byte per dimension, can still be loaded.

use crate::canvas::{Canvas, InvalidSizeError, SharedCanvas, COLOR_BYTES};
use crate::DaemonResult;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;

const HEADER_SIZE: usize = 4;
const LEGACY_HEADER_SIZE: usize = 2;

/// Largest width or height that can be stored in a snapshot
pub const MAX_DIMENSION: usize = u16::MAX as usize;

/// Reasons why a snapshot cannot be written or does not fit a canvas
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum SnapshotError {
    /// The canvas has dimensions which the header cannot represent
    #[error("A canvas of size {width}x{height} cannot be snapshotted (maximum is {max}x{max})", max = MAX_DIMENSION)]
    TooLarge {
        /// Width of the canvas
        width: usize,
        /// Height of the canvas
        height: usize,
    },
    /// The file length matches neither snapshot layout for the expected canvas size
    #[error("Snapshot has {actual} bytes which does not fit a canvas of size {width}x{height}")]
    LengthMismatch {
        /// Length of the snapshot in bytes
        actual: usize,
        /// Expected canvas width
        width: usize,
        /// Expected canvas height
        height: usize,
    },
    /// The header describes a canvas with other dimensions
    #[error("Snapshot was taken from a canvas of size {found_width}x{found_height} but expected {width}x{height}")]
    HeaderMismatch {
        /// Width stored in the snapshot header
        found_width: usize,
        /// Height stored in the snapshot header
        found_height: usize,
        /// Expected canvas width
        width: usize,
        /// Expected canvas height
        height: usize,
    },
}

/// Serialize a header and the *raw* data of a canvas with the given size into snapshot bytes
pub fn encode_snapshot(width: usize, height: usize, raw: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(SnapshotError::TooLarge { width, height });
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + raw.len());
    buf.extend_from_slice(&w.to_be_bytes());
    buf.extend_from_slice(&h.to_be_bytes());
    buf.extend_from_slice(raw);
    Ok(buf)
}

/// Validate snapshot bytes against the expected canvas size and return the contained pixel data
pub fn decode_snapshot(data: &[u8], width: usize, height: usize) -> Result<&[u8], SnapshotError> {
    let data_len = width * height * COLOR_BYTES;
    let (found_width, found_height, pixels) = if data.len() == HEADER_SIZE + data_len {
        let (header, pixels) = data.split_at(HEADER_SIZE);
        (
            u16::from_be_bytes([header[0], header[1]]) as usize,
            u16::from_be_bytes([header[2], header[3]]) as usize,
            pixels,
        )
    } else if data.len() == LEGACY_HEADER_SIZE + data_len {
        // legacy headers only hold the lowest byte of each dimension
        let (header, pixels) = data.split_at(LEGACY_HEADER_SIZE);
        let (found_width, found_height) = (header[0] as usize, header[1] as usize);
        if found_width == width & 0xFF && found_height == height & 0xFF {
            return Ok(pixels);
        }
        (found_width, found_height, pixels)
    } else {
        return Err(SnapshotError::LengthMismatch {
            actual: data.len(),
            width,
            height,
        });
    };

    if (found_width, found_height) != (width, height) {
        return Err(SnapshotError::HeaderMismatch {
            found_width,
            found_height,
            width,
            height,
        });
    }
    Ok(pixels)
}

/// Write a snapshot of *canvas* to *path*
///
/// The data is first written to `<path>.tmp` which is then renamed over *path* so that readers
/// never see a partially written snapshot.
pub async fn save_snapshot(canvas: &Canvas, path: &Path) -> anyhow::Result<()> {
    let (width, height) = canvas.get_size();
    let data = canvas.with_raw_data(|raw| encode_snapshot(width, height, raw))?;

    let tmp_path = tmp_path(path);
    let mut file = File::create(&tmp_path).await?;
    file.write_all(&data).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Restore a previously saved snapshot into a new canvas of the given size
pub async fn load_snapshot(path: &Path, width: usize, height: usize) -> anyhow::Result<Canvas> {
    let canvas = Canvas::new(width, height)?;
    let data = tokio::fs::read(path).await?;
    canvas.put_raw_data(decode_snapshot(&data, width, height)?);
    Ok(canvas)
}

/// Restore the snapshot at *path* or create a blank canvas if that is not possible
///
/// Only an invalid canvas size is an error; problems with the snapshot itself are logged.
pub async fn load_or_blank(path: &Path, width: usize, height: usize) -> Result<Canvas, InvalidSizeError> {
    match load_snapshot(path, width, height).await {
        Ok(canvas) => {
            tracing::info!("Restored canvas from snapshot {}", path.display());
            Ok(canvas)
        }
        Err(e) => {
            tracing::warn!(
                "Could not restore snapshot from {}, starting with a blank canvas: {e}",
                path.display()
            );
            Canvas::new(width, height)
        }
    }
}

/// Configuration options for the [`FileSink`]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FileSinkOptions {
    /// The path at which the snapshot should be placed
    pub path: PathBuf,

    /// The time between snapshots
    pub interval: Duration,
}

/// A sink that periodically snapshots canvas data into a file
#[derive(Debug)]
pub struct FileSink {
    options: FileSinkOptions,
    canvas: SharedCanvas,
    last_generation: Option<u64>,
}

impl FileSink {
    /// Create a new file sink which sinks data from the given canvas into a file
    pub fn new(options: FileSinkOptions, canvas: SharedCanvas) -> Self {
        Self {
            options,
            canvas,
            last_generation: None,
        }
    }

    /// Start the background task for periodic snapshotting
    pub fn start(self, join_set: &mut JoinSet<DaemonResult>) -> anyhow::Result<AbortHandle> {
        let (width, height) = self.canvas.get_size();
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(SnapshotError::TooLarge { width, height }.into());
        }

        tracing::info!(
            "Saving snapshots to {} every {}s",
            self.options.path.display(),
            self.options.interval.as_secs_f32()
        );
        Ok(join_set.spawn(async move { self.run().await }))
    }

    /// Write a snapshot unless the canvas is unchanged since the last one
    ///
    /// Returns whether a snapshot was written.
    async fn snapshot_if_changed(&mut self) -> anyhow::Result<bool> {
        let generation = self.canvas.generation();
        if self.last_generation == Some(generation) {
            return Ok(false);
        }

        save_snapshot(&self.canvas, &self.options.path).await?;
        self.last_generation = Some(generation);
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(path = %self.options.path.display()))]
    async fn run(mut self) -> DaemonResult {
        let mut interval = tokio::time::interval(self.options.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.snapshot_if_changed().await {
                Ok(true) => tracing::debug!("Saved canvas snapshot"),
                Ok(false) => tracing::trace!("Canvas unchanged, skipping snapshot"),
                Err(e) => tracing::warn!("Could not save canvas snapshot: {e}"),
            }
        }
    }
}
