use crate::canvas::{Color, COLOR_BYTES};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// The shared pixel storage that all clients draw on
///
/// Pixels are stored row-major as a flat buffer of `width * height * 3` bytes.
/// A single reader/writer lock guards the buffer but is only ever held for the duration of one
/// pixel access or one full-buffer copy.
#[derive(Debug)]
pub struct Canvas {
    data: RwLock<Vec<u8>>,
    width: usize,
    height: usize,
    /// Whether a pixel has been written since the last call to [`Canvas::take_dirty`]
    dirty: AtomicBool,
    /// Number of pixel writes since construction
    generation: AtomicU64,
}

/// An error which indicates that invalid coordinates could not be accessed
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("Coordinates {},{} are not inside the canvas of size {}x{}", .target.0, .target.1, .canvas_size.0, .canvas_size.1)]
pub struct InvalidCoordinatesError {
    target: (usize, usize),
    canvas_size: (usize, usize),
}

/// An error which indicates that a canvas of a given size cannot be constructed
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("Given size {}x{} is not valid for constructing a canvas: {details}", .size.0, .size.1)]
pub struct InvalidSizeError {
    size: (usize, usize),
    details: &'static str,
}

impl Canvas {
    /// Create a new canvas with the specified dimensions that is filled with the default (black) color
    pub fn new(width: usize, height: usize) -> Result<Self, InvalidSizeError> {
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(COLOR_BYTES))
            .ok_or(InvalidSizeError {
                size: (width, height),
                details: "Canvas would not fit into memory",
            })?;
        if len == 0 {
            return Err(InvalidSizeError {
                size: (width, height),
                details: "Width and Height must both be greater than 0",
            });
        }

        Ok(Self {
            data: RwLock::new(vec![0; len]),
            width,
            height,
            dirty: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    /// Get the size of this canvas as `(width, height)` tuple
    #[inline]
    pub fn get_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Byte offset of the pixel at (x,y) or an error if it lies outside of the canvas
    #[inline]
    fn offset(&self, x: usize, y: usize) -> Result<usize, InvalidCoordinatesError> {
        if x >= self.width || y >= self.height {
            Err(InvalidCoordinatesError {
                target: (x, y),
                canvas_size: self.get_size(),
            })
        } else {
            Ok((y * self.width + x) * COLOR_BYTES)
        }
    }

    /// Get the color value of the pixel at position (x,y)
    pub fn get_pixel(&self, x: usize, y: usize) -> Result<Color, InvalidCoordinatesError> {
        let i = self.offset(x, y)?;
        let data = self.read();
        Ok(Color(data[i], data[i + 1], data[i + 2]))
    }

    /// Set the pixel value at position (x,y) to the specified color
    pub fn set_pixel(&self, x: usize, y: usize, color: Color) -> Result<(), InvalidCoordinatesError> {
        let i = self.offset(x, y)?;
        {
            let mut data = self.write();
            data[i..i + COLOR_BYTES].copy_from_slice(&<[u8; 3]>::from(color));
        }
        self.mark_written();
        Ok(())
    }

    /// Copy the complete pixel buffer (row-major, 3 bytes per pixel) while holding a single read lock
    pub fn raw_data(&self) -> Vec<u8> {
        self.read().clone()
    }

    /// Run `f` on the complete pixel buffer while holding a single read lock
    pub fn with_raw_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.read())
    }

    /// Overwrite the pixel buffer with the given raw data.
    ///
    /// If *data* is too small, the remaining pixels keep their color.
    /// If *data* is too large, left over bytes are ignored.
    pub fn put_raw_data(&self, data: &[u8]) {
        {
            let mut stored = self.write();
            let n = data.len().min(stored.len());
            stored[..n].copy_from_slice(&data[..n]);
        }
        self.mark_written();
    }

    /// Reset the dirty flag and return whether any pixel was written since the last reset
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Number of write operations that have been applied to this canvas so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    fn mark_written(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.dirty.store(true, Ordering::Release);
    }

    // a panic while holding the lock cannot leave plain bytes in an inconsistent state
    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{quickcheck, TestResult};
    use std::sync::{Arc, Barrier};

    quickcheck! {
        fn test_set_and_get_pixel(x: usize, y: usize, color: Color) -> TestResult {
            let canvas = Canvas::new(80, 60).unwrap();
            match canvas.set_pixel(x, y, color) {
                Err(_) => TestResult::discard(),
                Ok(_) => TestResult::from_bool(canvas.get_pixel(x, y) == Ok(color)),
            }
        }

        fn test_out_of_bounds_access_is_rejected(x: usize, y: usize, color: Color) -> TestResult {
            if x < 80 && y < 60 {
                return TestResult::discard();
            }
            let canvas = Canvas::new(80, 60).unwrap();
            let before = canvas.raw_data();
            TestResult::from_bool(
                canvas.set_pixel(x, y, color).is_err()
                    && canvas.get_pixel(x, y).is_err()
                    && canvas.raw_data() == before
                    && !canvas.take_dirty(),
            )
        }
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(Canvas::new(0, 600).is_err());
        assert!(Canvas::new(800, 0).is_err());
        assert!(Canvas::new(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_new_canvas_is_black_and_clean() {
        let canvas = Canvas::new(800, 600).unwrap();
        assert_eq!(canvas.get_size(), (800, 600));
        assert_eq!(canvas.generation(), 0);
        assert!(!canvas.take_dirty());
        canvas.with_raw_data(|data| {
            assert_eq!(data.len(), 800 * 600 * COLOR_BYTES);
            assert!(data.iter().all(|&b| b == 0));
        });
    }

    #[test]
    fn test_row_major_layout() {
        let canvas = Canvas::new(2, 2).unwrap();
        canvas.set_pixel(1, 0, Color(1, 2, 3)).unwrap();
        canvas.set_pixel(0, 1, Color(4, 5, 6)).unwrap();
        assert_eq!(canvas.raw_data(), vec![0, 0, 0, 1, 2, 3, 4, 5, 6, 0, 0, 0]);
    }

    #[test]
    fn test_dirty_flag_coalesces_writes() {
        let canvas = Canvas::new(4, 4).unwrap();
        assert!(!canvas.take_dirty());
        canvas.set_pixel(0, 0, Color(1, 1, 1)).unwrap();
        canvas.set_pixel(1, 0, Color(1, 1, 1)).unwrap();
        assert!(canvas.take_dirty());
        assert!(!canvas.take_dirty());
        assert_eq!(canvas.generation(), 2);
    }

    #[test]
    fn test_put_raw_data_with_incorrect_size_data() {
        let canvas = Canvas::new(2, 1).unwrap();
        canvas.put_raw_data(&[0xFF; 3]);
        assert_eq!(canvas.raw_data(), vec![0xFF, 0xFF, 0xFF, 0, 0, 0]);
        canvas.put_raw_data(&[0xAA; 12]);
        assert_eq!(canvas.raw_data(), vec![0xAA; 6]);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_pixels() {
        const N: usize = 64;
        let canvas = Arc::new(Canvas::new(16, 16).unwrap());
        let barrier = Arc::new(Barrier::new(N));

        let handles = (0..N)
            .map(|i| {
                let canvas = canvas.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..100 {
                        canvas.set_pixel(i % 16, i / 16, Color(i as u8, 0xAB, 0xCD)).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        for y in 0..16 {
            for x in 0..16 {
                let i = y * 16 + x;
                let expected = if i < N {
                    Color(i as u8, 0xAB, 0xCD)
                } else {
                    Color::default()
                };
                assert_eq!(canvas.get_pixel(x, y).unwrap(), expected, "pixel {x},{y}");
            }
        }
    }
}
