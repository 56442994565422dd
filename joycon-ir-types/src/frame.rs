//! Image frames

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// One complete greyscale IR image
///
/// `data` holds `width * height` bytes, one byte per pixel, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Wall-clock time the last fragment arrived
    pub timestamp: DateTime<Utc>,

    pub width: u16,

    pub height: u16,

    /// Pixel data
    pub data: Bytes,

    /// Average intensity reported by the sensor (0..255)
    pub average_intensity: u8,

    /// White pixel count reported by the sensor
    pub white_pixels: u16,
}

impl Frame {
    /// Create a frame, checking the pixel count
    pub fn new(timestamp: DateTime<Utc>, width: u16, height: u16, data: Bytes) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::Validation(format!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            timestamp,
            width,
            height,
            data,
            average_intensity: 0,
            white_pixels: 0,
        })
    }

    /// Attach the sensor's brightness statistics
    pub fn with_brightness(mut self, average_intensity: u8, white_pixels: u16) -> Self {
        self.average_intensity = average_intensity;
        self.white_pixels = white_pixels;
        self
    }

    /// Timestamp in milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Row `y`
    pub fn row(&self, y: u16) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.width as usize;
        self.data.get(start..start + self.width as usize)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}x{} @ {}, avg {}]",
            self.width,
            self.height,
            self.timestamp.format("%H:%M:%S%.3f"),
            self.average_intensity
        )
    }
}
