//! Auto-exposure controller
//!
//! Reacts to the white-pixel statistic the sensor attaches to every frame:
//! a black frame gets a longer shutter, a frame with more than 5 % white
//! pixels gets a proportionally shorter one.

use tracing::debug;

use crate::constants::{DEFAULT_EXPOSURE_US, WHITE_PIXEL_SCALE};

/// Upper bound of the exposure (microseconds)
pub const MAX_EXPOSURE_US: u16 = 600;

/// Step applied to a black frame (microseconds)
pub const EXPOSURE_STEP_US: i32 = 10;

/// Device units per millisecond of exposure
const DEVICE_UNITS_PER_MS: u32 = 31200;

/// Exposure expressed in device units, ready for the register pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureSetting {
    /// Exposure in microseconds
    pub micros: u16,

    /// Exposure in device units
    pub raw: u16,
}

impl ExposureSetting {
    /// Convert microseconds to device units, clamped to `MAX_EXPOSURE_US`
    pub fn from_micros(micros: u16) -> Self {
        let micros = micros.min(MAX_EXPOSURE_US);
        let raw = (micros as u32 * DEVICE_UNITS_PER_MS / 1000) as u16;
        Self { micros, raw }
    }

    /// Low byte (register 0x0130)
    pub fn lsb(&self) -> u8 {
        (self.raw & 0xFF) as u8
    }

    /// High byte (register 0x0131)
    pub fn msb(&self) -> u8 {
        (self.raw >> 8) as u8
    }
}

/// White pixels as a percentage of the reference pixel count
pub fn white_pixel_percent(white_pixels: u16) -> u32 {
    white_pixels as u32 * 100 / WHITE_PIXEL_SCALE
}

/// Closed-loop exposure state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoExposure {
    current_us: u16,
}

impl AutoExposure {
    /// Start from `initial_us`, clamped to the valid range
    pub fn new(initial_us: u16) -> Self {
        Self {
            current_us: initial_us.min(MAX_EXPOSURE_US),
        }
    }

    /// Current exposure (microseconds)
    pub fn current(&self) -> u16 {
        self.current_us
    }

    /// Current exposure in device units
    pub fn setting(&self) -> ExposureSetting {
        ExposureSetting::from_micros(self.current_us)
    }

    /// Update the exposure from one frame's white-pixel percentage
    ///
    /// - `0` adds 10 us
    /// - above `5` subtracts `(percent / 4) * 20` us
    /// - otherwise unchanged
    ///
    /// The result is clamped to `[0, 600]`.
    pub fn adjust(&mut self, white_percent: u32) -> ExposureSetting {
        let mut exposure = self.current_us as i32;

        if white_percent == 0 {
            exposure += EXPOSURE_STEP_US;
        } else if white_percent > 5 {
            exposure -= (white_percent as i32 / 4) * 20;
        }

        let clamped = exposure.clamp(0, MAX_EXPOSURE_US as i32) as u16;

        debug!(
            white_percent = white_percent,
            from = self.current_us,
            to = clamped,
            "Auto-exposure adjusted"
        );

        self.current_us = clamped;
        self.setting()
    }
}

impl Default for AutoExposure {
    fn default() -> Self {
        Self::new(DEFAULT_EXPOSURE_US)
    }
}
