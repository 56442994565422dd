//! Device configuration

use std::time::Duration;

use joycon_ir_core::constants::{
    DEFAULT_EXPOSURE_US, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_STREAM_TIMEOUT_MS,
    DEFAULT_WARMUP_FRAMES, PRODUCT_ID, VENDOR_ID,
};
use joycon_ir_core::exposure::MAX_EXPOSURE_US;
use joycon_ir_core::{Resolution, ResolutionProfile};

/// Connection and streaming settings
///
/// # Examples
///
/// ```
/// use joycon_ir::{DeviceConfig, Resolution};
///
/// let config = DeviceConfig::default()
///     .with_resolution(Resolution::P120)
///     .with_initial_exposure_us(200);
///
/// assert_eq!(config.profile().width, 160);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub resolution: Resolution,

    /// Exposure written during the handshake (microseconds, max 600)
    pub initial_exposure_us: u16,

    /// Frames during which auto-exposure may adjust
    pub warmup_frames: u8,

    /// Receive timeout while polling for handshake replies
    pub poll_timeout: Duration,

    /// Receive timeout while streaming
    pub stream_timeout: Duration,
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            resolution: Resolution::default(),
            initial_exposure_us: DEFAULT_EXPOSURE_US,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            stream_timeout: Duration::from_millis(DEFAULT_STREAM_TIMEOUT_MS),
        }
    }

    /// Set HID vendor and product ids
    pub fn with_device_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    /// Set image resolution
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set initial exposure (clamped to 600 us)
    pub fn with_initial_exposure_us(mut self, micros: u16) -> Self {
        self.initial_exposure_us = micros.min(MAX_EXPOSURE_US);
        self
    }

    /// Set auto-exposure warm-up length
    pub fn with_warmup_frames(mut self, frames: u8) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Set handshake poll timeout
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set streaming receive timeout
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Profile of the selected resolution
    pub fn profile(&self) -> ResolutionProfile {
        self.resolution.profile()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}
