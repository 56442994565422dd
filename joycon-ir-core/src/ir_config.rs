//! IR sensor register configuration
//!
//! The sensor is configured with two register batches after the MCU enters
//! image transfer mode. Each batch holds at most 9 registers and only takes
//! effect once `FINALIZE` is written.

use crate::constants::registers;
use crate::exposure::ExposureSetting;
use crate::packet::Register;
use crate::resolution::ResolutionProfile;

/// Sensor settings written during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrSensorConfig {
    /// Binning/skipping value from the resolution profile
    pub binning: u8,

    /// Initial exposure
    pub exposure: ExposureSetting,

    /// Use the maximum exposure instead of the manual value
    pub max_exposure: bool,

    /// IR LED groups state (only the 3 low bits are used)
    pub led_groups: u8,

    /// Digital gain (8 bits, written as two nibbles)
    pub digital_gain: u8,

    /// External light filter (bit 0 on/off)
    pub external_light_filter: u8,

    /// White pixel statistics threshold
    pub white_pixel_threshold: u8,

    /// LEDs 1/2 intensity (max 0x0F)
    pub led_intensity_far: u8,

    /// LEDs 3/4 intensity (max 0x10)
    pub led_intensity_near: u8,

    /// 0: normal, 1: vertical, 2: horizontal, 3: both
    pub flip: u8,

    /// De-noise smoothing
    pub denoise: bool,

    /// Edge smoothing threshold
    pub edge_smoothing: u8,

    /// Colour interpolation threshold
    pub color_interpolation: u8,

    /// Buffer update time
    pub buffer_update_time: u8,
}

impl IrSensorConfig {
    /// Defaults for a resolution and initial exposure
    pub fn new(profile: &ResolutionProfile, exposure: ExposureSetting) -> Self {
        Self {
            binning: profile.binning,
            exposure,
            max_exposure: false,
            led_groups: 0x00,
            digital_gain: 0x02,
            external_light_filter: 0x03,
            white_pixel_threshold: 0xC8,
            led_intensity_far: 0x0F,
            led_intensity_near: 0x10,
            flip: 0x00,
            denoise: true,
            edge_smoothing: 0x23,
            color_interpolation: 0x44,
            buffer_update_time: 0x32,
        }
    }

    /// Resolution, exposure, gain, LEDs and filter (9 registers)
    pub fn sensor_batch(&self) -> [Register; 9] {
        [
            Register::new(registers::RESOLUTION, self.binning),
            Register::new(registers::EXPOSURE_LSB, self.exposure.lsb()),
            Register::new(registers::EXPOSURE_MSB, self.exposure.msb()),
            Register::new(registers::EXPOSURE_MAX, self.max_exposure as u8),
            Register::new(registers::LED_GROUPS, self.led_groups),
            Register::new(registers::DIGITAL_GAIN_LSB, (self.digital_gain & 0x0F) << 4),
            Register::new(registers::DIGITAL_GAIN_MSB, (self.digital_gain & 0xF0) >> 4),
            Register::new(registers::EXTERNAL_LIGHT_FILTER, self.external_light_filter),
            Register::new(registers::WHITE_PIXEL_THRESHOLD, self.white_pixel_threshold),
        ]
    }

    /// Sensor batch at full resolution, sent as a register-path check
    pub fn diagnostic_batch(&self) -> [Register; 9] {
        let mut batch = self.sensor_batch();
        batch[0] = Register::new(registers::RESOLUTION, 0x00);
        batch
    }

    /// LED intensity, flip, de-noise and finalize (8 registers)
    pub fn image_batch(&self) -> [Register; 8] {
        [
            Register::new(registers::LED_INTENSITY_FAR, self.led_intensity_far),
            Register::new(registers::LED_INTENSITY_NEAR, self.led_intensity_near),
            Register::new(registers::FLIP, self.flip),
            Register::new(registers::DENOISE, self.denoise as u8),
            Register::new(registers::EDGE_SMOOTHING, self.edge_smoothing),
            Register::new(registers::COLOR_INTERPOLATION, self.color_interpolation),
            Register::new(registers::BUFFER_UPDATE_TIME, self.buffer_update_time),
            Register::new(registers::FINALIZE, 0x01),
        ]
    }
}
