//! Protocol constants

/// Nintendo vendor id
pub const VENDOR_ID: u16 = 0x057E;

/// Right Joy-Con product id (the one carrying the IR camera)
pub const PRODUCT_ID: u16 = 0x2007;

/// Outbound command size (report id excluded)
pub const COMMAND_LEN: usize = 48;

/// Inbound buffer size for streaming reports
pub const REPLY_LEN: usize = 0x170;

/// Inbound size of a plain subcommand reply
pub const SUBCOMMAND_REPLY_LEN: usize = 49;

/// Bytes of image data carried by one fragment
pub const FRAGMENT_LEN: usize = 300;

/// Frame buffer size, large enough for every resolution
pub const FRAME_BUFFER_LEN: usize = 19 * 4096;

/// Denominator of the white-pixel percentage (218 fragments of 300 bytes)
pub const WHITE_PIXEL_SCALE: u32 = (217 + 1) * 300;

/// Default handshake poll timeout (milliseconds)
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 64;

/// Default streaming receive timeout (milliseconds)
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 200;

/// Default exposure (microseconds)
pub const DEFAULT_EXPOSURE_US: u16 = 300;

/// Frames during which auto-exposure is active
pub const DEFAULT_WARMUP_FRAMES: u8 = 2;

/// Maximum registers in one write batch
pub const MAX_REGISTERS_PER_WRITE: usize = 9;

/// Expected IR MCU firmware version
pub mod firmware {
    pub const MAJOR: u16 = 0x0005;
    pub const MINOR: u16 = 0x0018;
}

/// Flash (SPI) addresses read during start-up
pub mod flash {
    /// Serial number
    pub const SERIAL_NUMBER: u16 = 0x6001;
    pub const SERIAL_NUMBER_LEN: u8 = 0x0F;

    /// Body, button and grip colours
    pub const COLOR_CALIBRATION: u16 = 0x6050;
    pub const COLOR_CALIBRATION_LEN: u8 = 12;
}

/// IMU registers read for the temperature measurement
pub mod imu {
    /// Control register, upper nibble zero when the IMU is powered down
    pub const CTRL: u8 = 0x10;

    /// Temperature word (i16 LE, 16 LSB per degree, 0 = 25 C)
    pub const TEMPERATURE: u8 = 0x20;
}

/// IR sensor registers (page in the high byte)
pub mod registers {
    /// Finalize configuration, changes take effect only after writing 1
    pub const FINALIZE: u16 = 0x0007;

    /// IR LED groups state
    pub const LED_GROUPS: u16 = 0x0010;

    /// LEDs 1/2 intensity (max 0x0F)
    pub const LED_INTENSITY_FAR: u16 = 0x0011;

    /// LEDs 3/4 intensity (max 0x10)
    pub const LED_INTENSITY_NEAR: u16 = 0x0012;

    /// Flip image
    pub const FLIP: u16 = 0x002D;

    /// Binning / skipping (resolution)
    pub const RESOLUTION: u16 = 0x002E;

    /// External light filter
    pub const EXTERNAL_LIGHT_FILTER: u16 = 0x000E;

    /// Buffer update time LSB
    pub const BUFFER_UPDATE_TIME: u16 = 0x0004;

    /// Digital gain, low and high nibble
    pub const DIGITAL_GAIN_LSB: u16 = 0x012E;
    pub const DIGITAL_GAIN_MSB: u16 = 0x012F;

    /// Exposure time in device units, low and high byte
    pub const EXPOSURE_LSB: u16 = 0x0130;
    pub const EXPOSURE_MSB: u16 = 0x0131;

    /// 0: manual exposure, 1: max exposure
    pub const EXPOSURE_MAX: u16 = 0x0132;

    /// White pixel statistics threshold
    pub const WHITE_PIXEL_THRESHOLD: u16 = 0x0143;

    /// De-noise smoothing enable
    pub const DENOISE: u16 = 0x0167;

    /// Edge smoothing threshold
    pub const EDGE_SMOOTHING: u16 = 0x0168;

    /// Colour interpolation threshold
    pub const COLOR_INTERPOLATION: u16 = 0x0169;
}
