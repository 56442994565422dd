//! Controller information structures
//!
//! Filled from the replies read during the handshake.

use std::fmt;

use crate::error::{Error, Result};

/// Controller variant reported by the device info subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerKind {
    LeftJoyCon,
    RightJoyCon,
    ProController,
    #[default]
    Unknown,
}

impl From<u8> for ControllerKind {
    fn from(value: u8) -> Self {
        match value {
            1 => ControllerKind::LeftJoyCon,
            2 => ControllerKind::RightJoyCon,
            3 => ControllerKind::ProController,
            _ => ControllerKind::Unknown,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerKind::LeftJoyCon => "Joy-Con (L)",
            ControllerKind::RightJoyCon => "Joy-Con (R)",
            ControllerKind::ProController => "Pro Controller",
            ControllerKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Battery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryStatus {
    /// 0 (empty), 2 (critical), 4 (low), 6 (medium), 8 (full)
    pub level: u8,

    /// Charging
    pub charging: bool,

    /// Raw voltage in 2.5 mV units
    pub voltage_raw: u16,
}

impl BatteryStatus {
    /// Parse the report header byte and the voltage word
    pub fn parse(header: u8, voltage: &[u8]) -> Result<Self> {
        if voltage.len() < 2 {
            return Err(Error::too_short("battery voltage", 2, voltage.len()));
        }

        let nibble = header >> 4;
        Ok(Self {
            level: nibble & 0x0E,
            charging: nibble & 0x01 != 0,
            voltage_raw: u16::from_le_bytes([voltage[0], voltage[1]]),
        })
    }

    /// Voltage in millivolts
    pub fn millivolts(&self) -> u32 {
        self.voltage_raw as u32 * 5 / 2
    }

    /// Level as a percentage
    pub fn percent(&self) -> u8 {
        self.level.min(8) * 100 / 8
    }
}

/// 24-bit colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Body and button colours stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorCalibration {
    pub body: Rgb,
    pub buttons: Rgb,
    pub left_grip: Rgb,
    pub right_grip: Rgb,
}

impl ColorCalibration {
    /// Bytes read from the colour block
    pub const LEN: usize = 12;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::too_short("colour calibration", Self::LEN, data.len()));
        }

        let rgb = |at: usize| Rgb(data[at], data[at + 1], data[at + 2]);
        Ok(Self {
            body: rgb(0),
            buttons: rgb(3),
            left_grip: rgb(6),
            right_grip: rgb(9),
        })
    }
}

/// Controller information
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerInfo {
    /// Serial number from flash
    pub serial_number: String,

    /// Firmware version (major, minor)
    pub firmware: (u8, u8),

    /// Controller variant
    pub kind: ControllerKind,

    /// Bluetooth MAC address
    pub mac_address: [u8; 6],

    /// Battery state
    pub battery: BatteryStatus,

    /// IMU temperature in degrees Celsius
    pub temperature_celsius: f32,

    /// Colours
    pub colors: ColorCalibration,
}

impl ControllerInfo {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Default::default()
        }
    }

    /// Decode a serial number, dropping NUL padding
    pub fn decode_serial(data: &[u8]) -> String {
        data.iter()
            .filter(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }

    /// Apply the device info block (firmware, kind, MAC)
    pub fn set_device_info(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 10 {
            return Err(Error::too_short("device info", 10, data.len()));
        }

        self.firmware = (data[0], data[1]);
        self.kind = ControllerKind::from(data[2]);
        self.mac_address.copy_from_slice(&data[4..10]);
        Ok(())
    }

    /// Apply a raw temperature word read from the IMU
    pub fn set_temperature_raw(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() < 2 {
            return Err(Error::too_short("temperature", 2, raw.len()));
        }

        let value = i16::from_le_bytes([raw[0], raw[1]]);
        self.temperature_celsius = 25.0 + value as f32 / 16.0;
        Ok(())
    }

    /// Firmware version as text
    pub fn firmware_version(&self) -> String {
        format!("{}.{:02}", self.firmware.0, self.firmware.1)
    }

    /// MAC address as text
    pub fn mac_string(&self) -> String {
        self.mac_address
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for ControllerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[SN: {}, FW: {}, MAC: {}, battery: {}%, {:.1}°C]",
            self.kind,
            self.serial_number,
            self.firmware_version(),
            self.mac_string(),
            self.battery.percent(),
            self.temperature_celsius
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_serial() {
        let raw = b"XCW1\0\0234\0";
        assert_eq!(ControllerInfo::decode_serial(raw), "XCW1234");
    }

    #[test]
    fn test_device_info() {
        let mut info = ControllerInfo::new("SN");
        info.set_device_info(&[0x04, 0x06, 0x02, 0x02, 0x98, 0xB6, 0xE9, 0x01, 0x02, 0x03])
            .unwrap();

        assert_eq!(info.firmware_version(), "4.06");
        assert_eq!(info.kind, ControllerKind::RightJoyCon);
        assert_eq!(info.mac_string(), "98:B6:E9:01:02:03");
    }

    #[test]
    fn test_device_info_too_short() {
        let mut info = ControllerInfo::default();
        assert!(info.set_device_info(&[0x04, 0x06]).is_err());
    }

    #[test]
    fn test_battery() {
        let battery = BatteryStatus::parse(0x91, &[0xA0, 0x05]).unwrap();

        assert_eq!(battery.level, 8);
        assert!(battery.charging);
        assert_eq!(battery.voltage_raw, 0x05A0);
        assert_eq!(battery.millivolts(), 3600);
        assert_eq!(battery.percent(), 100);
    }

    #[test]
    fn test_temperature() {
        let mut info = ControllerInfo::default();
        info.set_temperature_raw(&[0x50, 0x00]).unwrap();
        assert_eq!(info.temperature_celsius, 30.0);

        info.set_temperature_raw(&[0xF0, 0xFF]).unwrap();
        assert_eq!(info.temperature_celsius, 24.0);
    }

    #[test]
    fn test_colors() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let colors = ColorCalibration::parse(&data).unwrap();

        assert_eq!(colors.body, Rgb(1, 2, 3));
        assert_eq!(colors.right_grip, Rgb(10, 11, 12));
        assert_eq!(colors.buttons.to_string(), "#040506");
    }
}
