//! Report ids and subcommand codes

use std::fmt;

use crate::error::{Error, Result};

/// HID report ids used on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReportId {
    /// Rumble + subcommand (outbound)
    Subcommand = 0x01,

    /// Rumble + MCU request, no subcommand wrapper (outbound)
    McuRequest = 0x11,

    /// Standard full report with subcommand reply (inbound)
    SubcommandReply = 0x21,

    /// Standard full report with MCU data, used while streaming (inbound)
    McuData = 0x31,
}

impl From<ReportId> for u8 {
    fn from(id: ReportId) -> u8 {
        id as u8
    }
}

impl TryFrom<u8> for ReportId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Subcommand),
            0x11 => Ok(Self::McuRequest),
            0x21 => Ok(Self::SubcommandReply),
            0x31 => Ok(Self::McuData),
            _ => Err(Error::UnknownReport(value)),
        }
    }
}

/// Subcommand codes
///
/// The device acknowledges a subcommand by echoing the code next to an ack
/// byte. The ack byte has the high bit set, and the low bits describe the
/// attached data type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Subcommand {
    DeviceInfo = 0x02,
    SetInputReportMode = 0x03,
    FlashRead = 0x10,
    McuConfig = 0x21,
    McuState = 0x22,
    PlayerLights = 0x30,
    HomeLight = 0x38,
    EnableImu = 0x40,
    ImuRegisterRead = 0x43,
    EnableVibration = 0x48,
    BatteryVoltage = 0x50,
}

impl Subcommand {
    /// Ack byte the device sends with its reply
    pub fn ack(self) -> u8 {
        match self {
            Self::DeviceInfo => 0x82,
            Self::FlashRead => 0x90,
            Self::McuConfig => 0xA0,
            Self::ImuRegisterRead => 0xC0,
            Self::BatteryVoltage => 0xD0,
            _ => 0x80,
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::DeviceInfo => "DEVICE_INFO",
            Self::SetInputReportMode => "SET_INPUT_REPORT_MODE",
            Self::FlashRead => "FLASH_READ",
            Self::McuConfig => "MCU_CONFIG",
            Self::McuState => "MCU_STATE",
            Self::PlayerLights => "PLAYER_LIGHTS",
            Self::HomeLight => "HOME_LIGHT",
            Self::EnableImu => "ENABLE_IMU",
            Self::ImuRegisterRead => "IMU_REGISTER_READ",
            Self::EnableVibration => "ENABLE_VIBRATION",
            Self::BatteryVoltage => "BATTERY_VOLTAGE",
        }
    }
}

impl From<Subcommand> for u8 {
    fn from(cmd: Subcommand) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Subcommand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x02 => Ok(Self::DeviceInfo),
            0x03 => Ok(Self::SetInputReportMode),
            0x10 => Ok(Self::FlashRead),
            0x21 => Ok(Self::McuConfig),
            0x22 => Ok(Self::McuState),
            0x30 => Ok(Self::PlayerLights),
            0x38 => Ok(Self::HomeLight),
            0x40 => Ok(Self::EnableImu),
            0x43 => Ok(Self::ImuRegisterRead),
            0x48 => Ok(Self::EnableVibration),
            0x50 => Ok(Self::BatteryVoltage),
            _ => Err(Error::UnknownSubcommand(value)),
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Input report modes (argument of `SetInputReportMode`)
pub mod report_mode {
    /// Standard full mode with MCU data (NFC/IR)
    pub const MCU_STREAMING: u8 = 0x31;

    /// Simple HID mode, the quiet mode used before and after streaming
    pub const SILENT: u8 = 0x3F;
}

/// MCU modes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum McuMode {
    Standby = 1,
    Nfc = 4,
    Ir = 5,
}

/// MCU configuration commands (first argument of `McuConfig`)
pub mod mcu_config {
    /// Set MCU mode
    pub const SET_MODE: u8 = 0x21;

    /// IR configuration
    pub const IR: u8 = 0x23;

    /// IR sub-commands
    pub const IR_SET_MODE: u8 = 0x01;
    pub const IR_WRITE_REGISTERS: u8 = 0x04;

    /// IR mode: image transfer
    pub const IR_MODE_IMAGE_TRANSFER: u8 = 0x07;
}

/// MCU request codes (report 0x11, byte 9)
pub mod mcu_request {
    /// Request MCU status
    pub const STATUS: u8 = 0x01;

    /// IR stream control: fragment ack, missed fragment request, mode query
    pub const IR_STREAM: u8 = 0x03;

    /// Argument of `IR_STREAM` asking for the IR mode status
    pub const IR_MODE_QUERY: u8 = 0x02;
}

/// MCU report ids found at the start of the MCU data block
pub mod mcu_report {
    /// MCU state report
    pub const STATE: u8 = 0x01;

    /// IR image fragment
    pub const IR_FRAGMENT: u8 = 0x03;

    /// Reply to `IR_SET_MODE` inside a 0x21 report
    pub const IR_MODE_SET: u8 = 0x0B;

    /// IR status (mode + registers ack)
    pub const IR_STATUS: u8 = 0x13;
}
