//! Inbound reports
//!
//! # Report Structure
//!
//! ```text
//! Subcommand reply (report 0x21)
//! ┌──────┬─────────┬──────────────┬─────┬──────┬────────────────────────────┐
//! │ 0x21 │ timer.. │ battery (2)  │ ... │ ack  │ subcommand echo │ data ... │
//! │ 0    │ 1       │ 2            │     │ 13   │ 14              │ 15..     │
//! └──────┴─────────┴──────────────┴─────┴──────┴────────────────────────────┘
//!
//! MCU streaming report (report 0x31)
//! ┌──────┬─────┬────────────┬──────────┬───────┬──────────┬────────┬───────┬─────────┐
//! │ 0x31 │ ... │ MCU report │ ...      │ frag  │ avg      │ white  │ noise │ payload │
//! │ 0    │     │ 49         │ 50, 51   │ 52    │ 53       │ 55..57 │ 57..59│ 59..359 │
//! └──────┴─────┴────────────┴──────────┴───────┴──────────┴────────┴───────┴─────────┘
//! ```
//!
//! All offsets are absolute, report id included. Multi-byte values are
//! little-endian.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::command::{mcu_config, mcu_report, ReportId, Subcommand};
use crate::constants::{FRAGMENT_LEN, REPLY_LEN};

const REPORT_ID: usize = 0;
const BATTERY: usize = 2;
const ACK: usize = 13;
const SUBCOMMAND_ECHO: usize = 14;
const SUBCOMMAND_DATA: usize = 15;
const MCU_DATA: usize = 49;

/// Offsets inside the subcommand data block
mod data {
    /// Flash reads echo the address (u32 LE) and length
    pub const FLASH_ADDRESS: usize = 0;
    pub const FLASH_CONTENT: usize = 5;

    /// IMU register reads put the value after the address and count
    pub const IMU_VALUE: usize = 2;

    /// MCU configuration replies carry a status word
    pub const MCU_STATUS: usize = 7;
}

/// Offsets inside the MCU data block of a streaming report
mod mcu {
    pub const REPORT: usize = 0;
    pub const FRAGMENT_INDEX: usize = 3;
    pub const AVERAGE_INTENSITY: usize = 4;
    pub const WHITE_PIXELS: usize = 6;
    pub const NOISE_PIXELS: usize = 8;
    pub const STATE: usize = 7;
    pub const PAYLOAD: usize = 10;
}

/// Inbound report buffer with named field access
///
/// The buffer is always `REPLY_LEN` bytes. Fields past the received length
/// read as zero because the buffer is cleared before every receive.
#[derive(Clone)]
pub struct Reply {
    buf: [u8; REPLY_LEN],
    len: usize,
}

impl Reply {
    /// Empty (zeroed) reply
    pub fn new() -> Self {
        Self {
            buf: [0u8; REPLY_LEN],
            len: 0,
        }
    }

    /// Build a reply from received bytes (truncated to `REPLY_LEN`)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut reply = Self::new();
        let len = bytes.len().min(REPLY_LEN);
        reply.buf[..len].copy_from_slice(&bytes[..len]);
        reply.len = len;
        reply
    }

    /// Zero the buffer so stale bytes can never match
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    /// Buffer to receive into
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Record how many bytes were received
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(REPLY_LEN);
    }

    /// Received length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Nothing received (timeout)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Received bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Report id byte
    pub fn report_id(&self) -> u8 {
        self.buf[REPORT_ID]
    }

    /// Check the report id
    pub fn is_report(&self, id: ReportId) -> bool {
        self.report_id() == u8::from(id)
    }

    /// Battery level and connection byte
    pub fn battery_byte(&self) -> u8 {
        self.buf[BATTERY]
    }

    /// Ack byte of a subcommand reply
    pub fn ack(&self) -> u8 {
        self.buf[ACK]
    }

    /// Subcommand the reply answers
    pub fn subcommand_echo(&self) -> u8 {
        self.buf[SUBCOMMAND_ECHO]
    }

    /// Check that this acknowledges `subcommand`
    pub fn acknowledges(&self, subcommand: Subcommand) -> bool {
        self.ack() == subcommand.ack() && self.subcommand_echo() == u8::from(subcommand)
    }

    /// Subcommand reply data
    pub fn subcommand_data(&self) -> &[u8] {
        &self.buf[SUBCOMMAND_DATA..]
    }

    /// Address echoed by a flash read
    pub fn flash_address(&self) -> u32 {
        LittleEndian::read_u32(&self.subcommand_data()[data::FLASH_ADDRESS..])
    }

    /// Content returned by a flash read, if the reply is long enough
    pub fn flash_content(&self, length: usize) -> Option<&[u8]> {
        let start = SUBCOMMAND_DATA + data::FLASH_CONTENT;
        if self.len < start + length {
            return None;
        }
        Some(&self.buf[start..start + length])
    }

    /// IMU register value(s) returned by a register read
    pub fn imu_value(&self) -> &[u8] {
        &self.subcommand_data()[data::IMU_VALUE..]
    }

    /// MCU report id carried by a subcommand reply
    pub fn mcu_config_report(&self) -> u8 {
        self.subcommand_data()[0]
    }

    /// Status word of an MCU configuration reply
    pub fn mcu_config_status(&self) -> u32 {
        LittleEndian::read_u32(&self.subcommand_data()[data::MCU_STATUS..])
    }

    /// MCU data block of a streaming report
    pub fn mcu_data(&self) -> &[u8] {
        &self.buf[MCU_DATA..]
    }

    /// MCU report id of a streaming report
    pub fn mcu_report(&self) -> u8 {
        self.mcu_data()[mcu::REPORT]
    }

    /// MCU state of a status report (1: standby, 5: IR)
    pub fn mcu_state(&self) -> u8 {
        self.mcu_data()[mcu::STATE]
    }

    /// IR status in a subcommand reply confirms image transfer mode
    pub fn config_reports_image_transfer(&self) -> bool {
        confirms_image_transfer(self.subcommand_data())
    }

    /// IR status in a streaming report confirms image transfer mode
    pub fn mcu_reports_image_transfer(&self) -> bool {
        confirms_image_transfer(self.mcu_data())
    }

    /// View as an image fragment, if it is one
    pub fn fragment(&self) -> Option<Fragment<'_>> {
        if self.is_report(ReportId::McuData) && self.mcu_report() == mcu_report::IR_FRAGMENT {
            Some(Fragment { reply: self })
        } else {
            None
        }
    }
}

fn confirms_image_transfer(block: &[u8]) -> bool {
    block[0] == mcu_report::IR_STATUS
        && block[1] == 0x00
        && block[2] == mcu_config::IR_MODE_IMAGE_TRANSFER
}

impl Default for Reply {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("report_id", &format!("0x{:02X}", self.report_id()))
            .field("len", &self.len)
            .field("head", &hex::encode(&self.buf[..self.len.min(64)]))
            .finish()
    }
}

/// Image fragment inside a streaming report
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    reply: &'a Reply,
}

impl<'a> Fragment<'a> {
    fn field(&self, offset: usize) -> u8 {
        self.reply.mcu_data()[offset]
    }

    /// Fragment number
    pub fn index(&self) -> u8 {
        self.field(mcu::FRAGMENT_INDEX)
    }

    /// Average intensity of the frame (0..255)
    pub fn average_intensity(&self) -> u8 {
        self.field(mcu::AVERAGE_INTENSITY)
    }

    /// White pixel count of the frame
    pub fn white_pixels(&self) -> u16 {
        LittleEndian::read_u16(&self.reply.mcu_data()[mcu::WHITE_PIXELS..])
    }

    /// Noise pixel count of the frame
    pub fn noise_pixels(&self) -> u16 {
        LittleEndian::read_u16(&self.reply.mcu_data()[mcu::NOISE_PIXELS..])
    }

    /// Image bytes
    pub fn payload(&self) -> &'a [u8] {
        let data = self.reply.mcu_data();
        &data[mcu::PAYLOAD..mcu::PAYLOAD + FRAGMENT_LEN]
    }
}
