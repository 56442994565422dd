//! Outbound command packets
//!
//! # Packet Structure
//!
//! Every command is 48 bytes following the HID report id:
//!
//! ```text
//! ┌─────────┬──────────────┬────────────┬─────────────────────────┬──────────┬──────────┐
//! │ Counter │ Rumble data  │ Subcommand │ Arguments               │ Checksum │ Sentinel │
//! │ byte 0  │ bytes 1..9   │ byte 9     │ bytes 10..46            │ 46 / 47  │ 47       │
//! └─────────┴──────────────┴────────────┴─────────────────────────┴──────────┴──────────┘
//! ```
//!
//! The counter is the low nibble of a per-connection rolling counter. MCU
//! configuration commands (report 0x01, subcommand 0x21) carry a CRC8 over
//! bytes 11..47 in byte 47. MCU requests (report 0x11) carry a CRC8 over
//! bytes 10..46 in byte 46 followed by a 0xFF sentinel.

use std::fmt;

use crate::{
    checksum,
    command::{mcu_config, mcu_request, report_mode, McuMode, ReportId, Subcommand},
    constants::{firmware, registers, COMMAND_LEN, MAX_REGISTERS_PER_WRITE},
    error::{Error, Result},
    exposure::ExposureSetting,
    lights::RumbleFrame,
    resolution::ResolutionProfile,
    session::RollingCounter,
};

const COUNTER: usize = 0;
const RUMBLE: usize = 1;
const SUBCOMMAND: usize = 9;
const ARGUMENTS: usize = 10;
const MISSED_FLAG: usize = 11;
const MISSED_INDEX: usize = 12;
const ACK_INDEX: usize = 13;
const REQUEST_CHECKSUM: usize = 46;
const SENTINEL: usize = 47;
const CONFIG_CHECKSUM: usize = 47;

/// Bytes covered by a checksum
const CHECKSUM_SPAN: usize = 36;

/// 1-based start of the checksum range for MCU configuration commands
const CONFIG_CHECKSUM_START: usize = 12;

/// 1-based start of the checksum range for MCU requests
const REQUEST_CHECKSUM_START: usize = 11;

/// Largest argument block a subcommand can carry
pub const MAX_ARGUMENTS: usize = REQUEST_CHECKSUM - ARGUMENTS;

/// One IR sensor register assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    /// Page in the high byte, offset in the low byte
    pub address: u16,

    /// Value to write
    pub value: u8,
}

impl Register {
    pub const fn new(address: u16, value: u8) -> Self {
        Self { address, value }
    }

    fn to_bytes(self) -> [u8; 3] {
        let [page, offset] = self.address.to_be_bytes();
        [page, offset, self.value]
    }
}

/// Outbound command packet
///
/// # Examples
///
/// ```
/// use joycon_ir_core::{CommandPacket, RollingCounter};
///
/// let mut counter = RollingCounter::new();
/// let ack = CommandPacket::fragment_ack(&mut counter, 7);
///
/// assert_eq!(ack.as_bytes()[0], 0);
/// assert_eq!(ack.as_bytes()[13], 7);
/// assert!(ack.has_valid_checksum());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CommandPacket {
    report_id: ReportId,
    bytes: [u8; COMMAND_LEN],
}

impl CommandPacket {
    /// Zeroed packet stamped with the next counter value
    fn blank(report_id: ReportId, counter: &mut RollingCounter) -> Self {
        let mut bytes = [0u8; COMMAND_LEN];
        bytes[COUNTER] = counter.next();
        Self { report_id, bytes }
    }

    /// Rumble data with no subcommand
    pub fn rumble(counter: &mut RollingCounter, frame: RumbleFrame) -> Self {
        let mut packet = Self::blank(ReportId::Subcommand, counter);
        packet.bytes[RUMBLE..SUBCOMMAND].copy_from_slice(&frame);
        packet
    }

    /// Generic subcommand with arguments
    pub fn subcommand(
        counter: &mut RollingCounter,
        subcommand: Subcommand,
        args: &[u8],
    ) -> Result<Self> {
        if args.len() > MAX_ARGUMENTS {
            return Err(Error::PayloadTooLarge {
                size: args.len(),
                max: MAX_ARGUMENTS,
            });
        }

        let mut packet = Self::blank(ReportId::Subcommand, counter);
        packet.bytes[SUBCOMMAND] = subcommand.into();
        packet.bytes[ARGUMENTS..ARGUMENTS + args.len()].copy_from_slice(args);
        Ok(packet)
    }

    /// Subcommand riding along with rumble data
    pub fn rumble_subcommand(
        counter: &mut RollingCounter,
        frame: RumbleFrame,
        subcommand: Subcommand,
        args: &[u8],
    ) -> Result<Self> {
        let mut packet = Self::subcommand(counter, subcommand, args)?;
        packet.bytes[RUMBLE..SUBCOMMAND].copy_from_slice(&frame);
        Ok(packet)
    }

    /// Switch the input report mode
    pub fn set_input_report_mode(counter: &mut RollingCounter, mode: u8) -> Self {
        Self::single_argument(counter, Subcommand::SetInputReportMode, mode)
    }

    /// Quiet input reports; also stops streaming
    pub fn silence(counter: &mut RollingCounter) -> Self {
        Self::set_input_report_mode(counter, report_mode::SILENT)
    }

    /// Power the MCU up (`true`) or down
    pub fn mcu_state(counter: &mut RollingCounter, enabled: bool) -> Self {
        Self::single_argument(counter, Subcommand::McuState, enabled as u8)
    }

    /// Power the IMU up (`true`) or down
    pub fn imu_state(counter: &mut RollingCounter, enabled: bool) -> Self {
        Self::single_argument(counter, Subcommand::EnableImu, enabled as u8)
    }

    /// Read `length` bytes of flash at `address`
    pub fn flash_read(counter: &mut RollingCounter, address: u16, length: u8) -> Self {
        let [lo, hi] = address.to_le_bytes();
        let mut packet = Self::single_argument(counter, Subcommand::FlashRead, lo);
        packet.bytes[ARGUMENTS + 1] = hi;
        packet.bytes[ARGUMENTS + 4] = length;
        packet
    }

    /// Read `count` IMU registers from `register`
    pub fn imu_register_read(counter: &mut RollingCounter, register: u8, count: u8) -> Self {
        let mut packet = Self::single_argument(counter, Subcommand::ImuRegisterRead, register);
        packet.bytes[ARGUMENTS + 1] = count;
        packet
    }

    /// Ask for MCU status (report 0x11)
    pub fn mcu_status_request(counter: &mut RollingCounter) -> Self {
        let mut packet = Self::blank(ReportId::McuRequest, counter);
        packet.bytes[SUBCOMMAND] = mcu_request::STATUS;
        packet
    }

    /// Put the MCU in `mode`
    pub fn set_mcu_mode(counter: &mut RollingCounter, mode: McuMode) -> Self {
        let mut packet = Self::mcu_config(counter, &[mcu_config::SET_MODE, 0x00, mode as u8]);
        packet.seal_config();
        packet
    }

    /// Select image transfer mode with the profile's fragment count
    pub fn ir_transfer_mode(counter: &mut RollingCounter, profile: &ResolutionProfile) -> Self {
        let [major_hi, major_lo] = firmware::MAJOR.to_be_bytes();
        let [minor_hi, minor_lo] = firmware::MINOR.to_be_bytes();
        let mut packet = Self::mcu_config(
            counter,
            &[
                mcu_config::IR,
                mcu_config::IR_SET_MODE,
                mcu_config::IR_MODE_IMAGE_TRANSFER,
                profile.max_fragment_index,
                major_hi,
                major_lo,
                minor_hi,
                minor_lo,
            ],
        );
        packet.seal_config();
        packet
    }

    /// Write up to 9 IR sensor registers
    pub fn write_registers(counter: &mut RollingCounter, batch: &[Register]) -> Result<Self> {
        let mut packet = Self::register_batch(counter, batch)?;
        packet.seal_config();
        Ok(packet)
    }

    /// Register batch sealed with the request checksum range
    ///
    /// The firmware accepts this variant as a check of the register path; its
    /// checksum covers bytes 10..46 but is stored in byte 47.
    pub fn diagnostic_registers(counter: &mut RollingCounter, batch: &[Register]) -> Result<Self> {
        let mut packet = Self::register_batch(counter, batch)?;
        packet.bytes[CONFIG_CHECKSUM] =
            checksum::calculate(&packet.bytes, CHECKSUM_SPAN, REQUEST_CHECKSUM_START);
        Ok(packet)
    }

    /// Exposure register pair plus finalize
    pub fn exposure(counter: &mut RollingCounter, setting: ExposureSetting) -> Self {
        let batch = [
            Register::new(registers::EXPOSURE_LSB, setting.lsb()),
            Register::new(registers::EXPOSURE_MSB, setting.msb()),
            Register::new(registers::FINALIZE, 0x01),
        ];

        let mut packet = Self::mcu_config(counter, &[mcu_config::IR, mcu_config::IR_WRITE_REGISTERS]);
        packet.put_registers(&batch);
        packet.seal_config();
        packet
    }

    /// Ask for the IR mode status (report 0x11)
    pub fn ir_mode_query(counter: &mut RollingCounter) -> Self {
        let mut packet = Self::blank(ReportId::McuRequest, counter);
        packet.bytes[SUBCOMMAND] = mcu_request::IR_STREAM;
        packet.bytes[ARGUMENTS] = mcu_request::IR_MODE_QUERY;
        packet.seal_request();
        packet
    }

    /// Acknowledge fragment `index` (report 0x11)
    pub fn fragment_ack(counter: &mut RollingCounter, index: u8) -> Self {
        let mut packet = Self::blank(ReportId::McuRequest, counter);
        packet.bytes[SUBCOMMAND] = mcu_request::IR_STREAM;
        packet.bytes[ACK_INDEX] = index;
        packet.seal_request();
        packet
    }

    /// Ask the device to resend from fragment `index` (report 0x11)
    pub fn missed_fragment_request(counter: &mut RollingCounter, index: u8) -> Self {
        let mut packet = Self::blank(ReportId::McuRequest, counter);
        packet.bytes[SUBCOMMAND] = mcu_request::IR_STREAM;
        packet.bytes[MISSED_FLAG] = 0x01;
        packet.bytes[MISSED_INDEX] = index;
        packet.seal_request();
        packet
    }

    /// HID report id to send with
    pub fn report_id(&self) -> ReportId {
        self.report_id
    }

    /// Raw command bytes (report id excluded)
    pub fn as_bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.bytes
    }

    /// Counter value stamped on this packet
    pub fn counter(&self) -> u8 {
        self.bytes[COUNTER]
    }

    /// Subcommand or MCU request byte
    pub fn code(&self) -> u8 {
        self.bytes[SUBCOMMAND]
    }

    /// Check the checksum for packets that carry one
    pub fn has_valid_checksum(&self) -> bool {
        match self.report_id {
            ReportId::McuRequest => {
                checksum::verify(
                    &self.bytes,
                    CHECKSUM_SPAN,
                    REQUEST_CHECKSUM_START,
                    self.bytes[REQUEST_CHECKSUM],
                ) && self.bytes[SENTINEL] == 0xFF
            }
            _ => checksum::verify(
                &self.bytes,
                CHECKSUM_SPAN,
                CONFIG_CHECKSUM_START,
                self.bytes[CONFIG_CHECKSUM],
            ),
        }
    }

    fn single_argument(counter: &mut RollingCounter, subcommand: Subcommand, arg: u8) -> Self {
        let mut packet = Self::blank(ReportId::Subcommand, counter);
        packet.bytes[SUBCOMMAND] = subcommand.into();
        packet.bytes[ARGUMENTS] = arg;
        packet
    }

    fn mcu_config(counter: &mut RollingCounter, args: &[u8]) -> Self {
        let mut packet = Self::blank(ReportId::Subcommand, counter);
        packet.bytes[SUBCOMMAND] = Subcommand::McuConfig.into();
        packet.bytes[ARGUMENTS..ARGUMENTS + args.len()].copy_from_slice(args);
        packet
    }

    fn register_batch(counter: &mut RollingCounter, batch: &[Register]) -> Result<Self> {
        if batch.len() > MAX_REGISTERS_PER_WRITE {
            return Err(Error::RegisterBatchTooLarge {
                count: batch.len(),
                max: MAX_REGISTERS_PER_WRITE,
            });
        }

        let mut packet =
            Self::mcu_config(counter, &[mcu_config::IR, mcu_config::IR_WRITE_REGISTERS]);
        packet.put_registers(batch);
        Ok(packet)
    }

    fn put_registers(&mut self, batch: &[Register]) {
        self.bytes[ARGUMENTS + 2] = batch.len() as u8;
        for (i, register) in batch.iter().enumerate() {
            let at = ARGUMENTS + 3 + i * 3;
            self.bytes[at..at + 3].copy_from_slice(&register.to_bytes());
        }
    }

    fn seal_config(&mut self) {
        self.bytes[CONFIG_CHECKSUM] =
            checksum::calculate(&self.bytes, CHECKSUM_SPAN, CONFIG_CHECKSUM_START);
    }

    fn seal_request(&mut self) {
        self.bytes[REQUEST_CHECKSUM] =
            checksum::calculate(&self.bytes, CHECKSUM_SPAN, REQUEST_CHECKSUM_START);
        self.bytes[SENTINEL] = 0xFF;
    }
}

impl fmt::Debug for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPacket")
            .field("report_id", &format!("0x{:02X}", u8::from(self.report_id)))
            .field("counter", &self.counter())
            .field("code", &format!("0x{:02X}", self.code()))
            .field("bytes", &hex::encode(self.bytes))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::Resolution;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counter_advances_per_packet() {
        let mut counter = RollingCounter::starting_at(15);

        let a = CommandPacket::silence(&mut counter);
        let b = CommandPacket::fragment_ack(&mut counter, 0);
        let c = CommandPacket::mcu_status_request(&mut counter);

        assert_eq!(a.counter(), 15);
        assert_eq!(b.counter(), 0);
        assert_eq!(c.counter(), 1);
    }

    #[test]
    fn test_silence_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::silence(&mut counter);

        assert_eq!(packet.report_id(), ReportId::Subcommand);
        assert_eq!(packet.as_bytes()[9], 0x03);
        assert_eq!(packet.as_bytes()[10], 0x3F);
        assert!(packet.as_bytes()[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_flash_read_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::flash_read(&mut counter, 0x6050, 12);
        let bytes = packet.as_bytes();

        assert_eq!(bytes[9], 0x10);
        assert_eq!(&bytes[10..15], &[0x50, 0x60, 0x00, 0x00, 12]);
    }

    #[test]
    fn test_set_mcu_mode_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::set_mcu_mode(&mut counter, McuMode::Ir);
        let bytes = packet.as_bytes();

        assert_eq!(&bytes[9..13], &[0x21, 0x21, 0x00, 0x05]);
        assert_eq!(bytes[47], checksum::crc8(&bytes[11..47]));
        assert!(packet.has_valid_checksum());
    }

    #[test]
    fn test_ir_transfer_mode_layout() {
        let mut counter = RollingCounter::new();
        let profile = Resolution::P120.profile();
        let packet = CommandPacket::ir_transfer_mode(&mut counter, &profile);

        assert_eq!(
            &packet.as_bytes()[9..18],
            &[0x21, 0x23, 0x01, 0x07, 0x3F, 0x00, 0x05, 0x00, 0x18]
        );
        assert!(packet.has_valid_checksum());
    }

    #[test]
    fn test_fragment_ack_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::fragment_ack(&mut counter, 0x42);
        let bytes = packet.as_bytes();

        assert_eq!(packet.report_id(), ReportId::McuRequest);
        assert_eq!(bytes[9], 0x03);
        assert_eq!(&bytes[11..14], &[0x00, 0x00, 0x42]);
        assert_eq!(bytes[46], checksum::crc8(&bytes[10..46]));
        assert_eq!(bytes[47], 0xFF);
        assert!(packet.has_valid_checksum());
    }

    #[test]
    fn test_missed_fragment_request_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::missed_fragment_request(&mut counter, 2);

        assert_eq!(&packet.as_bytes()[11..14], &[0x01, 0x02, 0x00]);
        assert!(packet.has_valid_checksum());
    }

    #[test]
    fn test_exposure_layout() {
        let mut counter = RollingCounter::new();
        let packet = CommandPacket::exposure(&mut counter, ExposureSetting::from_micros(300));

        assert_eq!(
            &packet.as_bytes()[9..22],
            &[0x21, 0x23, 0x04, 0x03, 0x01, 0x30, 0x90, 0x01, 0x31, 0x24, 0x00, 0x07, 0x01]
        );
        assert!(packet.has_valid_checksum());
    }

    #[test]
    fn test_register_batch_limit() {
        let mut counter = RollingCounter::new();
        let batch = [Register::new(registers::FINALIZE, 1); 10];

        let result = CommandPacket::write_registers(&mut counter, &batch);
        assert!(matches!(
            result,
            Err(Error::RegisterBatchTooLarge { count: 10, max: 9 })
        ));
    }

    #[test]
    fn test_diagnostic_checksum_range() {
        let mut counter = RollingCounter::new();
        let batch = [Register::new(registers::RESOLUTION, 0x00)];
        let packet = CommandPacket::diagnostic_registers(&mut counter, &batch).unwrap();
        let bytes = packet.as_bytes();

        assert_eq!(bytes[47], checksum::crc8(&bytes[10..46]));
    }

    #[test]
    fn test_rumble_subcommand() {
        let mut counter = RollingCounter::new();
        let frame = [1, 2, 3, 4, 5, 6, 7, 8];
        let packet =
            CommandPacket::rumble_subcommand(&mut counter, frame, Subcommand::EnableVibration, &[0])
                .unwrap();

        assert_eq!(&packet.as_bytes()[1..9], &frame);
        assert_eq!(packet.code(), 0x48);
    }

    #[test]
    fn test_payload_too_large() {
        let mut counter = RollingCounter::new();
        let args = [0u8; MAX_ARGUMENTS + 1];

        let result = CommandPacket::subcommand(&mut counter, Subcommand::HomeLight, &args);
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));
        // Rejected packets do not consume a counter value
        assert_eq!(counter.peek(), 0);
    }
}
