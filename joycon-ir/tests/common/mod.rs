//! Scripted Joy-Con for integration tests
//!
//! Answers every command the way the controller does, one reply per packet,
//! and records every packet it is sent.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use joycon_ir_core::checksum::crc8;
use joycon_ir_core::constants::{REPLY_LEN, SUBCOMMAND_REPLY_LEN};
use joycon_ir_transport::{Error, Result, Transport};

pub const SERIAL: &[u8; 15] = b"XCW12345678901\0";
pub const COLORS: [u8; 12] = [
    0x32, 0x32, 0x32, 0x0F, 0x0F, 0x0F, 0x1E, 0xDC, 0x00, 0xFF, 0x32, 0x78,
];
pub const MAC: [u8; 6] = [0x98, 0xB6, 0xE9, 0x12, 0x34, 0x56];

/// Packet received by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub report_id: u8,
    pub data: Vec<u8>,
}

impl Sent {
    /// Subcommand (report 0x01) or MCU request (report 0x11) code
    pub fn code(&self) -> u8 {
        self.data[9]
    }

    pub fn is_fragment_ack(&self) -> bool {
        self.report_id == 0x11 && self.data[9] == 0x03 && self.data[10] == 0x00 && self.data[11] == 0x00
    }

    pub fn is_missed_request(&self) -> bool {
        self.report_id == 0x11 && self.data[9] == 0x03 && self.data[11] == 0x01
    }

    pub fn is_register_write(&self) -> bool {
        self.report_id == 0x01 && self.data[9] == 0x21 && self.data[10] == 0x23 && self.data[11] == 0x04
    }
}

pub type SentLog = Arc<Mutex<Vec<Sent>>>;

/// Fake right Joy-Con
pub struct FakeJoyCon {
    open: bool,
    pending: VecDeque<Vec<u8>>,
    sent: SentLog,
    muted: Vec<(u8, Vec<u8>)>,
    ir_mode_stalled: bool,
    imu_on: bool,
    mcu_on: bool,
    mcu_ir: bool,
    streaming: bool,
    script: VecDeque<Vec<u8>>,
    stop_when_drained: Option<Arc<AtomicBool>>,
    fail_when_drained: bool,
}

impl FakeJoyCon {
    pub fn new() -> Self {
        Self {
            open: false,
            pending: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            muted: Vec::new(),
            ir_mode_stalled: false,
            imu_on: false,
            mcu_on: false,
            mcu_ir: false,
            streaming: false,
            script: VecDeque::new(),
            stop_when_drained: None,
            fail_when_drained: false,
        }
    }

    /// Shared log of every packet sent to the fake
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    /// Never answer packets of `report_id` whose bytes from the
    /// subcommand on start with `prefix`
    pub fn mute(mut self, report_id: u8, prefix: &[u8]) -> Self {
        self.muted.push((report_id, prefix.to_vec()));
        self
    }

    /// Never answer this subcommand (report 0x01)
    pub fn mute_subcommand(self, code: u8) -> Self {
        self.mute(0x01, &[code])
    }

    /// Never answer this MCU request (report 0x11)
    pub fn mute_request(self, code: u8) -> Self {
        self.mute(0x11, &[code])
    }

    /// Accept the IR mode command but keep reporting standby
    pub fn stall_ir_mode(mut self) -> Self {
        self.ir_mode_stalled = true;
        self
    }

    fn is_muted(&self, report_id: u8, data: &[u8]) -> bool {
        self.muted
            .iter()
            .any(|(id, prefix)| *id == report_id && data[9..].starts_with(prefix))
    }

    /// Streaming reports returned once streaming starts
    pub fn with_stream(mut self, reports: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.script.extend(reports);
        self
    }

    /// Raise `flag` when the stream script runs out
    pub fn stop_when_drained(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_when_drained = Some(flag);
        self
    }

    /// Fail the next receive after the stream script runs out
    pub fn fail_when_drained(mut self) -> Self {
        self.fail_when_drained = true;
        self
    }

    fn answer(&mut self, report_id: u8, data: &[u8]) -> Option<Vec<u8>> {
        if self.is_muted(report_id, data) {
            return None;
        }

        match report_id {
            0x01 => self.answer_subcommand(data),
            0x11 => self.answer_request(data),
            _ => None,
        }
    }

    fn answer_subcommand(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let code = data[9];
        match code {
            // Rumble only: plain input report
            0x00 => Some(input_report()),
            0x02 => {
                let mut info = vec![0x04, 0x06, 0x02, 0x02];
                info.extend_from_slice(&MAC);
                Some(subcommand_reply(0x82, code, &info))
            }
            0x03 | 0x30 | 0x38 | 0x48 => Some(subcommand_reply(0x80, code, &[])),
            0x10 => {
                let address = u16::from_le_bytes([data[10], data[11]]);
                let length = data[14] as usize;
                let content: &[u8] = match address {
                    0x6001 => SERIAL,
                    0x6050 => &COLORS,
                    _ => &[],
                };
                let mut block = (address as u32).to_le_bytes().to_vec();
                block.push(length as u8);
                block.extend(content.iter().copied().chain(std::iter::repeat(0)).take(length));
                Some(subcommand_reply(0x90, code, &block))
            }
            0x21 => self.answer_mcu_config(data),
            0x22 => {
                self.mcu_on = data[10] == 0x01;
                Some(subcommand_reply(0x80, code, &[]))
            }
            0x40 => {
                self.imu_on = data[10] == 0x01;
                Some(subcommand_reply(0x80, code, &[]))
            }
            0x43 => {
                let register = data[10];
                let value: Vec<u8> = match register {
                    0x10 if self.imu_on => vec![0x60],
                    0x10 => vec![0x00],
                    // 30 degrees
                    0x20 => vec![0x50, 0x00],
                    _ => vec![0x00],
                };
                let mut block = vec![register, data[11]];
                block.extend(value);
                Some(subcommand_reply(0xC0, code, &block))
            }
            0x50 => Some(subcommand_reply(0xD0, code, &[0xA0, 0x05])),
            _ => Some(subcommand_reply(0x80, code, &[])),
        }
    }

    fn answer_mcu_config(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        // The controller drops MCU commands with a bad checksum
        let config_ok = data[47] == crc8(&data[11..47]);
        let diagnostic_ok = data[47] == crc8(&data[10..46]);
        if !config_ok && !diagnostic_ok {
            return None;
        }

        match (data[10], data[11]) {
            (0x21, _) => {
                self.mcu_ir = data[12] == 0x05;
                let mut block = vec![0x01, 0, 0, 0, 0, 0, 0];
                block.extend_from_slice(&1u32.to_le_bytes());
                Some(subcommand_reply(0xA0, 0x21, &block))
            }
            (0x23, 0x01) => Some(subcommand_reply(0xA0, 0x21, &[0x0B])),
            (0x23, 0x04) => Some(subcommand_reply(0xA0, 0x21, &[0x13, 0x00, 0x07])),
            _ => None,
        }
    }

    fn answer_request(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let code = data[9];
        match code {
            0x01 => {
                let state = match (self.mcu_on, self.mcu_ir) {
                    (true, true) if !self.ir_mode_stalled => 0x05,
                    (true, false) => 0x01,
                    _ => 0x00,
                };
                let mut report = mcu_report(0x01);
                report[56] = state;
                Some(report)
            }
            0x03 if data[10] == 0x02 => {
                let mut report = mcu_report(0x13);
                report[51] = 0x07;
                Some(report)
            }
            0x03 => {
                // Fragment ack or missed-fragment request: answered by the script
                self.streaming = true;
                None
            }
            _ => None,
        }
    }
}

impl Default for FakeJoyCon {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeJoyCon {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::AlreadyConnected);
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.streaming = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, report_id: u8, data: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(Error::NotConnected);
        }

        self.sent.lock().push(Sent {
            report_id,
            data: data.to_vec(),
        });

        if let Some(reply) = self.answer(report_id, data) {
            self.pending.push_back(reply);
        }
        Ok(data.len() + 1)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        buf.fill(0);
        if !self.open {
            return Err(Error::NotConnected);
        }

        let next = match self.pending.pop_front() {
            Some(reply) => Some(reply),
            None if self.streaming => self.script.pop_front(),
            None => None,
        };

        match next {
            Some(reply) => {
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                Ok(n)
            }
            None => {
                if self.streaming {
                    if self.fail_when_drained {
                        return Err(Error::ConnectionClosed);
                    }
                    if let Some(flag) = &self.stop_when_drained {
                        flag.store(true, Ordering::Release);
                    }
                }
                tokio::time::sleep(timeout).await;
                Ok(0)
            }
        }
    }

    fn describe(&self) -> String {
        "fake Joy-Con".to_string()
    }
}

fn input_report() -> Vec<u8> {
    let mut report = vec![0u8; SUBCOMMAND_REPLY_LEN];
    report[0] = 0x30;
    report
}

fn subcommand_reply(ack: u8, code: u8, block: &[u8]) -> Vec<u8> {
    let mut report = vec![0u8; SUBCOMMAND_REPLY_LEN];
    report[0] = 0x21;
    report[2] = 0x81;
    report[13] = ack;
    report[14] = code;
    report[15..15 + block.len()].copy_from_slice(block);
    report
}

fn mcu_report(kind: u8) -> Vec<u8> {
    let mut report = vec![0u8; REPLY_LEN];
    report[0] = 0x31;
    report[49] = kind;
    report
}

/// Streaming report carrying fragment `index`, filled with `fill`
pub fn fragment(index: u8, fill: u8) -> Vec<u8> {
    fragment_with_white(index, fill, 0)
}

pub fn fragment_with_white(index: u8, fill: u8, white_pixels: u16) -> Vec<u8> {
    let mut report = mcu_report(0x03);
    report[52] = index;
    report[53] = 0x40;
    report[55..57].copy_from_slice(&white_pixels.to_le_bytes());
    report[59..359].fill(fill);
    report
}

/// Streaming report without a fragment
pub fn empty_report() -> Vec<u8> {
    mcu_report(0xFF)
}

/// Fragments `0..=max` of one frame, each filled with its own index
pub fn frame(max: u8) -> Vec<Vec<u8>> {
    (0..=max).map(|i| fragment(i, i)).collect()
}
