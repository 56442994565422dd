//! Handshake sequencer
//!
//! Brings an opened controller from "attached" to "streaming-ready" in ten
//! ordered steps. Every step that waits for a reply goes through one bounded
//! retry driver ([`Link::exchange`]): send the request, poll for a matching
//! reply, resend when the poll budget runs out, give up when the attempt
//! budget runs out.
//!
//! A transport error is never retried; it ends the handshake immediately.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use joycon_ir_core::command::{mcu_report, report_mode};
use joycon_ir_core::constants::{flash, imu};
use joycon_ir_core::lights::{
    HOME_LIGHT_BREATHING, HOME_LIGHT_HEARTBEAT, READY_RUMBLE, READY_RUMBLE_TAIL_MS,
    RUMBLE_NEUTRAL,
};
use joycon_ir_core::{
    CommandPacket, ExposureSetting, HandshakeStep, IrSensorConfig, LinkState, McuMode,
    PlayerLights, Reply, ReportId, RollingCounter, Session, Subcommand,
};
use joycon_ir_transport::Transport;
use joycon_ir_types::{BatteryStatus, ColorCalibration, ControllerInfo};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// Settle time before polling for the streaming report mode ack
const REPORT_MODE_SETTLE: Duration = Duration::from_millis(50);

/// IMU warm-up before the temperature can be read
const IMU_SETTLE: Duration = Duration::from_millis(64);

/// Bytes of the device info block
const DEVICE_INFO_LEN: usize = 10;

/// Attempt and poll budget for one request/reply exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Times the request is sent
    pub attempts: u32,

    /// Receives per attempt
    pub polls: u32,

    /// Timeout of each receive
    pub poll_timeout: Duration,

    /// Pause between sending and the first poll
    pub settle: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, polls: u32, poll_timeout: Duration) -> Self {
        Self {
            attempts,
            polls,
            poll_timeout,
            settle: Duration::ZERO,
        }
    }

    /// Wait `settle` after each send
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Successful exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation<T> {
    /// Value extracted from the matching reply
    pub value: T,

    /// Attempt that got the reply (1-based)
    pub attempts: u32,
}

impl<T> Confirmation<T> {
    /// Attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Retries spent in one handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub step: HandshakeStep,
    pub retries: u32,
}

/// Outcome of a completed handshake
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandshakeReport {
    /// Information read in step 3
    pub info: ControllerInfo,

    /// One record per step, in order
    pub steps: Vec<StepRecord>,
}

impl HandshakeReport {
    /// Retries over all steps
    pub fn total_retries(&self) -> u32 {
        self.steps.iter().map(|r| r.retries).sum()
    }

    /// Retries spent in `step`
    pub fn retries_for(&self, step: HandshakeStep) -> Option<u32> {
        self.steps.iter().find(|r| r.step == step).map(|r| r.retries)
    }
}

/// Request/reply plumbing shared by the handshake and the stop command
pub(crate) struct Link<'a> {
    transport: &'a mut dyn Transport,
    session: &'a mut Session,
    reply: Reply,
}

impl<'a> Link<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport, session: &'a mut Session) -> Self {
        Self {
            transport,
            session,
            reply: Reply::new(),
        }
    }

    pub(crate) fn counter(&mut self) -> &mut RollingCounter {
        self.session.counter()
    }

    pub(crate) async fn send(&mut self, packet: &CommandPacket) -> Result<()> {
        trace!("Sending: {:?}", packet);
        self.transport
            .send(packet.report_id().into(), packet.as_bytes())
            .await?;
        Ok(())
    }

    /// Receive into the reply buffer; an empty reply means timeout
    pub(crate) async fn receive(&mut self, timeout: Duration) -> Result<&Reply> {
        self.reply.clear();
        let n = self.transport.receive(self.reply.buffer_mut(), timeout).await?;
        self.reply.set_len(n);
        Ok(&self.reply)
    }

    /// Send and swallow one reply without checking it
    pub(crate) async fn send_and_drain(
        &mut self,
        packet: &CommandPacket,
        timeout: Duration,
    ) -> Result<()> {
        self.send(packet).await?;
        self.receive(timeout).await?;
        Ok(())
    }

    /// Bounded retry driver
    ///
    /// `request` builds the packets of one attempt (a fresh counter value per
    /// packet). `matcher` inspects each reply and returns `Some` on success.
    pub(crate) async fn exchange<T, I, R, M>(
        &mut self,
        step: HandshakeStep,
        operation: &'static str,
        policy: RetryPolicy,
        mut request: R,
        mut matcher: M,
    ) -> Result<Confirmation<T>>
    where
        I: IntoIterator<Item = CommandPacket>,
        R: FnMut(&mut RollingCounter) -> joycon_ir_core::Result<I>,
        M: FnMut(&Reply) -> Option<T>,
    {
        for attempt in 1..=policy.attempts {
            debug!(step = %step, attempt = attempt, "{}", operation);

            let packets: Vec<CommandPacket> = request(self.counter())?.into_iter().collect();
            for packet in &packets {
                self.send(packet).await?;
            }

            if !policy.settle.is_zero() {
                sleep(policy.settle).await;
            }

            for _ in 0..policy.polls {
                let reply = self.receive(policy.poll_timeout).await?;
                if let Some(value) = matcher(reply) {
                    return Ok(Confirmation {
                        value,
                        attempts: attempt,
                    });
                }
            }
        }

        warn!(
            step = %step,
            attempts = policy.attempts,
            "No reply for {}, giving up",
            operation
        );

        Err(Error::ProtocolTimeout {
            step,
            operation,
            attempts: policy.attempts,
        })
    }
}

/// Handshake runner for one connection
pub(crate) struct Handshake<'a> {
    link: Link<'a>,
    config: &'a DeviceConfig,
    report: HandshakeReport,
    current: Option<StepRecord>,
}

impl<'a> Handshake<'a> {
    pub(crate) fn new(
        transport: &'a mut dyn Transport,
        session: &'a mut Session,
        config: &'a DeviceConfig,
    ) -> Self {
        Self {
            link: Link::new(transport, session),
            config,
            report: HandshakeReport::default(),
            current: None,
        }
    }

    /// Run all ten steps; the session ends in `Ready` on success
    pub(crate) async fn run(mut self) -> Result<HandshakeReport> {
        for step in HandshakeStep::ALL {
            self.begin(step)?;

            match step {
                HandshakeStep::SilenceInputReports => self.silence_input_reports().await?,
                HandshakeStep::BusyLights => self.busy_lights().await?,
                HandshakeStep::ReadControllerInfo => self.read_controller_info().await?,
                HandshakeStep::ReadyCue => self.ready_cue().await?,
                HandshakeStep::StreamingReportMode => self.streaming_report_mode().await?,
                HandshakeStep::EnableMcu => self.enable_mcu().await?,
                HandshakeStep::AwaitMcuStandby => self.await_mcu_standby().await?,
                HandshakeStep::SetMcuIrMode => self.set_mcu_ir_mode().await?,
                HandshakeStep::ConfirmMcuIrMode => self.confirm_mcu_ir_mode().await?,
                HandshakeStep::ConfigureIrSensor => self.configure_ir_sensor().await?,
            }

            self.finish();
        }

        self.link.session.transition(LinkState::Ready)?;
        info!(
            retries = self.report.total_retries(),
            "Handshake complete, {}",
            self.report.info
        );

        Ok(self.report)
    }

    fn begin(&mut self, step: HandshakeStep) -> Result<()> {
        self.link
            .session
            .transition(LinkState::HandshakeInProgress(step))?;
        self.current = Some(StepRecord { step, retries: 0 });
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(record) = self.current.take() {
            debug!(step = %record.step, retries = record.retries, "Handshake step done");
            self.report.steps.push(record);
        }
    }

    fn step(&self) -> HandshakeStep {
        self.current
            .map(|r| r.step)
            .unwrap_or(HandshakeStep::SilenceInputReports)
    }

    fn policy(&self, attempts: u32, polls: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, polls, self.config.poll_timeout)
    }

    async fn exchange<T, I, R, M>(
        &mut self,
        operation: &'static str,
        policy: RetryPolicy,
        request: R,
        matcher: M,
    ) -> Result<T>
    where
        I: IntoIterator<Item = CommandPacket>,
        R: FnMut(&mut RollingCounter) -> joycon_ir_core::Result<I>,
        M: FnMut(&Reply) -> Option<T>,
    {
        let step = self.step();
        let confirmation = self
            .link
            .exchange(step, operation, policy, request, matcher)
            .await?;

        if let Some(record) = self.current.as_mut() {
            record.retries += confirmation.retries();
        }
        Ok(confirmation.value)
    }

    async fn drain(&mut self, packet: CommandPacket) -> Result<()> {
        self.link
            .send_and_drain(&packet, self.config.poll_timeout)
            .await
    }

    // Step 1
    async fn silence_input_reports(&mut self) -> Result<()> {
        self.exchange(
            "silence input reports",
            self.policy(6, 9),
            |c| Ok([CommandPacket::silence(c)]),
            |r| r.acknowledges(Subcommand::SetInputReportMode).then_some(()),
        )
        .await
    }

    // Step 2
    async fn busy_lights(&mut self) -> Result<()> {
        let lights = CommandPacket::subcommand(
            self.link.counter(),
            Subcommand::PlayerLights,
            &[PlayerLights::BUSY.bits()],
        )?;
        self.drain(lights).await?;

        let home = CommandPacket::subcommand(
            self.link.counter(),
            Subcommand::HomeLight,
            &HOME_LIGHT_BREATHING,
        )?;
        self.drain(home).await
    }

    // Step 3
    async fn read_controller_info(&mut self) -> Result<()> {
        let serial = self
            .read_flash(flash::SERIAL_NUMBER, flash::SERIAL_NUMBER_LEN)
            .await?;
        let mut info = ControllerInfo::new(ControllerInfo::decode_serial(&serial));

        let device_info = self
            .exchange(
                "read device info",
                self.policy(21, 9),
                |c| Ok([CommandPacket::subcommand(c, Subcommand::DeviceInfo, &[])?]),
                |r| {
                    r.acknowledges(Subcommand::DeviceInfo)
                        .then(|| r.subcommand_data()[..DEVICE_INFO_LEN].to_vec())
                },
            )
            .await?;
        info.set_device_info(&device_info)?;

        info.battery = self
            .exchange(
                "read battery",
                self.policy(21, 9),
                |c| Ok([CommandPacket::subcommand(c, Subcommand::BatteryVoltage, &[])?]),
                |r| {
                    if !r.acknowledges(Subcommand::BatteryVoltage) {
                        return None;
                    }
                    BatteryStatus::parse(r.battery_byte(), r.subcommand_data()).ok()
                },
            )
            .await?;

        let temperature = self.read_temperature().await?;
        info.set_temperature_raw(&temperature)?;

        let colors = self
            .read_flash(flash::COLOR_CALIBRATION, flash::COLOR_CALIBRATION_LEN)
            .await?;
        info.colors = ColorCalibration::parse(&colors)?;

        info!("Controller: {}", info);
        self.report.info = info;
        Ok(())
    }

    async fn read_flash(&mut self, address: u16, length: u8) -> Result<Vec<u8>> {
        self.exchange(
            "read flash",
            self.policy(21, 9),
            |c| Ok([CommandPacket::flash_read(c, address, length)]),
            |r| {
                if !r.acknowledges(Subcommand::FlashRead) || r.flash_address() != address as u32 {
                    return None;
                }
                r.flash_content(length as usize).map(<[u8]>::to_vec)
            },
        )
        .await
    }

    async fn read_temperature(&mut self) -> Result<[u8; 2]> {
        let read_imu = |register: u8, count: u8| {
            move |c: &mut RollingCounter| -> joycon_ir_core::Result<[CommandPacket; 1]> {
                Ok([CommandPacket::imu_register_read(c, register, count)])
            }
        };

        let ctrl = self
            .exchange(
                "read IMU state",
                self.policy(21, 9),
                read_imu(imu::CTRL, 1),
                |r| r.acknowledges(Subcommand::ImuRegisterRead).then(|| r.imu_value()[0]),
            )
            .await?;

        let imu_was_off = ctrl >> 4 == 0;
        if imu_was_off {
            debug!("IMU is off, enabling it to read the temperature");
            let enable = CommandPacket::imu_state(self.link.counter(), true);
            self.drain(enable).await?;
            sleep(IMU_SETTLE).await;
        }

        let raw = self
            .exchange(
                "read temperature",
                self.policy(21, 9),
                read_imu(imu::TEMPERATURE, 2),
                |r| {
                    r.acknowledges(Subcommand::ImuRegisterRead)
                        .then(|| [r.imu_value()[0], r.imu_value()[1]])
                },
            )
            .await?;

        if imu_was_off {
            let disable = CommandPacket::imu_state(self.link.counter(), false);
            self.drain(disable).await?;
        }

        Ok(raw)
    }

    // Step 4
    async fn ready_cue(&mut self) -> Result<()> {
        let vibration_on =
            CommandPacket::subcommand(self.link.counter(), Subcommand::EnableVibration, &[0x01])?;
        self.drain(vibration_on).await?;

        for step in READY_RUMBLE {
            sleep(Duration::from_millis(step.delay_ms)).await;
            let rumble = CommandPacket::rumble(self.link.counter(), step.frame);
            self.drain(rumble).await?;
        }

        sleep(Duration::from_millis(READY_RUMBLE_TAIL_MS)).await;
        let vibration_off = CommandPacket::rumble_subcommand(
            self.link.counter(),
            RUMBLE_NEUTRAL,
            Subcommand::EnableVibration,
            &[0x00],
        )?;
        self.drain(vibration_off).await?;

        let lights = CommandPacket::subcommand(
            self.link.counter(),
            Subcommand::PlayerLights,
            &[PlayerLights::READY.bits()],
        )?;
        self.drain(lights).await?;

        let home = CommandPacket::subcommand(
            self.link.counter(),
            Subcommand::HomeLight,
            &HOME_LIGHT_HEARTBEAT,
        )?;
        self.drain(home).await
    }

    // Step 5
    async fn streaming_report_mode(&mut self) -> Result<()> {
        self.exchange(
            "switch to MCU streaming reports",
            self.policy(8, 9).with_settle(REPORT_MODE_SETTLE),
            |c| {
                Ok([CommandPacket::set_input_report_mode(
                    c,
                    report_mode::MCU_STREAMING,
                )])
            },
            |r| r.acknowledges(Subcommand::SetInputReportMode).then_some(()),
        )
        .await
    }

    // Step 6
    async fn enable_mcu(&mut self) -> Result<()> {
        self.exchange(
            "enable MCU",
            self.policy(9, 8),
            |c| Ok([CommandPacket::mcu_state(c, true)]),
            |r| r.acknowledges(Subcommand::McuState).then_some(()),
        )
        .await
    }

    // Step 7
    async fn await_mcu_standby(&mut self) -> Result<()> {
        self.poll_mcu_state("wait for MCU standby", self.policy(9, 9), McuMode::Standby)
            .await
    }

    // Step 8
    async fn set_mcu_ir_mode(&mut self) -> Result<()> {
        self.exchange(
            "set MCU IR mode",
            self.policy(9, 9),
            |c| Ok([CommandPacket::set_mcu_mode(c, McuMode::Ir)]),
            |r| {
                (r.is_report(ReportId::SubcommandReply)
                    && r.mcu_config_report() == mcu_report::STATE
                    && r.mcu_config_status() == 1)
                    .then_some(())
            },
        )
        .await
    }

    // Step 9
    async fn confirm_mcu_ir_mode(&mut self) -> Result<()> {
        self.poll_mcu_state("confirm MCU IR mode", self.policy(8, 9), McuMode::Ir)
            .await
    }

    async fn poll_mcu_state(
        &mut self,
        operation: &'static str,
        policy: RetryPolicy,
        expected: McuMode,
    ) -> Result<()> {
        self.exchange(
            operation,
            policy,
            |c| Ok([CommandPacket::mcu_status_request(c)]),
            |r| {
                (r.is_report(ReportId::McuData)
                    && r.mcu_report() == mcu_report::STATE
                    && r.mcu_state() == expected as u8)
                    .then_some(())
            },
        )
        .await
    }

    // Step 10
    async fn configure_ir_sensor(&mut self) -> Result<()> {
        let profile = self.config.profile();
        let sensor = IrSensorConfig::new(
            &profile,
            ExposureSetting::from_micros(self.config.initial_exposure_us),
        );

        self.exchange(
            "set IR image transfer mode",
            self.policy(8, 8),
            |c| Ok([CommandPacket::ir_transfer_mode(c, &profile)]),
            |r| {
                (r.is_report(ReportId::SubcommandReply)
                    && r.mcu_config_report() == mcu_report::IR_MODE_SET)
                    .then_some(())
            },
        )
        .await?;

        let diagnostic = sensor.diagnostic_batch();
        self.exchange(
            "check IR register path",
            self.policy(8, 5),
            |c| {
                Ok([
                    CommandPacket::diagnostic_registers(c, &diagnostic)?,
                    CommandPacket::ir_mode_query(c),
                ])
            },
            |r| (r.is_report(ReportId::McuData) && r.mcu_reports_image_transfer()).then_some(()),
        )
        .await?;

        let sensor_batch = sensor.sensor_batch();
        self.exchange(
            "write IR sensor registers",
            self.policy(8, 9),
            |c| {
                Ok([
                    CommandPacket::write_registers(c, &sensor_batch)?,
                    CommandPacket::ir_mode_query(c),
                ])
            },
            confirms_register_write,
        )
        .await?;

        let image_batch = sensor.image_batch();
        self.exchange(
            "write IR image registers",
            self.policy(8, 8),
            |c| Ok([CommandPacket::write_registers(c, &image_batch)?]),
            confirms_register_write,
        )
        .await?;

        info!(
            resolution = %self.config.resolution,
            exposure_us = sensor.exposure.micros,
            "IR sensor configured"
        );
        Ok(())
    }
}

fn confirms_register_write(reply: &Reply) -> Option<()> {
    (reply.is_report(ReportId::SubcommandReply) && reply.config_reports_image_transfer())
        .then_some(())
}

/// Send the stop command (quiet report mode), one attempt
///
/// Returns whether the device acknowledged it.
pub(crate) async fn stop_streaming(link: &mut Link<'_>, poll_timeout: Duration) -> Result<bool> {
    let packet = CommandPacket::silence(link.counter());
    link.send(&packet).await?;

    for _ in 0..9 {
        let reply = link.receive(poll_timeout).await?;
        if reply.acknowledges(Subcommand::SetInputReportMode) {
            return Ok(true);
        }
    }
    Ok(false)
}
