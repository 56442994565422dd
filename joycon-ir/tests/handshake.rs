mod common;

use common::{FakeJoyCon, Sent};
use joycon_ir::{Device, DeviceConfig, Error, HandshakeStep, LinkState, Resolution};
use joycon_ir_types::ControllerKind;
use pretty_assertions::assert_eq;

fn config() -> DeviceConfig {
    DeviceConfig::default().with_resolution(Resolution::P60)
}

fn count(sent: &[Sent], report_id: u8, code: u8) -> usize {
    sent.iter()
        .filter(|p| p.report_id == report_id && p.code() == code)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_handshake_completes() {
    let fake = FakeJoyCon::new();
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);

    let report = device.connect().await.unwrap();

    assert_eq!(device.state(), LinkState::Ready);
    assert!(device.is_connected());
    assert_eq!(report.steps.len(), 10);
    assert_eq!(report.total_retries(), 0);

    let steps: Vec<HandshakeStep> = report.steps.iter().map(|r| r.step).collect();
    assert_eq!(steps, HandshakeStep::ALL.to_vec());

    // Every packet carries the low nibble of a rolling counter
    let sent = log.lock();
    for (i, packet) in sent.iter().enumerate() {
        assert_eq!(packet.data[0], (i % 16) as u8);
        assert_eq!(packet.data.len(), 48);
    }
}

#[tokio::test(start_paused = true)]
async fn test_handshake_reads_controller_info() {
    let mut device = Device::with_transport(config(), FakeJoyCon::new());
    let report = device.connect().await.unwrap();
    let info = &report.info;

    assert_eq!(info.serial_number, "XCW12345678901");
    assert_eq!(info.firmware_version(), "4.06");
    assert_eq!(info.kind, ControllerKind::RightJoyCon);
    assert_eq!(info.mac_string(), "98:B6:E9:12:34:56");
    assert_eq!(info.battery.level, 8);
    assert!(!info.battery.charging);
    assert_eq!(info.battery.millivolts(), 3600);
    assert_eq!(info.temperature_celsius, 30.0);
    assert_eq!(info.colors.body.to_string(), "#323232");
    assert_eq!(info.colors.buttons.to_string(), "#0F0F0F");

    assert_eq!(device.info(), Some(info));
}

#[tokio::test(start_paused = true)]
async fn test_temperature_read_toggles_imu() {
    let fake = FakeJoyCon::new();
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);
    device.connect().await.unwrap();

    let sent = log.lock();
    let imu: Vec<u8> = sent
        .iter()
        .filter(|p| p.report_id == 0x01 && p.code() == 0x40)
        .map(|p| p.data[10])
        .collect();
    assert_eq!(imu, vec![0x01, 0x00]);
}

#[tokio::test(start_paused = true)]
async fn test_mcu_commands_carry_valid_checksums() {
    let fake = FakeJoyCon::new();
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);
    device.connect().await.unwrap();

    let sent = log.lock();
    let requests: Vec<&Sent> = sent.iter().filter(|p| p.report_id == 0x11).collect();
    assert!(!requests.is_empty());
    for packet in requests {
        assert_eq!(packet.data[46], joycon_ir_core::checksum::crc8(&packet.data[10..46]));
        assert_eq!(packet.data[47], 0xFF);
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_step_fails_with_its_code() {
    // MCU power-up never acknowledged
    let fake = FakeJoyCon::new().mute_subcommand(0x22);
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);

    let err = device.connect().await.unwrap_err();

    assert_eq!(err.step_code(), Some(6));
    assert!(err.is_recoverable());
    assert!(matches!(
        err,
        Error::ProtocolTimeout {
            step: HandshakeStep::EnableMcu,
            attempts: 9,
            ..
        }
    ));

    assert_eq!(device.state(), LinkState::Closed);
    assert!(!device.is_connected());

    // Nine attempts, then nothing from later steps
    let sent = log.lock();
    assert_eq!(count(&sent, 0x01, 0x22), 9);
    assert_eq!(count(&sent, 0x11, 0x01), 0);
    assert_eq!(count(&sent, 0x01, 0x21), 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_step_failure() {
    let fake = FakeJoyCon::new().mute_subcommand(0x03);
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);

    let err = device.connect().await.unwrap_err();
    assert_eq!(err.step_code(), Some(1));

    let sent = log.lock();
    assert_eq!(sent.len(), 6);
    assert!(sent.iter().all(|p| p.report_id == 0x01 && p.code() == 0x03));
}

#[tokio::test(start_paused = true)]
async fn test_mcu_state_timeout() {
    let fake = FakeJoyCon::new().mute_request(0x01);
    let mut device = Device::with_transport(config(), fake);

    let err = device.connect().await.unwrap_err();
    assert_eq!(err.step_code(), Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_failure() {
    let fake = FakeJoyCon::new().mute_subcommand(0x10);
    let mut device = Device::with_transport(config(), fake);

    let first = device.connect().await.unwrap_err();
    assert_eq!(first.step_code(), Some(3));

    // A closed device may be connected again
    let second = device.connect().await.unwrap_err();
    assert_eq!(second.step_code(), Some(3));
    assert_eq!(device.state(), LinkState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_rejected() {
    let mut device = Device::with_transport(config(), FakeJoyCon::new());
    device.connect().await.unwrap();

    let err = device.connect().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(device.state(), LinkState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_after_handshake() {
    let fake = FakeJoyCon::new();
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);
    device.connect().await.unwrap();

    device.disconnect().await.unwrap();

    assert_eq!(device.state(), LinkState::Closed);
    assert!(!device.is_connected());

    // Last packet is the stop command: quiet report mode
    let sent = log.lock();
    let last = sent.last().unwrap();
    assert_eq!(last.report_id, 0x01);
    assert_eq!(last.code(), 0x03);
    assert_eq!(last.data[10], 0x3F);
}

/// Handshake against `fake`, expected to fail
async fn failed_handshake(fake: FakeJoyCon) -> (Error, Vec<Sent>) {
    let log = fake.sent_log();
    let mut device = Device::with_transport(config(), fake);

    let err = device.connect().await.unwrap_err();
    assert_eq!(device.state(), LinkState::Closed);

    let sent = log.lock().clone();
    (err, sent)
}

fn operation(err: &Error) -> &'static str {
    match err {
        Error::ProtocolTimeout { operation, .. } => *operation,
        other => panic!("unexpected error: {other}"),
    }
}

fn register_writes(sent: &[Sent], count: u8) -> usize {
    sent.iter()
        .filter(|p| p.is_register_write() && p.data[12] == count)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_streaming_report_mode_timeout() {
    // Quiet mode (step 1) is still acknowledged
    let (err, sent) = failed_handshake(FakeJoyCon::new().mute(0x01, &[0x03, 0x31])).await;

    assert_eq!(err.step_code(), Some(5));
    let mode_switches = sent
        .iter()
        .filter(|p| p.report_id == 0x01 && p.code() == 0x03 && p.data[10] == 0x31)
        .count();
    assert_eq!(mode_switches, 8);
    assert_eq!(count(&sent, 0x01, 0x22), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_mcu_ir_mode_timeout() {
    let (err, sent) = failed_handshake(FakeJoyCon::new().mute(0x01, &[0x21, 0x21])).await;

    assert_eq!(err.step_code(), Some(8));
    assert_eq!(count(&sent, 0x01, 0x21), 9);
    // Step 7 polled once, step 9 never ran
    assert_eq!(count(&sent, 0x11, 0x01), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_mcu_ir_mode_timeout() {
    let (err, sent) = failed_handshake(FakeJoyCon::new().stall_ir_mode()).await;

    assert_eq!(err.step_code(), Some(9));
    assert_eq!(count(&sent, 0x11, 0x01), 1 + 8);
    assert!(!sent.iter().any(|p| p.code() == 0x21 && p.data[10] == 0x23));
}

#[tokio::test(start_paused = true)]
async fn test_ir_transfer_mode_timeout() {
    let (err, sent) = failed_handshake(FakeJoyCon::new().mute(0x01, &[0x21, 0x23, 0x01])).await;

    assert_eq!(err.step_code(), Some(10));
    assert_eq!(operation(&err), "set IR image transfer mode");
    assert!(!sent.iter().any(|p| p.is_register_write()));
}

#[tokio::test(start_paused = true)]
async fn test_register_path_check_timeout() {
    let (err, sent) = failed_handshake(FakeJoyCon::new().mute(0x11, &[0x03, 0x02])).await;

    assert_eq!(err.step_code(), Some(10));
    assert_eq!(operation(&err), "check IR register path");

    // Eight diagnostic batches at full resolution, no sensor batch
    let diagnostic = sent
        .iter()
        .filter(|p| p.is_register_write() && p.data[12] == 9 && p.data[15] == 0x00)
        .count();
    assert_eq!(diagnostic, 8);
    assert_eq!(register_writes(&sent, 9), 8);
}

#[tokio::test(start_paused = true)]
async fn test_sensor_batch_timeout() {
    let binning = Resolution::P60.profile().binning;
    let fake = FakeJoyCon::new().mute(0x01, &[0x21, 0x23, 0x04, 0x09, 0x00, 0x2E, binning]);
    let (err, sent) = failed_handshake(fake).await;

    assert_eq!(err.step_code(), Some(10));
    assert_eq!(operation(&err), "write IR sensor registers");
    // One diagnostic batch, eight sensor batches, no image batch
    assert_eq!(register_writes(&sent, 9), 1 + 8);
    assert_eq!(register_writes(&sent, 8), 0);
}

#[tokio::test(start_paused = true)]
async fn test_image_batch_timeout() {
    let (err, sent) = failed_handshake(FakeJoyCon::new().mute(0x01, &[0x21, 0x23, 0x04, 0x08])).await;

    assert_eq!(err.step_code(), Some(10));
    assert_eq!(operation(&err), "write IR image registers");
    assert_eq!(register_writes(&sent, 8), 8);
    assert!(!sent.iter().any(|p| p.is_fragment_ack()));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_initial_exposure_is_clamped() {
    let fake = FakeJoyCon::new();
    let log = fake.sent_log();
    let mut config = config();
    config.initial_exposure_us = 3000;
    let mut device = Device::with_transport(config, fake);

    device.connect().await.unwrap();
    assert_eq!(device.exposure_us(), 600);

    // Exposure LSB/MSB are the second and third registers of both 9-register batches
    let sent = log.lock();
    let batches: Vec<&Sent> = sent
        .iter()
        .filter(|p| p.is_register_write() && p.data[12] == 9)
        .collect();
    assert_eq!(batches.len(), 2);
    for packet in batches {
        assert_eq!(&packet.data[16..18], &[0x01, 0x30]);
        assert_eq!(&packet.data[19..21], &[0x01, 0x31]);
        let raw = u16::from_le_bytes([packet.data[18], packet.data[21]]);
        assert_eq!(raw, 18720);
    }
}
