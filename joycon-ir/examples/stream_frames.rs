//! Stream IR frames from a right Joy-Con
//!
//! ```text
//! JOYCON_IR_RESOLUTION=120 JOYCON_IR_SECONDS=10 RUST_LOG=joycon_ir=debug \
//!     cargo run --example stream_frames
//! ```

use std::time::Duration;

use anyhow::Context;
use joycon_ir::{Device, DeviceConfig, Frame, Resolution};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("joycon_ir=info")),
        )
        .init();

    let lines: u16 = std::env::var("JOYCON_IR_RESOLUTION")
        .unwrap_or_else(|_| "240".to_string())
        .parse()
        .context("JOYCON_IR_RESOLUTION must be a number")?;
    let resolution = Resolution::try_from(lines)?;

    let seconds: u64 = std::env::var("JOYCON_IR_SECONDS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("JOYCON_IR_SECONDS must be a number")?;

    let mut device = Device::new(DeviceConfig::default().with_resolution(resolution));

    println!("Connecting ({})...", resolution);
    let report = match device.connect().await {
        Ok(report) => report,
        Err(e) => {
            if let Some(code) = e.step_code() {
                eprintln!("Handshake failed at step {}", code);
            }
            return Err(e.into());
        }
    };
    println!("✓ {}", report.info);
    println!("✓ Handshake retries: {}", report.total_retries());

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let handle = device.spawn_stream(move |frame: Frame| {
        let _ = tx.send(frame);
    });

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            frame = rx.recv() => match frame {
                Some(frame) => println!(
                    "{} white={} mean={}",
                    frame,
                    frame.white_pixels,
                    mean(&frame.data)
                ),
                None => break,
            },
        }
    }

    let (_device, stats) = handle.stop().await?;
    println!("✓ Stopped: {:?}", stats);

    Ok(())
}

fn mean(pixels: &[u8]) -> u32 {
    if pixels.is_empty() {
        return 0;
    }
    pixels.iter().map(|&p| p as u32).sum::<u32>() / pixels.len() as u32
}
