//! # joycon-ir
//!
//! Rust driver for the IR camera of the right Joy-Con.
//!
//! ## Features
//!
//! - Ten-step handshake with per-step retry budgets and failure codes
//! - Fragment reassembly with missed-fragment recovery
//! - Closed-loop auto-exposure during warm-up
//! - Async/await API using Tokio over a pluggable HID transport
//!
//! ## Quick Start
//!
//! ```no_run
//! use joycon_ir::{Device, DeviceConfig, Resolution};
//!
//! #[tokio::main]
//! async fn main() -> joycon_ir::Result<()> {
//!     let config = DeviceConfig::default().with_resolution(Resolution::P60);
//!     let mut device = Device::new(config);
//!
//!     // Open the controller and run the handshake
//!     let report = device.connect().await?;
//!     println!("{}", report.info);
//!
//!     // Stream in a background task
//!     let handle = device.spawn_stream(|frame: joycon_ir::Frame| {
//!         println!("{}", frame);
//!     });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     let (_device, stats) = handle.stop().await?;
//!     println!("{} frames", stats.frames);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod handshake;
pub mod stream;

// Re-exports
pub use config::DeviceConfig;
pub use device::Device;
pub use error::{Error, Result};
pub use handshake::{HandshakeReport, RetryPolicy, StepRecord};
pub use stream::{FragmentAssembler, FrameSink, StreamHandle, StreamStats};

// Re-export types
pub use joycon_ir_core::{HandshakeStep, LinkState, Resolution};
pub use joycon_ir_transport::{HidTransport, Transport};
pub use joycon_ir_types::{ControllerInfo, Frame};
