//! # joycon-ir-core
//!
//! Core protocol implementation for the Joy-Con IR camera.
//!
//! This crate provides the low-level protocol primitives:
//! - CRC8 checksum of MCU commands
//! - Command packet construction and reply field access
//! - Rolling counter and link lifecycle state
//! - Resolution profiles, sensor registers and auto-exposure
//!
//! It performs no I/O.

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod exposure;
pub mod ir_config;
pub mod lights;
pub mod packet;
pub mod reply;
pub mod resolution;
pub mod session;
pub mod step;

pub use command::{McuMode, ReportId, Subcommand};
pub use error::{Error, Result};
pub use exposure::{AutoExposure, ExposureSetting};
pub use ir_config::IrSensorConfig;
pub use lights::PlayerLights;
pub use packet::{CommandPacket, Register};
pub use reply::{Fragment, Reply};
pub use resolution::{Resolution, ResolutionProfile};
pub use session::{LinkState, RollingCounter, Session};
pub use step::HandshakeStep;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";
