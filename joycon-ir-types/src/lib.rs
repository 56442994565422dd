//! Type definitions for joycon-ir

pub mod controller_info;
pub mod error;
pub mod frame;

pub use controller_info::{BatteryStatus, ColorCalibration, ControllerInfo, ControllerKind, Rgb};
pub use error::{Error, Result};
pub use frame::Frame;
