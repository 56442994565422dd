//! Transport layer for the Joy-Con IR protocol
//!
//! Moves HID reports between the host and the controller.

pub mod error;
pub mod hid;

pub use error::{Error, Result};
pub use hid::HidTransport;

use std::time::Duration;

use async_trait::async_trait;

/// Transport trait for different HID backends
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the device
    async fn open(&mut self) -> Result<()>;

    /// Close the device
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Send one output report (`data` excludes the report id)
    async fn send(&mut self, report_id: u8, data: &[u8]) -> Result<usize>;

    /// Receive one input report into `buf`
    ///
    /// The buffer is zero-filled first. Returns `Ok(0)` when nothing arrived
    /// within `timeout`.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Human readable device description
    fn describe(&self) -> String;
}
