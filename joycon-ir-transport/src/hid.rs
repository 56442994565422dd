//! HID transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hidapi::{HidApi, HidDevice, HidError};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use joycon_ir_core::constants::{PRODUCT_ID, VENDOR_ID};

use crate::{error::*, Transport};

/// HID transport for a right Joy-Con
///
/// hidapi calls block, so every call runs on tokio's blocking pool.
pub struct HidTransport {
    vendor_id: u16,
    product_id: u16,
    device: Option<Arc<Mutex<HidDevice>>>,
    description: Option<String>,
}

impl HidTransport {
    /// Create new HID transport for the given ids
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            device: None,
            description: None,
        }
    }

    /// Transport for the first right Joy-Con found
    pub fn right_joycon() -> Self {
        Self::new(VENDOR_ID, PRODUCT_ID)
    }

    fn device(&self) -> Result<Arc<Mutex<HidDevice>>> {
        self.device.clone().ok_or(Error::NotConnected)
    }

    /// A failed read or write means the controller is gone; drop the handle
    fn connection_lost(&mut self, err: HidError) -> Error {
        warn!("Lost {}: {}", self.describe(), err);
        self.device = None;
        Error::ConnectionClosed
    }
}

impl Default for HidTransport {
    fn default() -> Self {
        Self::right_joycon()
    }
}

fn open_first(vendor_id: u16, product_id: u16) -> Result<(HidDevice, String)> {
    let api = HidApi::new()?;

    let info = api
        .device_list()
        .find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
        .ok_or(Error::DeviceNotFound {
            vendor_id,
            product_id,
        })?;

    let description = format!(
        "{} [{:04X}:{:04X}] serial {}",
        info.product_string().unwrap_or("HID device"),
        vendor_id,
        product_id,
        info.serial_number().unwrap_or("-"),
    );

    let device = info.open_device(&api)?;
    Ok((device, description))
}

#[async_trait]
impl Transport for HidTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyConnected);
        }

        let (vendor_id, product_id) = (self.vendor_id, self.product_id);
        debug!("Opening HID device {:04X}:{:04X}...", vendor_id, product_id);

        let (device, description) =
            tokio::task::spawn_blocking(move || open_first(vendor_id, product_id)).await??;

        debug!("Opened {}", description);

        self.device = Some(Arc::new(Mutex::new(device)));
        self.description = Some(description);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.device.take().is_some() {
            debug!("Closing {}", self.describe());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    async fn send(&mut self, report_id: u8, data: &[u8]) -> Result<usize> {
        let device = self.device()?;

        let mut report = Vec::with_capacity(data.len() + 1);
        report.push(report_id);
        report.extend_from_slice(data);

        trace!("Sending report 0x{:02X}: {}", report_id, hex::encode(data));

        match tokio::task::spawn_blocking(move || device.lock().write(&report)).await? {
            Ok(written) => Ok(written),
            Err(err) => Err(self.connection_lost(err)),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        buf.fill(0);
        let device = self.device()?;

        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut incoming = vec![0u8; buf.len()];

        let read = tokio::task::spawn_blocking(move || {
            let n = device.lock().read_timeout(&mut incoming, millis)?;
            Ok::<_, HidError>((n, incoming))
        })
        .await?;

        let (n, incoming) = match read {
            Ok(read) => read,
            Err(err) => return Err(self.connection_lost(err)),
        };

        if n > 0 {
            buf[..n].copy_from_slice(&incoming[..n]);
            trace!("Received {} bytes: {}", n, hex::encode(&buf[..n.min(64)]));
        }

        Ok(n)
    }

    fn describe(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("HID {:04X}:{:04X}", self.vendor_id, self.product_id))
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("HID transport dropped while still open");
        }
    }
}
