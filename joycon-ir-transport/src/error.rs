//! Transport errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No device found with vendor id 0x{vendor_id:04X} and product id 0x{product_id:04X}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection closed by device")]
    ConnectionClosed,

    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Blocking I/O task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Check if the device has gone away
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::NotConnected | Error::ConnectionClosed | Error::DeviceNotFound { .. }
        )
    }
}
