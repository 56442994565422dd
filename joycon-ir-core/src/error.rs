//! Error types for joycon-ir-core

use crate::session::LinkState;

/// Result type alias for joycon-ir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown report id
    #[error("Unknown report id: 0x{0:02X}")]
    UnknownReport(u8),

    /// Unknown subcommand code
    #[error("Unknown subcommand: 0x{0:02X}")]
    UnknownSubcommand(u8),

    /// Requested vertical resolution has no profile
    #[error("Unsupported resolution: {0} (expected 240, 120, 60 or 30)")]
    UnsupportedResolution(u16),

    /// Register write batch exceeds the device limit
    #[error("Register batch too large: {count} registers (max: {max})")]
    RegisterBatchTooLarge {
        count: usize,
        max: usize,
    },

    /// Subcommand arguments do not fit in a command packet
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Lifecycle transition is not allowed
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: LinkState,
        to: LinkState,
    },

    /// Operation is not valid in the current lifecycle state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LinkState,
    },
}

impl Error {
    /// Check if error is a caller bug rather than a device condition
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedResolution(_)
                | Self::RegisterBatchTooLarge { .. }
                | Self::PayloadTooLarge { .. }
                | Self::InvalidTransition { .. }
                | Self::InvalidState { .. }
        )
    }
}
