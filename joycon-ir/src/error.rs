//! High-level error types

use joycon_ir_core::{HandshakeStep, LinkState};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[source] joycon_ir_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] joycon_ir_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] joycon_ir_types::Error),

    /// A handshake step ran out of attempts without a matching reply
    #[error("Handshake step {step} timed out ({operation}) after {attempts} attempts")]
    ProtocolTimeout {
        step: HandshakeStep,
        operation: &'static str,
        attempts: u32,
    },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LinkState,
    },

    #[error("Streaming worker failed: {0}")]
    WorkerFailed(String),
}

impl From<joycon_ir_core::Error> for Error {
    fn from(err: joycon_ir_core::Error) -> Self {
        match err {
            joycon_ir_core::Error::InvalidState { operation, state } => {
                Error::InvalidState { operation, state }
            }
            other => Error::Core(other),
        }
    }
}

impl Error {
    /// Code of the handshake step that failed, if any
    pub fn step_code(&self) -> Option<u8> {
        match self {
            Error::ProtocolTimeout { step, .. } => Some(step.code()),
            _ => None,
        }
    }

    /// Check if retrying the whole operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ProtocolTimeout { .. })
    }

    /// Check if the device must be reopened
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Error::Transport(_) | Error::ProtocolTimeout { .. } | Error::WorkerFailed(_) => true,
            _ => false,
        }
    }
}
