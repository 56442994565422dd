//! Session state for one controller connection
//!
//! A session tracks:
//! - The 4-bit rolling counter stamped on every outbound packet
//! - The lifecycle state of the link
//!
//! The session is owned by whoever drives the device (the handshake, then the
//! streaming worker). It is passed by `&mut`, never shared.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::step::HandshakeStep;

/// 4-bit packet counter
///
/// The device uses it to spot reordered or stale commands. Every packet built
/// during a connection takes the next value, whatever its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollingCounter {
    value: u8,
}

impl RollingCounter {
    /// Counter values wrap at 16
    pub const MODULUS: u8 = 16;

    /// Create a counter starting at 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter starting at `value` (mod 16)
    pub fn starting_at(value: u8) -> Self {
        Self {
            value: value % Self::MODULUS,
        }
    }

    /// Value the next packet will carry
    pub fn peek(&self) -> u8 {
        self.value
    }

    /// Take the current value and advance
    pub fn next(&mut self) -> u8 {
        let current = self.value;
        self.value = (self.value + 1) % Self::MODULUS;
        current
    }
}

/// Link lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Channel not open
    Disconnected,

    /// Handshake running the given step
    HandshakeInProgress(HandshakeStep),

    /// Handshake complete, streaming can start
    Ready,

    /// Fragment reassembly running
    Streaming,

    /// Stop requested, stop command pending
    Stopping,

    /// Channel released
    Closed,
}

impl LinkState {
    /// Check whether `to` is a legal successor of `self`
    pub fn can_transition(self, to: LinkState) -> bool {
        use LinkState::*;

        match (self, to) {
            (Disconnected, HandshakeInProgress(step)) => step == HandshakeStep::ALL[0],
            (HandshakeInProgress(from), HandshakeInProgress(step)) => from.next() == Some(step),
            (HandshakeInProgress(step), Ready) => step.next().is_none(),
            (Ready, Streaming) => true,
            (Ready, Stopping) => true,
            (Streaming, Stopping) => true,
            // Forced close on error is always allowed
            (Closed, Closed) => false,
            (_, Closed) => true,
            (Closed, Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::HandshakeInProgress(step) => write!(f, "in handshake {}", step),
            Self::Ready => write!(f, "ready"),
            Self::Streaming => write!(f, "streaming"),
            Self::Stopping => write!(f, "stopping"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Session manager
#[derive(Debug, Clone)]
pub struct Session {
    counter: RollingCounter,
    state: LinkState,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            counter: RollingCounter::new(),
            state: LinkState::Disconnected,
        }
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Counter shared by every outbound packet
    pub fn counter(&mut self) -> &mut RollingCounter {
        &mut self.counter
    }

    /// Check if the channel is held
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, LinkState::Disconnected | LinkState::Closed)
    }

    /// Check if streaming can start
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Move to a new state
    pub fn transition(&mut self, to: LinkState) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }

        debug!(from = %self.state, to = %to, "Link state change");
        self.state = to;
        Ok(())
    }

    /// Fail unless the session is in `expected`
    pub fn ensure(&self, expected: LinkState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Force the session closed
    pub fn close(&mut self) {
        self.state = LinkState::Closed;
    }

    /// Start over for a fresh connection
    pub fn reset(&mut self) {
        self.counter = RollingCounter::new();
        self.state = LinkState::Disconnected;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
