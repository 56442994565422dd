//! Handshake steps

use std::fmt;

/// The ten ordered steps that bring the controller from attached to
/// streaming-ready
///
/// Each step has a stable numeric code, reported on failure so a regression
/// can be pinned to one protocol stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HandshakeStep {
    /// Switch input reports to the quiet mode
    SilenceInputReports = 1,

    /// Busy player lights and breathing HOME light
    BusyLights = 2,

    /// Serial number, device info, battery, temperature, colours
    ReadControllerInfo = 3,

    /// Rumble cue and heartbeat HOME light
    ReadyCue = 4,

    /// Switch input reports to the MCU streaming report
    StreamingReportMode = 5,

    /// Power up the MCU
    EnableMcu = 6,

    /// Wait for the MCU to report standby
    AwaitMcuStandby = 7,

    /// Put the MCU in IR mode
    SetMcuIrMode = 8,

    /// Confirm the MCU reports IR mode
    ConfirmMcuIrMode = 9,

    /// Transfer mode and sensor registers
    ConfigureIrSensor = 10,
}

impl HandshakeStep {
    /// All steps in execution order
    pub const ALL: [HandshakeStep; 10] = [
        Self::SilenceInputReports,
        Self::BusyLights,
        Self::ReadControllerInfo,
        Self::ReadyCue,
        Self::StreamingReportMode,
        Self::EnableMcu,
        Self::AwaitMcuStandby,
        Self::SetMcuIrMode,
        Self::ConfirmMcuIrMode,
        Self::ConfigureIrSensor,
    ];

    /// Step-specific failure code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Step that follows this one
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.code() as usize).copied()
    }

    /// Short description
    pub fn name(self) -> &'static str {
        match self {
            Self::SilenceInputReports => "silence input reports",
            Self::BusyLights => "busy lights",
            Self::ReadControllerInfo => "read controller info",
            Self::ReadyCue => "ready cue",
            Self::StreamingReportMode => "streaming report mode",
            Self::EnableMcu => "enable MCU",
            Self::AwaitMcuStandby => "await MCU standby",
            Self::SetMcuIrMode => "set MCU IR mode",
            Self::ConfirmMcuIrMode => "confirm MCU IR mode",
            Self::ConfigureIrSensor => "configure IR sensor",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.code(), self.name())
    }
}
