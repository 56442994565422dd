//! Player lights, HOME light and rumble patterns used as user cues

use bitflags::bitflags;

bitflags! {
    /// Player light pattern (argument of subcommand 0x30)
    ///
    /// Low nibble keeps a light on, high nibble makes it flash.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlayerLights: u8 {
        const ON_1 = 1 << 0;
        const ON_2 = 1 << 1;
        const ON_3 = 1 << 2;
        const ON_4 = 1 << 3;
        const FLASH_1 = 1 << 4;
        const FLASH_2 = 1 << 5;
        const FLASH_3 = 1 << 6;
        const FLASH_4 = 1 << 7;
    }
}

impl PlayerLights {
    /// Player 1 solid, player 4 flashing
    pub const BUSY: Self = Self::ON_1.union(Self::FLASH_4);

    /// Player 1 solid
    pub const READY: Self = Self::ON_1;
}

/// HOME light: slow breathing while the controller is being set up
pub const HOME_LIGHT_BREATHING: [u8; 6] = [0x28, 0x20, 0x00, 0xF2, 0xF0, 0xF0];

/// HOME light: heartbeat once the controller is ready
pub const HOME_LIGHT_HEARTBEAT: [u8; 23] = [
    0xF1, 0x00, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0, 0x00, 0xFF, 0xFF, 0x00, 0xFF, 0xFF, 0x00,
    0xFF, 0xFF, 0x00, 0xFF, 0xFF, 0x00, 0xFF, 0xFF,
];

/// Encoded rumble data for both actuators
pub type RumbleFrame = [u8; 8];

/// No vibration
pub const RUMBLE_NEUTRAL: RumbleFrame = [0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40];

/// One timed rumble frame of the ready cue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RumbleStep {
    /// Pause before sending (milliseconds)
    pub delay_ms: u64,

    /// Vibration data
    pub frame: RumbleFrame,
}

/// Short double buzz played when the controller is ready
pub const READY_RUMBLE: [RumbleStep; 3] = [
    RumbleStep {
        delay_ms: 16,
        frame: [0xC2, 0xC8, 0x03, 0x72, 0xC2, 0xC8, 0x03, 0x72],
    },
    RumbleStep {
        delay_ms: 81,
        frame: RUMBLE_NEUTRAL,
    },
    RumbleStep {
        delay_ms: 5,
        frame: [0xC3, 0xC8, 0x60, 0x64, 0xC3, 0xC8, 0x60, 0x64],
    },
];

/// Pause before vibration is switched off again (milliseconds)
pub const READY_RUMBLE_TAIL_MS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_light_bits() {
        assert_eq!(PlayerLights::BUSY.bits(), 0x81);
        assert_eq!(PlayerLights::READY.bits(), 0x01);
    }
}
