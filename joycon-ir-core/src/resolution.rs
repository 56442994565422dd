//! IR camera resolution profiles
//!
//! The sensor supports four output sizes obtained by binning and skipping.
//! Each size fixes how many 300-byte fragments make up a frame.

use std::fmt;

use crate::constants::FRAGMENT_LEN;
use crate::error::{Error, Result};

/// Frame geometry and sensor setting for one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionProfile {
    /// Frame width in pixels
    pub width: u16,

    /// Frame height in pixels
    pub height: u16,

    /// Index of the last fragment (0-based, inclusive)
    pub max_fragment_index: u8,

    /// Value for the binning/skipping register
    pub binning: u8,
}

impl ResolutionProfile {
    /// Number of fragments per frame
    pub fn fragment_count(&self) -> usize {
        self.max_fragment_index as usize + 1
    }

    /// Frame size in bytes (8 bpp)
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte offset of a fragment in the frame buffer
    pub fn fragment_offset(&self, index: u8) -> usize {
        FRAGMENT_LEN * index as usize
    }

    /// Fragment expected after `index`
    pub fn next_fragment(&self, index: u8) -> u8 {
        ((index as usize + 1) % self.fragment_count()) as u8
    }

    /// Fragment preceding `index`, wrapping to the previous frame
    pub fn previous_fragment(&self, index: u8) -> u8 {
        ((index as usize + self.max_fragment_index as usize) % self.fragment_count()) as u8
    }

    /// The smallest profile cannot ask for missed fragments
    pub fn supports_missed_fragment_requests(&self) -> bool {
        self.max_fragment_index != Resolution::P30.profile().max_fragment_index
    }
}

/// Supported vertical resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    /// 320x240, full pixel array
    #[default]
    P240,

    /// 160x120, binning 2x2
    P120,

    /// 80x60, binning 4x2, skipping 1x2
    P60,

    /// 40x30, binning 4x2, skipping 2x4
    P30,
}

impl Resolution {
    /// All supported resolutions, largest first
    pub const ALL: [Resolution; 4] = [Self::P240, Self::P120, Self::P60, Self::P30];

    /// Profile for this resolution
    pub const fn profile(self) -> ResolutionProfile {
        match self {
            Self::P240 => ResolutionProfile {
                width: 320,
                height: 240,
                max_fragment_index: 0xFF,
                binning: 0b0000_0000,
            },
            Self::P120 => ResolutionProfile {
                width: 160,
                height: 120,
                max_fragment_index: 0x3F,
                binning: 0b0101_0000,
            },
            Self::P60 => ResolutionProfile {
                width: 80,
                height: 60,
                max_fragment_index: 0x0F,
                binning: 0b0110_0100,
            },
            Self::P30 => ResolutionProfile {
                width: 40,
                height: 30,
                max_fragment_index: 0x03,
                binning: 0b0110_1001,
            },
        }
    }

    /// Vertical resolution in lines
    pub fn lines(self) -> u16 {
        self.profile().height
    }
}

impl TryFrom<u16> for Resolution {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            240 => Ok(Self::P240),
            120 => Ok(Self::P120),
            60 => Ok(Self::P60),
            30 => Ok(Self::P30),
            _ => Err(Error::UnsupportedResolution(value)),
        }
    }
}

impl From<Resolution> for ResolutionProfile {
    fn from(resolution: Resolution) -> Self {
        resolution.profile()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.profile();
        write!(f, "{}x{}", p.width, p.height)
    }
}
