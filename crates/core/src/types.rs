//! Core types

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A small integer resource value handed out by the interference allocator
/// (a channel number or a Golay index).
pub type Color = u8;

/// RF channel number
pub type Channel = u8;

/// Channels a radio can be tuned to.
pub const CHANNEL_RANGE: RangeInclusive<Channel> = 1..=4;

/// Channel used when no enabled channel survives validation.
pub const DEFAULT_CHANNEL: Channel = 2;

/// Golay indices handed out by the planner.
pub const GOLAY_COLORS: [Color; 2] = [1, 2];

/// Control superframe value for links that must not carry one.
pub const CONTROL_SUPERFRAME_UNSET: u8 = 255;

/// Largest control superframe value a radio accepts.
pub const CONTROL_SUPERFRAME_MAX: u8 = 15;

/// TDMA polarity of a radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarity {
    /// Transmits in odd slots
    Odd,
    /// Transmits in even slots
    Even,
    /// Odd radio on a mixed-polarity site
    HybridOdd,
    /// Even radio on a mixed-polarity site
    HybridEven,
}

impl Polarity {
    /// Numeric code used by radio firmware configuration.
    pub fn code(self) -> u8 {
        match self {
            Polarity::Odd => 1,
            Polarity::Even => 2,
            Polarity::HybridOdd => 3,
            Polarity::HybridEven => 4,
        }
    }

    /// Parse a firmware polarity code.
    pub fn from_code(code: u8) -> CoreResult<Self> {
        match code {
            1 => Ok(Polarity::Odd),
            2 => Ok(Polarity::Even),
            3 => Ok(Polarity::HybridOdd),
            4 => Ok(Polarity::HybridEven),
            other => Err(CoreError::UnknownPolarity(other)),
        }
    }

    /// ODD or HYBRID_ODD
    pub fn is_odd(self) -> bool {
        matches!(self, Polarity::Odd | Polarity::HybridOdd)
    }

    /// EVEN or HYBRID_EVEN
    pub fn is_even(self) -> bool {
        matches!(self, Polarity::Even | Polarity::HybridEven)
    }

    /// Either hybrid variant
    pub fn is_hybrid(self) -> bool {
        matches!(self, Polarity::HybridOdd | Polarity::HybridEven)
    }

    /// Plain polarity a link peer must take opposite this one.
    pub fn complement(self) -> Polarity {
        if self.is_odd() {
            Polarity::Even
        } else {
            Polarity::Odd
        }
    }

    /// Whether two polarities fall on the same side of the odd/even split.
    pub fn same_parity(self, other: Polarity) -> bool {
        self.is_odd() == other.is_odd()
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Polarity::Odd => "ODD",
            Polarity::Even => "EVEN",
            Polarity::HybridOdd => "HYBRID_ODD",
            Polarity::HybridEven => "HYBRID_EVEN",
        };
        f.write_str(name)
    }
}

/// Golay code pair of one link end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GolayIdx {
    /// Transmit code index
    pub tx: Color,
    /// Receive code index
    pub rx: Color,
}

impl GolayIdx {
    /// Pair with the same index on both directions.
    pub fn symmetric(idx: Color) -> Self {
        Self { tx: idx, rx: idx }
    }

    /// The all-zero pair radios report when nothing is configured.
    pub fn is_unset(&self) -> bool {
        *self == GolayIdx::default()
    }
}

impl fmt::Display for GolayIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tx, self.rx)
    }
}

/// Role of a node in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Distribution node, relays traffic
    Dn,
    /// Client node, a leaf
    Cn,
}

/// Physical medium of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    /// Millimetre-wave radio link
    Wireless,
    /// Wired backhaul
    Ethernet,
}

/// Geographic location of a site.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
    /// Metres above sea level
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy in metres
    #[serde(default)]
    pub accuracy: f64,
}

impl Location {
    /// Location at sea level with unknown accuracy.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            accuracy: 0.0,
        }
    }
}
