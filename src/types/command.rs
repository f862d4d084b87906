//! Command qualifiers in the control direction.

use super::DoublePointValue;

/// Qualifier of interrogation for a station (global) interrogation.
pub const QOI_STATION: u8 = 20;

const SELECT_BIT: u8 = 0x80;
const QU_MASK: u8 = 0x7C;

/// Single command object (SCO).
///
/// ```text
/// bit 7    S/E  1 = select, 0 = execute
/// bit 6-2  QU   qualifier of command
/// bit 0    SCS  single command state
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleCommand {
    /// Commanded state
    pub state: bool,
    /// Select (true) or execute (false)
    pub select: bool,
    /// Qualifier of command (0-31)
    pub qualifier: u8,
}

impl SingleCommand {
    /// Parse from SCO byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            state: (value & 0x01) != 0,
            select: (value & SELECT_BIT) != 0,
            qualifier: (value & QU_MASK) >> 2,
        }
    }

    /// Encode to SCO byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.state as u8)
            | ((self.qualifier << 2) & QU_MASK)
            | if self.select { SELECT_BIT } else { 0 }
    }
}

/// Double command object (DCO).
///
/// Same layout as SCO with a 2-bit state; only 1 (OFF) and 2 (ON) are
/// valid commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleCommand {
    /// Commanded state
    pub state: DoublePointValue,
    /// Select (true) or execute (false)
    pub select: bool,
    /// Qualifier of command (0-31)
    pub qualifier: u8,
}

impl DoubleCommand {
    /// Parse from DCO byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            state: DoublePointValue::from_u8(value),
            select: (value & SELECT_BIT) != 0,
            qualifier: (value & QU_MASK) >> 2,
        }
    }

    /// Encode to DCO byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        self.state.as_u8()
            | ((self.qualifier << 2) & QU_MASK)
            | if self.select { SELECT_BIT } else { 0 }
    }
}
