//! IEC 60870-5-104 Type Identification.
//!
//! Only the types a controlled station needs are represented: the
//! monitoring types it reports and the control types it accepts. Anything
//! else fails to decode with [`Iec104Error::UnknownTypeId`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Iec104Error, Result};
use crate::types::MAX_ASDU_LENGTH;

/// Size of the fixed ASDU header (type, VSQ, COT, originator, CA).
pub const ASDU_HEADER_LENGTH: usize = 6;

/// Size of an information object address on the wire.
pub const IOA_LENGTH: usize = 3;

/// IEC 60870-5-104 Type Identification.
///
/// In point catalogs a type is written by its standard name, e.g.
/// `M_ME_NC_1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum TypeId {
    // ============================================
    // Process information in monitoring direction
    // ============================================
    /// Single-point information (M_SP_NA_1)
    SinglePoint = 1,

    /// Double-point information (M_DP_NA_1)
    DoublePoint = 3,

    /// Measured value, normalized (M_ME_NA_1)
    MeasuredNormalized = 9,

    /// Measured value, scaled (M_ME_NB_1)
    MeasuredScaled = 11,

    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat = 13,

    /// Single-point information with time tag CP56Time2a (M_SP_TB_1)
    SinglePointTime56 = 30,

    /// Double-point information with time tag CP56Time2a (M_DP_TB_1)
    DoublePointTime56 = 31,

    /// Measured value, normalized with time tag CP56Time2a (M_ME_TD_1)
    MeasuredNormalizedTime56 = 34,

    /// Measured value, scaled with time tag CP56Time2a (M_ME_TE_1)
    MeasuredScaledTime56 = 35,

    /// Measured value, short floating point with time tag CP56Time2a (M_ME_TF_1)
    MeasuredFloatTime56 = 36,

    // ============================================
    // Process information in control direction
    // ============================================
    /// Single command (C_SC_NA_1)
    SingleCommand = 45,

    /// Double command (C_DC_NA_1)
    DoubleCommand = 46,

    /// Single command with time tag CP56Time2a (C_SC_TA_1)
    SingleCommandTime56 = 58,

    /// Double command with time tag CP56Time2a (C_DC_TA_1)
    DoubleCommandTime56 = 59,

    // ============================================
    // System information in control direction
    // ============================================
    /// Interrogation command (C_IC_NA_1)
    InterrogationCommand = 100,

    /// Read command (C_RD_NA_1)
    ReadCommand = 102,

    /// Clock synchronization command (C_CS_NA_1)
    ClockSync = 103,
}

impl TypeId {
    /// Every supported type, in numeric order.
    pub const ALL: [TypeId; 17] = [
        Self::SinglePoint,
        Self::DoublePoint,
        Self::MeasuredNormalized,
        Self::MeasuredScaled,
        Self::MeasuredFloat,
        Self::SinglePointTime56,
        Self::DoublePointTime56,
        Self::MeasuredNormalizedTime56,
        Self::MeasuredScaledTime56,
        Self::MeasuredFloatTime56,
        Self::SingleCommand,
        Self::DoubleCommand,
        Self::SingleCommandTime56,
        Self::DoubleCommandTime56,
        Self::InterrogationCommand,
        Self::ReadCommand,
        Self::ClockSync,
    ];

    /// Create TypeId from raw byte value.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::SinglePoint),
            3 => Ok(Self::DoublePoint),
            9 => Ok(Self::MeasuredNormalized),
            11 => Ok(Self::MeasuredScaled),
            13 => Ok(Self::MeasuredFloat),
            30 => Ok(Self::SinglePointTime56),
            31 => Ok(Self::DoublePointTime56),
            34 => Ok(Self::MeasuredNormalizedTime56),
            35 => Ok(Self::MeasuredScaledTime56),
            36 => Ok(Self::MeasuredFloatTime56),
            45 => Ok(Self::SingleCommand),
            46 => Ok(Self::DoubleCommand),
            58 => Ok(Self::SingleCommandTime56),
            59 => Ok(Self::DoubleCommandTime56),
            100 => Ok(Self::InterrogationCommand),
            102 => Ok(Self::ReadCommand),
            103 => Ok(Self::ClockSync),
            _ => Err(Iec104Error::UnknownTypeId(value)),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this type is in the monitoring direction (from RTU to master).
    #[inline]
    pub const fn is_monitoring(&self) -> bool {
        matches!(self.as_u8(), 1..=44)
    }

    /// Check if this type is in the control direction (from master to RTU).
    #[inline]
    pub const fn is_control(&self) -> bool {
        !self.is_monitoring()
    }

    /// Check if this type carries a CP56Time2a time tag.
    #[inline]
    pub const fn has_time_tag(&self) -> bool {
        matches!(
            self,
            Self::SinglePointTime56
                | Self::DoublePointTime56
                | Self::MeasuredNormalizedTime56
                | Self::MeasuredScaledTime56
                | Self::MeasuredFloatTime56
                | Self::SingleCommandTime56
                | Self::DoubleCommandTime56
        )
    }

    /// Size of one information element in bytes, excluding the IOA.
    pub const fn element_size(&self) -> usize {
        match self {
            Self::SinglePoint | Self::DoublePoint => 1,
            Self::MeasuredNormalized | Self::MeasuredScaled => 3,
            Self::MeasuredFloat => 5,
            Self::SinglePointTime56 | Self::DoublePointTime56 => 8,
            Self::MeasuredNormalizedTime56 | Self::MeasuredScaledTime56 => 10,
            Self::MeasuredFloatTime56 => 12,
            Self::SingleCommand | Self::DoubleCommand => 1,
            Self::SingleCommandTime56 | Self::DoubleCommandTime56 => 8,
            Self::InterrogationCommand => 1,
            Self::ReadCommand => 0,
            Self::ClockSync => 7,
        }
    }

    /// Largest number of objects (with individual IOAs) fitting one ASDU.
    pub const fn max_objects_per_asdu(&self) -> usize {
        let per_object = IOA_LENGTH + self.element_size();
        let fit = (MAX_ASDU_LENGTH - ASDU_HEADER_LENGTH) / per_object;
        if fit > 127 {
            127
        } else {
            fit
        }
    }

    /// Get the IEC standard name (e.g., "M_SP_NA_1").
    #[inline]
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::DoublePointTime56 => "M_DP_TB_1",
            Self::MeasuredNormalizedTime56 => "M_ME_TD_1",
            Self::MeasuredScaledTime56 => "M_ME_TE_1",
            Self::MeasuredFloatTime56 => "M_ME_TF_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::DoubleCommand => "C_DC_NA_1",
            Self::SingleCommandTime56 => "C_SC_TA_1",
            Self::DoubleCommandTime56 => "C_DC_TA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
            Self::ReadCommand => "C_RD_NA_1",
            Self::ClockSync => "C_CS_NA_1",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}

impl FromStr for TypeId {
    type Err = Iec104Error;

    /// Accepts the standard name (any case) or the numeric identifier.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(value) = s.parse::<u8>() {
            return Self::from_u8(value);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.standard_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Iec104Error::config(format!("unknown type identification '{s}'")))
    }
}

impl TryFrom<String> for TypeId {
    type Error = Iec104Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeId> for String {
    fn from(value: TypeId) -> Self {
        value.standard_name().to_string()
    }
}
