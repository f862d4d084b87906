//! IEC 60870-5-104 Cause of Transmission (COT).
//!
//! The cause of transmission defines the reason for sending an ASDU. The
//! simulator answers with 3, 5, 7, 10, 11, 20-36, 45 and 46; the rest of the
//! table exists so that any cause a master sends still decodes.

/// Cause of Transmission (COT).
///
/// Defines the reason for transmission of an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cot {
    /// Periodic, cyclic (1)
    Periodic,

    /// Background scan (2)
    Background,

    /// Spontaneous (3)
    Spontaneous,

    /// Initialized (4)
    Initialized,

    /// Request or requested (5)
    Request,

    /// Activation (6)
    Activation,

    /// Activation confirmation (7)
    ActivationConfirm,

    /// Deactivation (8)
    Deactivation,

    /// Deactivation confirmation (9)
    DeactivationConfirm,

    /// Activation termination (10)
    ActivationTermination,

    /// Return information caused by a remote command (11)
    ReturnRemoteCommand,

    /// Return information caused by a local command (12)
    ReturnLocalCommand,

    /// File transfer (13)
    FileTransfer,

    /// Interrogated by station interrogation (20)
    InterrogatedByStation,

    /// Interrogated by group 1 interrogation (21)
    InterrogatedByGroup1,

    /// Interrogated by group 2 interrogation (22)
    InterrogatedByGroup2,

    /// Interrogated by group 3 interrogation (23)
    InterrogatedByGroup3,

    /// Interrogated by group 4 interrogation (24)
    InterrogatedByGroup4,

    /// Interrogated by group 5 interrogation (25)
    InterrogatedByGroup5,

    /// Interrogated by group 6 interrogation (26)
    InterrogatedByGroup6,

    /// Interrogated by group 7 interrogation (27)
    InterrogatedByGroup7,

    /// Interrogated by group 8 interrogation (28)
    InterrogatedByGroup8,

    /// Interrogated by group 9 interrogation (29)
    InterrogatedByGroup9,

    /// Interrogated by group 10 interrogation (30)
    InterrogatedByGroup10,

    /// Interrogated by group 11 interrogation (31)
    InterrogatedByGroup11,

    /// Interrogated by group 12 interrogation (32)
    InterrogatedByGroup12,

    /// Interrogated by group 13 interrogation (33)
    InterrogatedByGroup13,

    /// Interrogated by group 14 interrogation (34)
    InterrogatedByGroup14,

    /// Interrogated by group 15 interrogation (35)
    InterrogatedByGroup15,

    /// Interrogated by group 16 interrogation (36)
    InterrogatedByGroup16,

    /// Requested by general counter request (37)
    RequestedByGeneralCounter,

    /// Requested by group 1 counter request (38)
    RequestedByGroup1Counter,

    /// Requested by group 2 counter request (39)
    RequestedByGroup2Counter,

    /// Requested by group 3 counter request (40)
    RequestedByGroup3Counter,

    /// Requested by group 4 counter request (41)
    RequestedByGroup4Counter,

    /// Unknown type identification (44)
    UnknownTypeId,

    /// Unknown cause of transmission (45)
    UnknownCot,

    /// Unknown common address of ASDU (46)
    UnknownCommonAddress,

    /// Unknown information object address (47)
    UnknownIoa,

    /// Code without an assigned meaning (0, 14-19, 42-43, 48-63)
    Unassigned(u8),
}

impl Cot {
    /// Create COT from raw byte value (lower 6 bits).
    ///
    /// Every 6-bit code decodes; codes the standard leaves open become
    /// [`Cot::Unassigned`].
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        let cot_value = value & 0x3F;

        match cot_value {
            1 => Self::Periodic,
            2 => Self::Background,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationConfirm,
            8 => Self::Deactivation,
            9 => Self::DeactivationConfirm,
            10 => Self::ActivationTermination,
            11 => Self::ReturnRemoteCommand,
            12 => Self::ReturnLocalCommand,
            13 => Self::FileTransfer,
            20 => Self::InterrogatedByStation,
            21 => Self::InterrogatedByGroup1,
            22 => Self::InterrogatedByGroup2,
            23 => Self::InterrogatedByGroup3,
            24 => Self::InterrogatedByGroup4,
            25 => Self::InterrogatedByGroup5,
            26 => Self::InterrogatedByGroup6,
            27 => Self::InterrogatedByGroup7,
            28 => Self::InterrogatedByGroup8,
            29 => Self::InterrogatedByGroup9,
            30 => Self::InterrogatedByGroup10,
            31 => Self::InterrogatedByGroup11,
            32 => Self::InterrogatedByGroup12,
            33 => Self::InterrogatedByGroup13,
            34 => Self::InterrogatedByGroup14,
            35 => Self::InterrogatedByGroup15,
            36 => Self::InterrogatedByGroup16,
            37 => Self::RequestedByGeneralCounter,
            38 => Self::RequestedByGroup1Counter,
            39 => Self::RequestedByGroup2Counter,
            40 => Self::RequestedByGroup3Counter,
            41 => Self::RequestedByGroup4Counter,
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCot,
            46 => Self::UnknownCommonAddress,
            47 => Self::UnknownIoa,
            other => Self::Unassigned(other),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Periodic => 1,
            Self::Background => 2,
            Self::Spontaneous => 3,
            Self::Initialized => 4,
            Self::Request => 5,
            Self::Activation => 6,
            Self::ActivationConfirm => 7,
            Self::Deactivation => 8,
            Self::DeactivationConfirm => 9,
            Self::ActivationTermination => 10,
            Self::ReturnRemoteCommand => 11,
            Self::ReturnLocalCommand => 12,
            Self::FileTransfer => 13,
            Self::InterrogatedByStation => 20,
            Self::InterrogatedByGroup1 => 21,
            Self::InterrogatedByGroup2 => 22,
            Self::InterrogatedByGroup3 => 23,
            Self::InterrogatedByGroup4 => 24,
            Self::InterrogatedByGroup5 => 25,
            Self::InterrogatedByGroup6 => 26,
            Self::InterrogatedByGroup7 => 27,
            Self::InterrogatedByGroup8 => 28,
            Self::InterrogatedByGroup9 => 29,
            Self::InterrogatedByGroup10 => 30,
            Self::InterrogatedByGroup11 => 31,
            Self::InterrogatedByGroup12 => 32,
            Self::InterrogatedByGroup13 => 33,
            Self::InterrogatedByGroup14 => 34,
            Self::InterrogatedByGroup15 => 35,
            Self::InterrogatedByGroup16 => 36,
            Self::RequestedByGeneralCounter => 37,
            Self::RequestedByGroup1Counter => 38,
            Self::RequestedByGroup2Counter => 39,
            Self::RequestedByGroup3Counter => 40,
            Self::RequestedByGroup4Counter => 41,
            Self::UnknownTypeId => 44,
            Self::UnknownCot => 45,
            Self::UnknownCommonAddress => 46,
            Self::UnknownIoa => 47,
            Self::Unassigned(value) => value & 0x3F,
        }
    }

    /// Short mnemonic used in logs.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Periodic => "per/cyc",
            Self::Background => "back",
            Self::Spontaneous => "spont",
            Self::Initialized => "init",
            Self::Request => "req",
            Self::Activation => "act",
            Self::ActivationConfirm => "actcon",
            Self::Deactivation => "deact",
            Self::DeactivationConfirm => "deactcon",
            Self::ActivationTermination => "actterm",
            Self::ReturnRemoteCommand => "retrem",
            Self::ReturnLocalCommand => "retloc",
            Self::FileTransfer => "file",
            Self::InterrogatedByStation => "inrogen",
            Self::InterrogatedByGroup1
            | Self::InterrogatedByGroup2
            | Self::InterrogatedByGroup3
            | Self::InterrogatedByGroup4
            | Self::InterrogatedByGroup5
            | Self::InterrogatedByGroup6
            | Self::InterrogatedByGroup7
            | Self::InterrogatedByGroup8
            | Self::InterrogatedByGroup9
            | Self::InterrogatedByGroup10
            | Self::InterrogatedByGroup11
            | Self::InterrogatedByGroup12
            | Self::InterrogatedByGroup13
            | Self::InterrogatedByGroup14
            | Self::InterrogatedByGroup15
            | Self::InterrogatedByGroup16 => "inro",
            Self::RequestedByGeneralCounter => "reqcogen",
            Self::RequestedByGroup1Counter
            | Self::RequestedByGroup2Counter
            | Self::RequestedByGroup3Counter
            | Self::RequestedByGroup4Counter => "reqco",
            Self::UnknownTypeId => "unknown type",
            Self::UnknownCot => "unknown cause",
            Self::UnknownCommonAddress => "unknown CA",
            Self::UnknownIoa => "unknown IOA",
            Self::Unassigned(_) => "unassigned",
        }
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.mnemonic(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cot_all_values_roundtrip() {
        let valid_values = [
            1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13,
            20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36,
            37, 38, 39, 40, 41,
            44, 45, 46, 47,
        ];

        for val in valid_values {
            let cot = Cot::from_u8(val);
            assert!(!matches!(cot, Cot::Unassigned(_)));
            assert_eq!(cot.as_u8(), val, "Roundtrip failed for value {}", val);
        }
    }

    #[test]
    fn test_cot_unassigned_values() {
        for val in [0, 14, 19, 42, 43, 48, 63] {
            let cot = Cot::from_u8(val);
            assert_eq!(cot, Cot::Unassigned(val));
            assert_eq!(cot.as_u8(), val);
        }
        assert_eq!(Cot::from_u8(0x40), Cot::Unassigned(0));
        assert_eq!(Cot::Unassigned(0).to_string(), "unassigned(0)");
    }

    #[test]
    fn test_cot_upper_bits_masked() {
        // Test (bit 7) and P/N (bit 6) are not part of the cause
        assert_eq!(Cot::from_u8(0x43), Cot::Spontaneous);
        assert_eq!(Cot::from_u8(0x86), Cot::Activation);
        assert_eq!(Cot::from_u8(0xC7), Cot::ActivationConfirm);
    }

    #[test]
    fn test_cot_display() {
        assert_eq!(Cot::Spontaneous.to_string(), "spont(3)");
        assert_eq!(Cot::InterrogatedByStation.to_string(), "inrogen(20)");
        assert_eq!(Cot::UnknownIoa.to_string(), "unknown IOA(47)");
    }
}
