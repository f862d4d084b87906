//! Data point types for IEC 60870-5-104.
//!
//! A [`DataPoint`] is one monitored value as it travels in an ASDU. Its
//! type identification follows from the value variant and the presence of
//! a time tag, so an encoded point always matches the ASDU it is put in.

use bytes::{BufMut, BytesMut};

use super::{Cp56Time2a, Ioa, InformationObject, TypeId};

/// Double-point information value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DoublePointValue {
    /// Indeterminate or intermediate (00)
    Indeterminate = 0,
    /// Determined OFF (01)
    Off = 1,
    /// Determined ON (10)
    On = 2,
    /// Indeterminate (11)
    IndeterminateOrFaulty = 3,
}

impl DoublePointValue {
    /// Parse from byte (lower 2 bits).
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Indeterminate,
            1 => Self::Off,
            2 => Self::On,
            _ => Self::IndeterminateOrFaulty,
        }
    }

    /// Convert to raw 2-bit value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the state is OFF or ON.
    #[inline]
    pub const fn is_determined(&self) -> bool {
        matches!(self, Self::Off | Self::On)
    }
}

/// Quality descriptor, kept in its wire layout.
///
/// ```text
/// bit 7  IV  invalid
/// bit 6  NT  not topical
/// bit 5  SB  substituted
/// bit 4  BL  blocked
/// bit 0  OV  overflow (measured values only)
/// ```
///
/// SIQ and DIQ share the upper nibble with QDS; their low bits carry the
/// value, so OV is dropped when encoding binary points.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct Quality(u8);

impl Quality {
    const OV_MASK: u8 = 0x01;
    const BL_MASK: u8 = 0x10;
    const SB_MASK: u8 = 0x20;
    const NT_MASK: u8 = 0x40;
    const IV_MASK: u8 = 0x80;
    const QDS_MASK: u8 = 0xF1;
    const SIQ_MASK: u8 = 0xF0;

    /// Good quality (all flags false).
    #[allow(non_upper_case_globals)]
    pub const Good: Self = Self(0);

    /// Invalid quality.
    #[allow(non_upper_case_globals)]
    pub const Invalid: Self = Self(Self::IV_MASK);

    #[inline(always)]
    const fn with_bit(mut self, mask: u8, value: bool) -> Self {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
        self
    }

    /// Overflow (OV) - value exceeds predefined range
    #[inline(always)]
    pub const fn overflow(&self) -> bool {
        (self.0 & Self::OV_MASK) != 0
    }

    /// Set overflow flag
    #[inline(always)]
    pub const fn set_overflow(self, value: bool) -> Self {
        self.with_bit(Self::OV_MASK, value)
    }

    /// Blocked (BL) - value is blocked for transmission
    #[inline(always)]
    pub const fn blocked(&self) -> bool {
        (self.0 & Self::BL_MASK) != 0
    }

    /// Set blocked flag
    #[inline(always)]
    pub const fn set_blocked(self, value: bool) -> Self {
        self.with_bit(Self::BL_MASK, value)
    }

    /// Substituted (SB) - value is substituted
    #[inline(always)]
    pub const fn substituted(&self) -> bool {
        (self.0 & Self::SB_MASK) != 0
    }

    /// Set substituted flag
    #[inline(always)]
    pub const fn set_substituted(self, value: bool) -> Self {
        self.with_bit(Self::SB_MASK, value)
    }

    /// Not topical (NT) - value is not topical (outdated)
    #[inline(always)]
    pub const fn not_topical(&self) -> bool {
        (self.0 & Self::NT_MASK) != 0
    }

    /// Set not_topical flag
    #[inline(always)]
    pub const fn set_not_topical(self, value: bool) -> Self {
        self.with_bit(Self::NT_MASK, value)
    }

    /// Invalid (IV) - value is invalid
    #[inline(always)]
    pub const fn invalid(&self) -> bool {
        (self.0 & Self::IV_MASK) != 0
    }

    /// Set invalid flag
    #[inline(always)]
    pub const fn set_invalid(self, value: bool) -> Self {
        self.with_bit(Self::IV_MASK, value)
    }

    /// Create from a raw quality byte. Bits 1-3 are reserved and dropped.
    #[inline(always)]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw & Self::QDS_MASK)
    }

    /// Get the raw byte value
    #[inline(always)]
    pub const fn as_raw(&self) -> u8 {
        self.0
    }

    /// Parse from QDS byte (measured values).
    #[inline(always)]
    pub const fn from_qds(byte: u8) -> Self {
        Self(byte & Self::QDS_MASK)
    }

    /// Parse from SIQ or DIQ byte.
    #[inline(always)]
    pub const fn from_siq(byte: u8) -> Self {
        Self(byte & Self::SIQ_MASK)
    }

    /// Quality bits for a QDS byte.
    #[inline(always)]
    pub const fn qds(&self) -> u8 {
        self.0 & Self::QDS_MASK
    }

    /// Quality bits for a SIQ/DIQ byte.
    #[inline(always)]
    pub const fn siq(&self) -> u8 {
        self.0 & Self::SIQ_MASK
    }

    /// Check if quality is good (no flags set).
    #[inline(always)]
    pub const fn is_good(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quality")
            .field("overflow", &self.overflow())
            .field("blocked", &self.blocked())
            .field("substituted", &self.substituted())
            .field("not_topical", &self.not_topical())
            .field("invalid", &self.invalid())
            .finish()
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_good() {
            return f.write_str("Good");
        }

        let flags = [
            (self.invalid(), "IV"),
            (self.not_topical(), "NT"),
            (self.substituted(), "SB"),
            (self.blocked(), "BL"),
            (self.overflow(), "OV"),
        ];
        let mut first = true;
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Data value types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataValue {
    /// Single-point information (M_SP_NA_1, M_SP_TB_1)
    Single(bool),

    /// Double-point information (M_DP_NA_1, M_DP_TB_1)
    Double(DoublePointValue),

    /// Normalized value -1.0 to +1.0 (M_ME_NA_1, M_ME_TD_1)
    Normalized(f32),

    /// Scaled value (M_ME_NB_1, M_ME_TE_1)
    Scaled(i16),

    /// Short floating point (M_ME_NC_1, M_ME_TF_1)
    Float(f32),
}

impl DataValue {
    /// Convert a simulated value to the representation of `type_id`.
    ///
    /// Returns `None` for control-direction types.
    pub fn from_f64(type_id: TypeId, value: f64) -> Option<Self> {
        let converted = match type_id {
            TypeId::SinglePoint | TypeId::SinglePointTime56 => Self::Single(value.round() != 0.0),
            TypeId::DoublePoint | TypeId::DoublePointTime56 => {
                Self::Double(DoublePointValue::from_u8(value.round() as u8))
            }
            TypeId::MeasuredNormalized | TypeId::MeasuredNormalizedTime56 => {
                Self::Normalized(value.clamp(-1.0, 1.0) as f32)
            }
            TypeId::MeasuredScaled | TypeId::MeasuredScaledTime56 => {
                Self::Scaled(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
            }
            TypeId::MeasuredFloat | TypeId::MeasuredFloatTime56 => Self::Float(value as f32),
            TypeId::SingleCommand
            | TypeId::DoubleCommand
            | TypeId::SingleCommandTime56
            | TypeId::DoubleCommandTime56
            | TypeId::InterrogationCommand
            | TypeId::ReadCommand
            | TypeId::ClockSync => return None,
        };
        Some(converted)
    }

    /// Convert to f64.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Single(v) => f64::from(u8::from(*v)),
            Self::Double(v) => f64::from(v.as_u8()),
            Self::Normalized(v) | Self::Float(v) => f64::from(*v),
            Self::Scaled(v) => f64::from(*v),
        }
    }

    /// Convert to bool if boolean type.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Single(v) => Some(*v),
            Self::Double(DoublePointValue::Off) => Some(false),
            Self::Double(DoublePointValue::On) => Some(true),
            _ => None,
        }
    }

    /// Monitoring type carrying this value, with or without a time tag.
    pub const fn type_id(&self, with_time: bool) -> TypeId {
        match (self, with_time) {
            (Self::Single(_), false) => TypeId::SinglePoint,
            (Self::Single(_), true) => TypeId::SinglePointTime56,
            (Self::Double(_), false) => TypeId::DoublePoint,
            (Self::Double(_), true) => TypeId::DoublePointTime56,
            (Self::Normalized(_), false) => TypeId::MeasuredNormalized,
            (Self::Normalized(_), true) => TypeId::MeasuredNormalizedTime56,
            (Self::Scaled(_), false) => TypeId::MeasuredScaled,
            (Self::Scaled(_), true) => TypeId::MeasuredScaledTime56,
            (Self::Float(_), false) => TypeId::MeasuredFloat,
            (Self::Float(_), true) => TypeId::MeasuredFloatTime56,
        }
    }
}

/// Encode a normalized value in [-1, 1] as NVA.
#[inline]
pub fn normalized_to_raw(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Decode an NVA to a value in [-1, 1).
#[inline]
pub fn normalized_from_raw(raw: i16) -> f32 {
    raw as f32 / 32768.0
}

/// Unified data point representing an information object.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Information object address (IOA)
    pub ioa: u32,
    /// Data value
    pub value: DataValue,
    /// Quality flags
    pub quality: Quality,
    /// Timestamp (if present)
    pub timestamp: Option<Cp56Time2a>,
}

impl DataPoint {
    /// Create a new data point.
    #[inline]
    pub const fn new(ioa: u32, value: DataValue) -> Self {
        Self {
            ioa,
            value,
            quality: Quality::Good,
            timestamp: None,
        }
    }

    /// Create a data point with quality.
    #[inline]
    pub const fn with_quality(ioa: u32, value: DataValue, quality: Quality) -> Self {
        Self {
            ioa,
            value,
            quality,
            timestamp: None,
        }
    }

    /// Attach a time tag.
    #[inline]
    pub const fn with_timestamp(mut self, timestamp: Cp56Time2a) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Type identification this point encodes as.
    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.value.type_id(self.timestamp.is_some())
    }

    /// Check if the data point has good quality.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.quality.is_good()
    }

    /// Write the information element (without IOA).
    pub fn encode_element(&self, buf: &mut BytesMut) {
        match self.value {
            DataValue::Single(v) => buf.put_u8(u8::from(v) | self.quality.siq()),
            DataValue::Double(v) => buf.put_u8(v.as_u8() | self.quality.siq()),
            DataValue::Normalized(v) => {
                buf.put_i16_le(normalized_to_raw(v));
                buf.put_u8(self.quality.qds());
            }
            DataValue::Scaled(v) => {
                buf.put_i16_le(v);
                buf.put_u8(self.quality.qds());
            }
            DataValue::Float(v) => {
                buf.put_f32_le(v);
                buf.put_u8(self.quality.qds());
            }
        }
        if let Some(ts) = &self.timestamp {
            buf.put_slice(&ts.to_bytes());
        }
    }

    /// Build the information object for an ASDU of [`Self::type_id`].
    pub fn to_information_object(&self) -> InformationObject {
        let mut buf = BytesMut::with_capacity(self.type_id().element_size());
        self.encode_element(&mut buf);
        InformationObject::new(Ioa::new(self.ioa), buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_flags() {
        let q = Quality::Good.set_invalid(true).set_blocked(true);
        assert!(q.invalid());
        assert!(q.blocked());
        assert!(!q.substituted());
        assert_eq!(q.as_raw(), 0x90);
        assert_eq!(q.to_string(), "IV|BL");

        let q = q.set_invalid(false);
        assert_eq!(q.as_raw(), 0x10);
        assert_eq!(Quality::Good.to_string(), "Good");
    }

    #[test]
    fn test_quality_siq_drops_overflow() {
        let q = Quality::from_qds(0xFF);
        assert_eq!(q.as_raw(), 0xF1);
        assert_eq!(q.qds(), 0xF1);
        assert_eq!(q.siq(), 0xF0);
        assert_eq!(Quality::from_siq(0x81), Quality::Invalid);
        assert_eq!(Quality::from_raw(0x0E), Quality::Good);
    }

    #[test]
    fn test_data_value_from_f64() {
        assert_eq!(
            DataValue::from_f64(TypeId::SinglePoint, 0.6),
            Some(DataValue::Single(true))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::SinglePointTime56, 0.4),
            Some(DataValue::Single(false))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::DoublePoint, 2.2),
            Some(DataValue::Double(DoublePointValue::On))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::MeasuredNormalized, 3.0),
            Some(DataValue::Normalized(1.0))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::MeasuredScaledTime56, 40_000.0),
            Some(DataValue::Scaled(i16::MAX))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::MeasuredScaled, -12.5),
            Some(DataValue::Scaled(-13))
        );
        assert_eq!(
            DataValue::from_f64(TypeId::MeasuredFloat, 49.95),
            Some(DataValue::Float(49.95))
        );
        assert_eq!(DataValue::from_f64(TypeId::SingleCommand, 1.0), None);
    }

    #[test]
    fn test_normalized_scaling() {
        assert_eq!(normalized_to_raw(1.0), 32767);
        assert_eq!(normalized_to_raw(-1.0), -32767);
        assert_eq!(normalized_to_raw(0.5), 16384);
        assert_eq!(normalized_to_raw(7.0), 32767);
        assert_eq!(normalized_from_raw(-32768), -1.0);
        assert_eq!(normalized_from_raw(16384), 0.5);
    }

    #[test]
    fn test_data_point_type_id() {
        let point = DataPoint::new(1, DataValue::Float(1.0));
        assert_eq!(point.type_id(), TypeId::MeasuredFloat);

        let point = point.with_timestamp(Cp56Time2a::default());
        assert_eq!(point.type_id(), TypeId::MeasuredFloatTime56);

        let point = DataPoint::new(2, DataValue::Double(DoublePointValue::Off));
        assert_eq!(point.type_id(), TypeId::DoublePoint);
    }

    #[test]
    fn test_encode_elements() {
        let encode = |point: DataPoint| {
            let mut buf = BytesMut::new();
            point.encode_element(&mut buf);
            assert_eq!(buf.len(), point.type_id().element_size());
            buf.to_vec()
        };

        let sp = DataPoint::with_quality(1, DataValue::Single(true), Quality::from_qds(0x81));
        assert_eq!(encode(sp), vec![0x81]);

        let dp = DataPoint::new(1, DataValue::Double(DoublePointValue::On));
        assert_eq!(encode(dp), vec![0x02]);

        let nva = DataPoint::new(1, DataValue::Normalized(-1.0));
        assert_eq!(encode(nva), vec![0x01, 0x80, 0x00]);

        let sva = DataPoint::with_quality(1, DataValue::Scaled(-2), Quality::Good.set_overflow(true));
        assert_eq!(encode(sva), vec![0xFE, 0xFF, 0x01]);

        let float = DataPoint::new(1, DataValue::Float(1.0));
        assert_eq!(encode(float), vec![0x00, 0x00, 0x80, 0x3F, 0x00]);

        let time = Cp56Time2a {
            milliseconds: 1,
            minutes: 2,
            hours: 3,
            day: 4,
            day_of_week: 0,
            month: 5,
            year: 6,
            invalid: false,
            summer_time: false,
        };
        let timed = DataPoint::new(1, DataValue::Single(false)).with_timestamp(time);
        assert_eq!(encode(timed), vec![0x00, 0x01, 0x00, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_to_information_object() {
        let object = DataPoint::new(4001, DataValue::Single(true)).to_information_object();
        assert_eq!(object.ioa, Ioa::new(4001));
        assert_eq!(&object.data[..], &[0x01]);
    }
}
