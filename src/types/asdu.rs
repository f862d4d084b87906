//! IEC 60870-5-104 ASDU (Application Service Data Unit).
//!
//! ```text
//! +---------+-----+-----------------+------------+-----------+
//! | TypeId  | VSQ | T|PN|COT        | Originator | CA (LE)   |
//! +---------+-----+-----------------+------------+-----------+
//! | IOA (3, LE) | element | IOA | element | ...              |
//! +----------------------------------------------------------+
//! ```
//!
//! The object count in the VSQ is never stored separately from the object
//! list: it is read when parsing and derived from `objects.len()` when
//! encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Iec104Error, Result};
use crate::types::{Cot, TypeId, ASDU_HEADER_LENGTH, IOA_LENGTH};

/// Variable Structure Qualifier (VSQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vsq {
    /// Number of information objects (0-127)
    pub count: u8,
    /// If true, addresses are sequential (SQ=1)
    pub sequence: bool,
}

impl Vsq {
    /// Create a new VSQ.
    #[inline]
    pub const fn new(count: u8, sequence: bool) -> Self {
        Self { count, sequence }
    }

    /// Parse VSQ from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            count: value & 0x7F,
            sequence: (value & 0x80) != 0,
        }
    }

    /// Encode VSQ to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.count & 0x7F) | if self.sequence { 0x80 } else { 0 }
    }
}

/// Information Object Address (IOA).
///
/// 3-byte address identifying a specific data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Ioa(pub u32);

impl Ioa {
    /// Largest address representable in three bytes.
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Create IOA from u32 (lower 24 bits).
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value & Self::MAX)
    }

    /// Parse IOA from 3 bytes (little-endian).
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [b0, b1, b2, ..] => Ok(Self(u32::from_le_bytes([*b0, *b1, *b2, 0]))),
            _ => Err(Iec104Error::invalid_asdu("IOA too short")),
        }
    }

    /// Encode IOA to 3 bytes (little-endian).
    #[inline]
    pub fn to_bytes(&self) -> [u8; IOA_LENGTH] {
        let [b0, b1, b2, _] = self.0.to_le_bytes();
        [b0, b1, b2]
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Ioa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ASDU header (fixed part).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission
    pub cot: Cot,
    /// Test flag (if true, this is a test ASDU)
    pub test: bool,
    /// Negative flag (if true, negative confirmation)
    pub negative: bool,
    /// Originator address (0 if not used)
    pub originator: u8,
    /// Common address of ASDU (station address)
    pub common_address: u16,
}

impl AsduHeader {
    /// Create a new ASDU header.
    pub fn new(type_id: TypeId, cot: Cot, common_address: u16) -> Self {
        Self {
            type_id,
            vsq: Vsq::default(),
            cot,
            test: false,
            negative: false,
            originator: 0,
            common_address,
        }
    }

    /// Parse ASDU header from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ASDU_HEADER_LENGTH {
            return Err(Iec104Error::invalid_asdu(format!(
                "ASDU header too short: {} bytes",
                data.len()
            )));
        }

        let type_id = TypeId::from_u8(data[0])?;
        let vsq = Vsq::from_u8(data[1]);

        // COT is in lower 6 bits, test flag in bit 7, negative in bit 6
        let cot = Cot::from_u8(data[2]);

        Ok(Self {
            type_id,
            vsq,
            cot,
            test: (data[2] & 0x80) != 0,
            negative: (data[2] & 0x40) != 0,
            originator: data[3],
            common_address: u16::from_le_bytes([data[4], data[5]]),
        })
    }

    /// Encode ASDU header with the given object count.
    pub fn encode(&self, count: u8, buf: &mut BytesMut) {
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(Vsq::new(count, self.vsq.sequence).as_u8());

        let mut cot_byte = self.cot.as_u8();
        if self.test {
            cot_byte |= 0x80;
        }
        if self.negative {
            cot_byte |= 0x40;
        }
        buf.put_u8(cot_byte);
        buf.put_u8(self.originator);
        buf.put_u16_le(self.common_address);
    }
}

/// Information object: address plus the raw type-specific element.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    /// Information object address
    pub ioa: Ioa,
    /// Raw element bytes (value, quality, optional time tag)
    pub data: Bytes,
}

impl InformationObject {
    /// Create a new information object.
    pub fn new(ioa: Ioa, data: impl Into<Bytes>) -> Self {
        Self {
            ioa,
            data: data.into(),
        }
    }
}

/// Complete ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// ASDU header
    pub header: AsduHeader,
    /// Information objects
    pub objects: Vec<InformationObject>,
}

impl Asdu {
    /// Create an empty ASDU.
    pub fn new(type_id: TypeId, cot: Cot, common_address: u16) -> Self {
        Self {
            header: AsduHeader::new(type_id, cot, common_address),
            objects: Vec::new(),
        }
    }

    /// Set the originator address.
    pub fn with_originator(mut self, originator: u8) -> Self {
        self.header.originator = originator;
        self
    }

    /// Set the P/N bit.
    pub fn with_negative(mut self, negative: bool) -> Self {
        self.header.negative = negative;
        self
    }

    /// Append an information object.
    pub fn push(&mut self, ioa: Ioa, data: impl Into<Bytes>) {
        self.objects.push(InformationObject::new(ioa, data));
    }

    /// Append an information object (builder style).
    pub fn with_object(mut self, ioa: Ioa, data: impl Into<Bytes>) -> Self {
        self.push(ioa, data);
        self
    }

    /// Copy of this ASDU with another cause of transmission.
    ///
    /// Used for confirmations, which mirror the request.
    pub fn mirror(&self, cot: Cot) -> Self {
        let mut mirrored = self.clone();
        mirrored.header.cot = cot;
        mirrored.header.negative = false;
        mirrored
    }

    /// Type identification shortcut.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.header.type_id
    }

    /// Parse ASDU from bytes (after APCI).
    ///
    /// The object area must hold exactly the number of elements announced
    /// by the VSQ.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = AsduHeader::parse(data)?;
        let body = &data[ASDU_HEADER_LENGTH..];

        let count = header.vsq.count as usize;
        let element_size = header.type_id.element_size();
        let expected = match (header.vsq.sequence, count) {
            (_, 0) => 0,
            (true, n) => IOA_LENGTH + n * element_size,
            (false, n) => n * (IOA_LENGTH + element_size),
        };
        if body.len() != expected {
            return Err(Iec104Error::invalid_asdu(format!(
                "{} with {} objects needs {} bytes, got {}",
                header.type_id,
                count,
                expected,
                body.len()
            )));
        }

        let mut objects = Vec::with_capacity(count);
        if header.vsq.sequence && count > 0 {
            let base = Ioa::from_bytes(body)?.value();
            let elements = &body[IOA_LENGTH..];
            for i in 0..count {
                let start = i * element_size;
                objects.push(InformationObject::new(
                    Ioa::new(base + i as u32),
                    Bytes::copy_from_slice(&elements[start..start + element_size]),
                ));
            }
        } else {
            for chunk in body.chunks_exact(IOA_LENGTH + element_size) {
                let ioa = Ioa::from_bytes(chunk)?;
                objects.push(InformationObject::new(
                    ioa,
                    Bytes::copy_from_slice(&chunk[IOA_LENGTH..]),
                ));
            }
        }

        Ok(Self { header, objects })
    }

    /// Encode ASDU to bytes.
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Encode ASDU directly into the provided buffer.
    ///
    /// Fails if the object count does not fit the VSQ.
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<()> {
        let count = u8::try_from(self.objects.len())
            .ok()
            .filter(|n| *n <= 0x7F)
            .ok_or_else(|| {
                Iec104Error::invalid_asdu(format!("{} objects exceed VSQ", self.objects.len()))
            })?;

        self.header.encode(count, buf);

        for (i, obj) in self.objects.iter().enumerate() {
            if !self.header.vsq.sequence || i == 0 {
                buf.put_slice(&obj.ioa.to_bytes());
            }
            buf.put_slice(&obj.data);
        }
        Ok(())
    }

    /// Calculate the encoded length of this ASDU.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        let ioa_count = match (self.header.vsq.sequence, self.objects.is_empty()) {
            (_, true) => 0,
            (true, false) => 1,
            (false, false) => self.objects.len(),
        };
        ASDU_HEADER_LENGTH
            + ioa_count * IOA_LENGTH
            + self.objects.iter().map(|obj| obj.data.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsq() {
        let vsq = Vsq::new(10, false);
        assert_eq!(vsq.as_u8(), 10);

        let vsq = Vsq::new(10, true);
        assert_eq!(vsq.as_u8(), 0x8A);

        let vsq = Vsq::from_u8(0x8A);
        assert_eq!(vsq.count, 10);
        assert!(vsq.sequence);
    }

    #[test]
    fn test_ioa() {
        let ioa = Ioa::new(0x123456);
        let bytes = ioa.to_bytes();
        assert_eq!(bytes, [0x56, 0x34, 0x12]);

        let parsed = Ioa::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.value(), 0x123456);

        assert_eq!(Ioa::new(0x0100_0001).value(), 1);
        assert!(Ioa::from_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn test_asdu_header_wire_layout() {
        let mut header = AsduHeader::new(TypeId::InterrogationCommand, Cot::ActivationConfirm, 0x0201);
        header.test = true;
        header.negative = true;
        header.originator = 9;

        let mut buf = BytesMut::new();
        header.encode(1, &mut buf);
        assert_eq!(&buf[..], &[100, 0x01, 0x80 | 0x40 | 7, 9, 0x01, 0x02]);

        let parsed = AsduHeader::parse(&buf).unwrap();
        assert_eq!(parsed.type_id, TypeId::InterrogationCommand);
        assert_eq!(parsed.vsq.count, 1);
        assert_eq!(parsed.cot, Cot::ActivationConfirm);
        assert!(parsed.test);
        assert!(parsed.negative);
        assert_eq!(parsed.originator, 9);
        assert_eq!(parsed.common_address, 0x0201);
    }

    #[test]
    fn test_asdu_header_errors() {
        assert!(AsduHeader::parse(&[100, 1, 6, 0, 1]).is_err());
        assert!(matches!(
            AsduHeader::parse(&[120, 1, 6, 0, 1, 0]),
            Err(Iec104Error::UnknownTypeId(120))
        ));
    }

    #[test]
    fn test_asdu_header_unassigned_cause() {
        let header = AsduHeader::parse(&[100, 1, 0x40, 0, 1, 0]).unwrap();
        assert_eq!(header.cot, Cot::Unassigned(0));
        assert!(header.negative);
    }

    #[test]
    fn test_asdu_count_derived_from_objects() {
        let mut asdu = Asdu::new(TypeId::SinglePoint, Cot::Spontaneous, 1);
        asdu.header.vsq.count = 99;
        asdu.push(Ioa::new(4001), vec![0x01]);
        asdu.push(Ioa::new(4002), vec![0x80]);

        let buf = asdu.encode().unwrap();
        assert_eq!(buf[1], 2);
        assert_eq!(buf.len(), asdu.encoded_len());
        assert_eq!(
            &buf[6..],
            &[0xA1, 0x0F, 0x00, 0x01, 0xA2, 0x0F, 0x00, 0x80]
        );
    }

    #[test]
    fn test_asdu_parse_objects() {
        let data = [
            13, 0x02, 20, 0, 1, 0, // M_ME_NC_1, 2 objects, inrogen, CA 1
            0xE9, 0x03, 0x00, 0x00, 0x00, 0x80, 0x3F, 0x00, // IOA 1001 = 1.0
            0xEA, 0x03, 0x00, 0x00, 0x00, 0x00, 0x40, 0x10, // IOA 1002 = 2.0 BL
        ];

        let asdu = Asdu::parse(&data).unwrap();
        assert_eq!(asdu.type_id(), TypeId::MeasuredFloat);
        assert_eq!(asdu.header.cot, Cot::InterrogatedByStation);
        assert_eq!(asdu.objects.len(), 2);
        assert_eq!(asdu.objects[0].ioa, Ioa::new(1001));
        assert_eq!(&asdu.objects[1].data[..], &[0x00, 0x00, 0x00, 0x40, 0x10]);

        assert_eq!(&asdu.encode().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_asdu_parse_sequence() {
        // SQ=1: one IOA followed by three SIQ elements
        let data = [1, 0x83, 3, 0, 1, 0, 0x10, 0x00, 0x00, 0x01, 0x00, 0x81];

        let asdu = Asdu::parse(&data).unwrap();
        let ioas: Vec<u32> = asdu.objects.iter().map(|o| o.ioa.value()).collect();
        assert_eq!(ioas, vec![16, 17, 18]);
        assert_eq!(&asdu.objects[2].data[..], &[0x81]);

        assert_eq!(&asdu.encode().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_asdu_parse_read_command_has_empty_element() {
        let data = [102, 0x01, 5, 0, 1, 0, 0xA1, 0x0F, 0x00];

        let asdu = Asdu::parse(&data).unwrap();
        assert_eq!(asdu.objects.len(), 1);
        assert_eq!(asdu.objects[0].ioa.value(), 4001);
        assert!(asdu.objects[0].data.is_empty());
    }

    #[test]
    fn test_asdu_parse_length_mismatch() {
        // Announces one QOI object but carries an extra byte
        let data = [100, 0x01, 6, 0, 1, 0, 0, 0, 0, 20, 0xFF];
        assert!(matches!(Asdu::parse(&data), Err(Iec104Error::InvalidAsdu(_))));

        // Announces two objects, carries one
        let data = [100, 0x02, 6, 0, 1, 0, 0, 0, 0, 20];
        assert!(matches!(Asdu::parse(&data), Err(Iec104Error::InvalidAsdu(_))));
    }

    #[test]
    fn test_asdu_encode_rejects_oversized_vsq() {
        let mut asdu = Asdu::new(TypeId::SinglePoint, Cot::Spontaneous, 1);
        for ioa in 0..128 {
            asdu.push(Ioa::new(ioa), vec![0]);
        }
        assert!(asdu.encode().is_err());
    }

    #[test]
    fn test_asdu_mirror() {
        let request = Asdu::new(TypeId::InterrogationCommand, Cot::Activation, 1)
            .with_originator(3)
            .with_negative(true)
            .with_object(Ioa::new(0), vec![20]);

        let confirm = request.mirror(Cot::ActivationConfirm);
        assert_eq!(confirm.header.cot, Cot::ActivationConfirm);
        assert_eq!(confirm.header.originator, 3);
        assert!(!confirm.header.negative);
        assert_eq!(confirm.objects, request.objects);
    }
}
