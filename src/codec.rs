//! IEC 60870-5-104 codec for tokio.
//!
//! Frames APDUs on a TCP byte stream using the tokio-util codec framework.
//! The codec only validates the APCI; the ASDU of an I-frame is handed up
//! as raw bytes so that a type the station does not understand never tears
//! down the connection. A framing error, on the other hand, is returned to
//! the caller, which closes the connection: there is no resynchronisation
//! after a bad start byte.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Iec104Error, Result};
use crate::types::{
    Apci, Asdu, UFunction, MAX_APDU_LENGTH, MAX_ASDU_LENGTH, MIN_APDU_LENGTH, START_BYTE,
};

/// Start byte, length byte and control field.
const APCI_LENGTH: usize = 6;

/// An IEC 104 APDU (Application Protocol Data Unit).
///
/// Contains the APCI header and, for I-frames, the encoded ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Apdu {
    /// APCI (Application Protocol Control Information)
    pub apci: Apci,
    /// Encoded ASDU - only present in I-frames
    pub asdu: Option<Bytes>,
}

impl Apdu {
    /// Create a new I-frame APDU carrying an encoded ASDU.
    pub fn i_frame(send_seq: u16, recv_seq: u16, asdu: Bytes) -> Self {
        Self {
            apci: Apci::i_frame(send_seq, recv_seq),
            asdu: Some(asdu),
        }
    }

    /// Create a new S-frame APDU.
    pub fn s_frame(recv_seq: u16) -> Self {
        Self {
            apci: Apci::s_frame(recv_seq),
            asdu: None,
        }
    }

    /// Create a new U-frame APDU.
    pub fn u_frame(function: UFunction) -> Self {
        Self {
            apci: Apci::u_frame(function),
            asdu: None,
        }
    }

    /// Decode the carried ASDU, if any.
    pub fn decode_asdu(&self) -> Option<Result<Asdu>> {
        self.asdu.as_deref().map(Asdu::parse)
    }

    /// Check if this is an I-frame.
    pub fn is_i_frame(&self) -> bool {
        self.apci.is_i_frame()
    }

    /// Check if this is an S-frame.
    pub fn is_s_frame(&self) -> bool {
        self.apci.is_s_frame()
    }

    /// Check if this is a U-frame.
    pub fn is_u_frame(&self) -> bool {
        self.apci.is_u_frame()
    }
}

impl std::fmt::Display for Apdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.apci)?;
        if let Some(asdu) = &self.asdu {
            write!(f, " [{} bytes", asdu.len())?;
            if let Some(type_id) = asdu.first() {
                write!(f, ", type {}", type_id)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// IEC 60870-5-104 codec.
///
/// # Example
///
/// ```rust,ignore
/// use futures::{SinkExt, StreamExt};
/// use tokio_util::codec::Framed;
/// use voltage_iec104_sim::{Apdu, Iec104Codec, UFunction};
///
/// let stream = TcpStream::connect("127.0.0.1:2404").await?;
/// let mut framed = Framed::new(stream, Iec104Codec::new());
///
/// framed.send(Apdu::u_frame(UFunction::StartDtAct)).await?;
/// while let Some(apdu) = framed.next().await {
///     println!("Received: {}", apdu?);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Iec104Codec;

impl Iec104Codec {
    /// Create a new IEC 104 codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Iec104Codec {
    type Item = Apdu;
    type Error = Iec104Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(&start) = src.first() else {
            return Ok(None);
        };
        if start != START_BYTE {
            return Err(Iec104Error::invalid_frame(format!(
                "unexpected start byte 0x{:02X}",
                start
            )));
        }

        let Some(&length) = src.get(1) else {
            return Ok(None);
        };
        let length = length as usize;
        if !(MIN_APDU_LENGTH..=MAX_APDU_LENGTH).contains(&length) {
            return Err(Iec104Error::invalid_frame(format!(
                "APDU length {} outside {}..={}",
                length, MIN_APDU_LENGTH, MAX_APDU_LENGTH
            )));
        }

        let total_length = 2 + length;
        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total_length).freeze();
        let apci = Apci::parse(&frame[2..APCI_LENGTH])?;

        let asdu = match apci {
            Apci::IFrame { .. } if length == MIN_APDU_LENGTH => {
                return Err(Iec104Error::invalid_frame("I-frame without ASDU"));
            }
            Apci::IFrame { .. } => Some(frame.slice(APCI_LENGTH..)),
            Apci::SFrame { .. } | Apci::UFrame { .. } if length != MIN_APDU_LENGTH => {
                return Err(Iec104Error::invalid_frame(format!(
                    "{} frame with length {}",
                    apci, length
                )));
            }
            Apci::SFrame { .. } | Apci::UFrame { .. } => None,
        };

        Ok(Some(Apdu { apci, asdu }))
    }
}

impl Encoder<Apdu> for Iec104Codec {
    type Error = Iec104Error;

    fn encode(&mut self, item: Apdu, dst: &mut BytesMut) -> Result<()> {
        let asdu_len = item.asdu.as_ref().map_or(0, Bytes::len);

        match (&item.apci, asdu_len) {
            (Apci::IFrame { .. }, 0) => {
                return Err(Iec104Error::protocol("I-frame without ASDU"));
            }
            (Apci::IFrame { .. }, len) if len > MAX_ASDU_LENGTH => {
                return Err(Iec104Error::protocol(format!("ASDU too large: {} bytes", len)));
            }
            (Apci::SFrame { .. } | Apci::UFrame { .. }, len) if len > 0 => {
                return Err(Iec104Error::protocol("ASDU on S/U-frame"));
            }
            _ => {}
        }

        dst.reserve(APCI_LENGTH + asdu_len);
        dst.extend_from_slice(&item.apci.encode_header(asdu_len));
        if let Some(asdu) = &item.asdu {
            dst.extend_from_slice(asdu);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cot, Ioa, TypeId};

    fn decode_all(bytes: &[u8]) -> Result<Option<Apdu>> {
        let mut buf = BytesMut::from(bytes);
        Iec104Codec::new().decode(&mut buf)
    }

    #[test]
    fn test_decode_u_frame() {
        let apdu = decode_all(&[0x68, 0x04, 0x07, 0x00, 0x00, 0x00]).unwrap().unwrap();
        assert!(apdu.is_u_frame());
        assert_eq!(apdu.apci, Apci::u_frame(UFunction::StartDtAct));
        assert!(apdu.asdu.is_none());
    }

    #[test]
    fn test_decode_s_frame() {
        // S-frame with recv_seq = 100
        let apdu = decode_all(&[0x68, 0x04, 0x01, 0x00, 0xC8, 0x00]).unwrap().unwrap();
        assert!(apdu.is_s_frame());
        assert_eq!(apdu.apci.recv_seq(), Some(100));
    }

    #[test]
    fn test_decode_i_frame_keeps_unknown_type() {
        // Type 120 is not served, the frame itself is still valid
        let apdu = decode_all(&[0x68, 0x0A, 0x02, 0x00, 0x04, 0x00, 120, 1, 6, 0, 1, 0])
            .unwrap()
            .unwrap();
        assert_eq!(apdu.apci, Apci::i_frame(1, 2));
        assert_eq!(apdu.asdu.as_deref(), Some(&[120, 1, 6, 0, 1, 0][..]));
        assert!(matches!(
            apdu.decode_asdu(),
            Some(Err(Iec104Error::UnknownTypeId(120)))
        ));
    }

    #[test]
    fn test_encode_frames() {
        let mut codec = Iec104Codec::new();
        let mut buf = BytesMut::new();

        codec.encode(Apdu::u_frame(UFunction::TestFrCon), &mut buf).unwrap();
        codec.encode(Apdu::s_frame(100), &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            &[0x68, 0x04, 0x83, 0x00, 0x00, 0x00, 0x68, 0x04, 0x01, 0x00, 0xC8, 0x00]
        );
    }

    #[test]
    fn test_encode_i_frame() {
        let mut codec = Iec104Codec::new();
        let mut buf = BytesMut::new();

        let asdu = Asdu::new(TypeId::InterrogationCommand, Cot::ActivationConfirm, 1)
            .with_object(Ioa::new(0), vec![20])
            .encode()
            .unwrap()
            .freeze();
        codec.encode(Apdu::i_frame(10, 5, asdu), &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            &[0x68, 0x0E, 0x14, 0x00, 0x0A, 0x00, 100, 1, 7, 0, 1, 0, 0, 0, 0, 20]
        );
    }

    #[test]
    fn test_encode_rejects_bad_payloads() {
        let mut codec = Iec104Codec::new();
        let mut buf = BytesMut::new();

        let empty = Apdu::i_frame(0, 0, Bytes::new());
        assert!(codec.encode(empty, &mut buf).is_err());

        let oversized = Apdu::i_frame(0, 0, Bytes::from(vec![0u8; MAX_ASDU_LENGTH + 1]));
        assert!(codec.encode(oversized, &mut buf).is_err());

        let mut s_frame = Apdu::s_frame(0);
        s_frame.asdu = Some(Bytes::from_static(&[1]));
        assert!(codec.encode(s_frame, &mut buf).is_err());

        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_frame() {
        let mut codec = Iec104Codec::new();

        let mut buf = BytesMut::from(&[0x68][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x04, 0x43]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x68]);
        let apdu = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(apdu.apci, Apci::u_frame(UFunction::TestFrAct));

        // The start of the next frame stays buffered
        assert_eq!(&buf[..], &[0x68]);
    }

    #[test]
    fn test_decode_bad_start_byte_is_fatal() {
        let err = decode_all(&[0xFF, 0x68, 0x04, 0x07, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(err.is_framing_error());
    }

    #[test]
    fn test_decode_bad_length_is_fatal() {
        assert!(decode_all(&[0x68, 0x03]).unwrap_err().is_framing_error());
        assert!(decode_all(&[0x68, 0xFE]).unwrap_err().is_framing_error());
    }

    #[test]
    fn test_decode_bad_control_is_fatal() {
        // S-frame with trailing payload
        let err = decode_all(&[0x68, 0x05, 0x01, 0x00, 0x00, 0x00, 0xAA]).unwrap_err();
        assert!(err.is_framing_error());

        // Unknown U-function
        let err = decode_all(&[0x68, 0x04, 0x0F, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(err.is_framing_error());

        // I-frame with empty ASDU
        let err = decode_all(&[0x68, 0x04, 0x00, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(err.is_framing_error());
    }

    #[test]
    fn test_roundtrip() {
        let mut codec = Iec104Codec::new();

        for func in [
            UFunction::StartDtAct,
            UFunction::StartDtCon,
            UFunction::StopDtAct,
            UFunction::StopDtCon,
            UFunction::TestFrAct,
            UFunction::TestFrCon,
        ] {
            let mut buf = BytesMut::new();
            let original = Apdu::u_frame(func);
            codec.encode(original.clone(), &mut buf).unwrap();

            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, original);
        }

        for recv_seq in [0, 100, 32767] {
            let mut buf = BytesMut::new();
            let original = Apdu::s_frame(recv_seq);
            codec.encode(original.clone(), &mut buf).unwrap();

            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_display() {
        let apdu = Apdu::i_frame(1, 2, Bytes::from_static(&[100, 1, 6, 0, 1, 0, 0, 0, 0, 20]));
        assert_eq!(apdu.to_string(), "I(S=1, R=2) [10 bytes, type 100]");
    }
}
