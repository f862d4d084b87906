//! ASDU information object parser.
//!
//! Turns the raw elements of a parsed [`Asdu`] into structured values:
//! [`DataPoint`]s for the monitoring direction and [`ControlObject`]s for
//! the requests a controlled station receives.

use crate::error::{Iec104Error, Result};
use crate::types::{
    normalized_from_raw, Asdu, Cp56Time2a, DataPoint, DataValue, DoubleCommand, DoublePointValue,
    InformationObject, Ioa, Quality, SingleCommand, TypeId,
};

/// One information object of a control-direction ASDU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlObject {
    /// C_IC_NA_1 with its qualifier of interrogation
    Interrogation {
        /// Information object address (0 for station requests)
        ioa: Ioa,
        /// Qualifier of interrogation
        qoi: u8,
    },
    /// C_RD_NA_1
    Read {
        /// Address of the point to read
        ioa: Ioa,
    },
    /// C_CS_NA_1
    ClockSync {
        /// Information object address (0)
        ioa: Ioa,
        /// Time sent by the master
        time: Cp56Time2a,
    },
    /// C_SC_NA_1 / C_SC_TA_1
    Single {
        /// Commanded point
        ioa: Ioa,
        /// Single command object
        command: SingleCommand,
        /// Time tag of the time-tagged variant
        time: Option<Cp56Time2a>,
    },
    /// C_DC_NA_1 / C_DC_TA_1
    Double {
        /// Commanded point
        ioa: Ioa,
        /// Double command object
        command: DoubleCommand,
        /// Time tag of the time-tagged variant
        time: Option<Cp56Time2a>,
    },
}

impl ControlObject {
    /// Address of the object.
    pub fn ioa(&self) -> Ioa {
        match self {
            Self::Interrogation { ioa, .. }
            | Self::Read { ioa }
            | Self::ClockSync { ioa, .. }
            | Self::Single { ioa, .. }
            | Self::Double { ioa, .. } => *ioa,
        }
    }
}

/// Parse a monitoring-direction ASDU into a list of data points.
///
/// Control-direction ASDUs yield no data points.
///
/// # Example
///
/// ```rust,ignore
/// let asdu = apdu.decode_asdu().unwrap()?;
/// for point in parse_asdu(&asdu)? {
///     println!("IOA {}: {:?} ({})", point.ioa, point.value, point.quality);
/// }
/// ```
pub fn parse_asdu(asdu: &Asdu) -> Result<Vec<DataPoint>> {
    let type_id = asdu.type_id();
    if !type_id.is_monitoring() {
        return Ok(Vec::new());
    }
    asdu.objects
        .iter()
        .map(|object| parse_data_point(type_id, object))
        .collect()
}

/// Parse the information objects of a control-direction ASDU.
///
/// Monitoring-direction ASDUs are rejected: a controlled station never
/// expects to receive them.
pub fn parse_control(asdu: &Asdu) -> Result<Vec<ControlObject>> {
    let type_id = asdu.type_id();
    asdu.objects
        .iter()
        .map(|object| parse_control_object(type_id, object))
        .collect()
}

fn element<'a>(type_id: TypeId, object: &'a InformationObject) -> Result<&'a [u8]> {
    let data = object.data.as_ref();
    if data.len() != type_id.element_size() {
        return Err(Iec104Error::invalid_asdu(format!(
            "{} element for IOA {} has {} bytes, expected {}",
            type_id,
            object.ioa,
            data.len(),
            type_id.element_size()
        )));
    }
    Ok(data)
}

fn time_tag(type_id: TypeId, data: &[u8]) -> Result<Option<Cp56Time2a>> {
    if type_id.has_time_tag() {
        Cp56Time2a::from_bytes(&data[data.len() - 7..]).map(Some)
    } else {
        Ok(None)
    }
}

fn parse_data_point(type_id: TypeId, object: &InformationObject) -> Result<DataPoint> {
    let data = element(type_id, object)?;

    let (value, quality) = match type_id {
        TypeId::SinglePoint | TypeId::SinglePointTime56 => {
            (DataValue::Single((data[0] & 0x01) != 0), Quality::from_siq(data[0]))
        }
        TypeId::DoublePoint | TypeId::DoublePointTime56 => (
            DataValue::Double(DoublePointValue::from_u8(data[0])),
            Quality::from_siq(data[0]),
        ),
        TypeId::MeasuredNormalized | TypeId::MeasuredNormalizedTime56 => {
            let raw = i16::from_le_bytes([data[0], data[1]]);
            (DataValue::Normalized(normalized_from_raw(raw)), Quality::from_qds(data[2]))
        }
        TypeId::MeasuredScaled | TypeId::MeasuredScaledTime56 => (
            DataValue::Scaled(i16::from_le_bytes([data[0], data[1]])),
            Quality::from_qds(data[2]),
        ),
        TypeId::MeasuredFloat | TypeId::MeasuredFloatTime56 => (
            DataValue::Float(f32::from_le_bytes([data[0], data[1], data[2], data[3]])),
            Quality::from_qds(data[4]),
        ),
        TypeId::SingleCommand
        | TypeId::DoubleCommand
        | TypeId::SingleCommandTime56
        | TypeId::DoubleCommandTime56
        | TypeId::InterrogationCommand
        | TypeId::ReadCommand
        | TypeId::ClockSync => {
            return Err(Iec104Error::invalid_asdu(format!(
                "{} is not a monitoring type",
                type_id
            )))
        }
    };

    Ok(DataPoint {
        ioa: object.ioa.value(),
        value,
        quality,
        timestamp: time_tag(type_id, data)?,
    })
}

fn parse_control_object(type_id: TypeId, object: &InformationObject) -> Result<ControlObject> {
    let data = element(type_id, object)?;
    let ioa = object.ioa;

    let control = match type_id {
        TypeId::InterrogationCommand => ControlObject::Interrogation { ioa, qoi: data[0] },
        TypeId::ReadCommand => ControlObject::Read { ioa },
        TypeId::ClockSync => ControlObject::ClockSync {
            ioa,
            time: Cp56Time2a::from_bytes(data)?,
        },
        TypeId::SingleCommand | TypeId::SingleCommandTime56 => ControlObject::Single {
            ioa,
            command: SingleCommand::from_u8(data[0]),
            time: time_tag(type_id, data)?,
        },
        TypeId::DoubleCommand | TypeId::DoubleCommandTime56 => ControlObject::Double {
            ioa,
            command: DoubleCommand::from_u8(data[0]),
            time: time_tag(type_id, data)?,
        },
        TypeId::SinglePoint
        | TypeId::DoublePoint
        | TypeId::MeasuredNormalized
        | TypeId::MeasuredScaled
        | TypeId::MeasuredFloat
        | TypeId::SinglePointTime56
        | TypeId::DoublePointTime56
        | TypeId::MeasuredNormalizedTime56
        | TypeId::MeasuredScaledTime56
        | TypeId::MeasuredFloatTime56 => {
            return Err(Iec104Error::invalid_asdu(format!(
                "{} is not a control type",
                type_id
            )))
        }
    };
    Ok(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cot;

    fn parse(bytes: &[u8]) -> Asdu {
        Asdu::parse(bytes).unwrap()
    }

    #[test]
    fn test_parse_single_points() {
        let asdu = parse(&[1, 0x02, 20, 0, 1, 0, 0xA1, 0x0F, 0x00, 0x01, 0xA2, 0x0F, 0x00, 0x90]);
        let points = parse_asdu(&asdu).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].ioa, 4001);
        assert_eq!(points[0].value, DataValue::Single(true));
        assert!(points[0].is_good());
        assert_eq!(points[1].value, DataValue::Single(false));
        assert!(points[1].quality.invalid());
        assert!(points[1].quality.blocked());
    }

    #[test]
    fn test_parse_double_point_with_time() {
        let asdu = parse(&[
            31, 0x01, 3, 0, 1, 0, 0x8A, 0x13, 0x00, // IOA 5002
            0x02, // DIQ: ON
            0x10, 0x27, 15, 8, 17, 3, 24, // 10.000 s, 08:15, 17 March 2024
        ]);
        let points = parse_asdu(&asdu).unwrap();

        assert_eq!(points[0].ioa, 5002);
        assert_eq!(points[0].value, DataValue::Double(DoublePointValue::On));
        let ts = points[0].timestamp.unwrap();
        assert_eq!(ts.milliseconds, 10_000);
        assert_eq!(ts.hours, 8);
        assert_eq!(ts.year, 24);
    }

    #[test]
    fn test_parse_measured_values() {
        let asdu = parse(&[9, 0x01, 5, 0, 1, 0, 0xB9, 0x0B, 0x00, 0x00, 0x40, 0x00]);
        let points = parse_asdu(&asdu).unwrap();
        assert_eq!(points[0].value, DataValue::Normalized(0.5));

        let asdu = parse(&[11, 0x01, 5, 0, 1, 0, 0xD1, 0x07, 0x00, 0x18, 0xFC, 0x01]);
        let points = parse_asdu(&asdu).unwrap();
        assert_eq!(points[0].value, DataValue::Scaled(-1000));
        assert!(points[0].quality.overflow());

        let asdu = parse(&[13, 0x01, 5, 0, 1, 0, 0xED, 0x03, 0x00, 0x00, 0x00, 0x48, 0x42, 0x00]);
        let points = parse_asdu(&asdu).unwrap();
        assert_eq!(points[0].value, DataValue::Float(50.0));
    }

    #[test]
    fn test_parse_asdu_matches_encoding() {
        let point = DataPoint::with_quality(
            6001,
            DataValue::Float(-3.25),
            Quality::Good.set_substituted(true),
        )
        .with_timestamp(Cp56Time2a {
            milliseconds: 59_999,
            minutes: 59,
            hours: 23,
            day: 31,
            day_of_week: 2,
            month: 12,
            year: 99,
            invalid: false,
            summer_time: true,
        });

        let mut asdu = Asdu::new(point.type_id(), Cot::Spontaneous, 1);
        asdu.objects.push(point.to_information_object());
        let decoded = parse(&asdu.encode().unwrap());

        assert_eq!(parse_asdu(&decoded).unwrap(), vec![point]);
    }

    #[test]
    fn test_parse_asdu_ignores_control_direction() {
        let asdu = parse(&[100, 0x01, 6, 0, 1, 0, 0, 0, 0, 20]);
        assert!(parse_asdu(&asdu).unwrap().is_empty());
    }

    #[test]
    fn test_parse_control_interrogation() {
        let asdu = parse(&[100, 0x01, 6, 0, 1, 0, 0, 0, 0, 20]);
        assert_eq!(
            parse_control(&asdu).unwrap(),
            vec![ControlObject::Interrogation {
                ioa: Ioa::new(0),
                qoi: 20
            }]
        );
    }

    #[test]
    fn test_parse_control_commands() {
        let asdu = parse(&[45, 0x01, 6, 0, 1, 0, 0xA3, 0x0F, 0x00, 0x81]);
        let objects = parse_control(&asdu).unwrap();
        match objects[0] {
            ControlObject::Single { ioa, command, time } => {
                assert_eq!(ioa, Ioa::new(4003));
                assert!(command.state);
                assert!(command.select);
                assert!(time.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let asdu = parse(&[
            59, 0x01, 6, 0, 1, 0, 0x89, 0x13, 0x00, 0x01, 0, 0, 30, 12, 1, 6, 25,
        ]);
        let objects = parse_control(&asdu).unwrap();
        match objects[0] {
            ControlObject::Double { ioa, command, time } => {
                assert_eq!(ioa, Ioa::new(5001));
                assert_eq!(command.state, DoublePointValue::Off);
                assert!(!command.select);
                assert_eq!(time.unwrap().minutes, 30);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(objects[0].ioa(), Ioa::new(5001));
    }

    #[test]
    fn test_parse_control_read_and_clock() {
        let asdu = parse(&[102, 0x01, 5, 0, 1, 0, 0xE9, 0x03, 0x00]);
        assert_eq!(
            parse_control(&asdu).unwrap(),
            vec![ControlObject::Read { ioa: Ioa::new(1001) }]
        );

        let asdu = parse(&[103, 0x01, 6, 0, 1, 0, 0, 0, 0, 0xE8, 0x03, 5, 4, 3, 2, 25]);
        match parse_control(&asdu).unwrap()[0] {
            ControlObject::ClockSync { time, .. } => {
                assert_eq!(time.milliseconds, 1000);
                assert_eq!(time.month, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_rejects_monitoring_type() {
        let asdu = parse(&[1, 0x01, 3, 0, 1, 0, 0xA1, 0x0F, 0x00, 0x01]);
        assert!(parse_control(&asdu).is_err());
    }

    #[test]
    fn test_element_size_checked_on_hand_built_asdu() {
        let asdu = Asdu::new(TypeId::MeasuredFloat, Cot::Spontaneous, 1)
            .with_object(Ioa::new(1), vec![0u8; 3]);
        assert!(matches!(parse_asdu(&asdu), Err(Iec104Error::InvalidAsdu(_))));
    }
}
