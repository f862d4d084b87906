//! Application layer of the controlled station.
//!
//! [`AsduHandler::handle`] turns one received ASDU into the ASDUs to send
//! back. It is total: malformed or unsupported requests are logged and
//! either ignored or answered negatively, never turned into errors.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::StationClock;
use crate::config::{ServerConfig, BROADCAST_ADDRESS};
use crate::parser::{parse_control, ControlObject};
use crate::points::{PointReading, PointRegistry};
use crate::types::{
    Asdu, Cot, Cp56Time2a, DataPoint, DoublePointValue, InformationObject, Ioa, TypeId,
    QOI_STATION,
};

/// Answers control-direction ASDUs against the point registry.
#[derive(Debug)]
pub struct AsduHandler {
    registry: Arc<PointRegistry>,
    clock: Arc<StationClock>,
    common_address: u16,
    batch_size: usize,
}

/// A command reduced to what the handler needs.
struct CommandRequest {
    ioa: Ioa,
    select: bool,
    /// Value to apply, `None` if the state is not a valid command
    value: Option<f64>,
    /// Point types the command may address
    accepts: fn(TypeId) -> bool,
}

impl AsduHandler {
    /// Create a handler for the station described by `config`.
    pub fn new(registry: Arc<PointRegistry>, clock: Arc<StationClock>, config: &ServerConfig) -> Self {
        Self {
            registry,
            clock,
            common_address: config.common_address,
            batch_size: config.interrogation_batch.max(1),
        }
    }

    /// Shared point registry.
    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    /// Station clock.
    pub fn clock(&self) -> &StationClock {
        &self.clock
    }

    /// Common address of the station.
    pub fn common_address(&self) -> u16 {
        self.common_address
    }

    /// Process one request and return the responses in send order.
    pub fn handle(&self, request: &Asdu) -> Vec<Asdu> {
        let header = &request.header;

        if header.common_address != self.common_address && header.common_address != BROADCAST_ADDRESS
        {
            warn!(
                ca = header.common_address,
                type_id = %header.type_id,
                "Request for unknown common address"
            );
            return vec![request.mirror(Cot::UnknownCommonAddress).with_negative(true)];
        }

        let controls = match parse_control(request) {
            Ok(controls) => controls,
            Err(e) => {
                warn!(type_id = %header.type_id, cot = %header.cot, "Ignoring ASDU: {}", e);
                return Vec::new();
            }
        };

        let mut replies = Vec::new();
        for (object, control) in request.objects.iter().zip(controls) {
            match control {
                ControlObject::Interrogation { qoi, .. } => {
                    self.interrogation(request, object, qoi, &mut replies)
                }
                ControlObject::ClockSync { time, .. } => {
                    self.clock_sync(request, object, time, &mut replies)
                }
                ControlObject::Read { ioa } => self.read(request, ioa, &mut replies),
                ControlObject::Single { ioa, command, .. } => {
                    let value = if command.state { 1.0 } else { 0.0 };
                    let target = CommandRequest {
                        ioa,
                        select: command.select,
                        value: Some(value),
                        accepts: |t| matches!(t, TypeId::SinglePoint | TypeId::SinglePointTime56),
                    };
                    self.command(request, object, target, &mut replies)
                }
                ControlObject::Double { ioa, command, .. } => {
                    let value = command
                        .state
                        .is_determined()
                        .then(|| double_point_value(command.state));
                    let target = CommandRequest {
                        ioa,
                        select: command.select,
                        value,
                        accepts: |t| matches!(t, TypeId::DoublePoint | TypeId::DoublePointTime56),
                    };
                    self.command(request, object, target, &mut replies)
                }
            }
        }
        replies
    }

    /// Single-object monitoring ASDU carrying `reading`.
    pub fn point_asdu(&self, reading: &PointReading, cot: Cot) -> Option<Asdu> {
        let point = reading.to_data_point(self.clock.now_cp56())?;
        let mut asdu = Asdu::new(point.type_id(), cot, self.common_address);
        asdu.objects.push(point.to_information_object());
        Some(asdu)
    }

    /// Confirmation mirroring one object of `request`.
    fn confirm(
        &self,
        request: &Asdu,
        object: &InformationObject,
        cot: Cot,
        negative: bool,
    ) -> Asdu {
        Asdu::new(request.type_id(), cot, self.common_address)
            .with_originator(request.header.originator)
            .with_negative(negative)
            .with_object(object.ioa, object.data.clone())
    }

    fn interrogation(
        &self,
        request: &Asdu,
        object: &InformationObject,
        qoi: u8,
        replies: &mut Vec<Asdu>,
    ) {
        let originator = request.header.originator;
        info!(qoi, originator, cot = %request.header.cot, "General interrogation");

        // Group requests (QOI 21-36) are answered with every point under
        // the matching group cause.
        let cot = match qoi {
            21..=36 => Cot::from_u8(qoi),
            _ => Cot::InterrogatedByStation,
        };
        if qoi != QOI_STATION {
            debug!(qoi, %cot, "Non-station interrogation qualifier");
        }

        replies.push(self.confirm(request, object, Cot::ActivationConfirm, false));

        let now = self.clock.now_cp56();
        let mut groups: Vec<(TypeId, Vec<DataPoint>)> = Vec::new();
        for reading in self.registry.read_all() {
            let Some(point) = reading.to_data_point(now) else {
                continue;
            };
            match groups.iter_mut().find(|(type_id, _)| *type_id == reading.type_id) {
                Some((_, points)) => points.push(point),
                None => groups.push((reading.type_id, vec![point])),
            }
        }

        let mut sent = 0;
        for (type_id, points) in groups {
            let batch = self.batch_size.min(type_id.max_objects_per_asdu()).max(1);
            for chunk in points.chunks(batch) {
                let mut asdu =
                    Asdu::new(type_id, cot, self.common_address).with_originator(originator);
                asdu.objects
                    .extend(chunk.iter().map(DataPoint::to_information_object));
                sent += chunk.len();
                replies.push(asdu);
            }
        }
        debug!(points = sent, "Interrogation data queued");

        replies.push(self.confirm(request, object, Cot::ActivationTermination, false));
    }

    fn clock_sync(
        &self,
        request: &Asdu,
        object: &InformationObject,
        time: Cp56Time2a,
        replies: &mut Vec<Asdu>,
    ) {
        if request.header.cot != Cot::Activation {
            warn!(cot = %request.header.cot, "Clock synchronization with unexpected cause");
            replies.push(self.confirm(request, object, Cot::UnknownCot, true));
            return;
        }

        match time.to_datetime() {
            Some(master_time) => {
                let offset = self.clock.synchronize(master_time);
                info!(%time, offset_ms = offset.num_milliseconds(), "Clock synchronized");
                replies.push(self.confirm(request, object, Cot::ActivationConfirm, false));
            }
            None => {
                warn!(%time, "Clock synchronization with invalid time");
                replies.push(self.confirm(request, object, Cot::ActivationConfirm, true));
            }
        }
    }

    fn read(&self, request: &Asdu, ioa: Ioa, replies: &mut Vec<Asdu>) {
        let Some(reading) = self.registry.read_ioa(ioa.value()) else {
            warn!(ioa = ioa.value(), "Read for unknown IOA ignored");
            return;
        };
        debug!(ioa = ioa.value(), value = reading.value, "Read");
        if let Some(asdu) = self.point_asdu(&reading, Cot::Request) {
            replies.push(asdu.with_originator(request.header.originator));
        }
    }

    fn command(
        &self,
        request: &Asdu,
        object: &InformationObject,
        target: CommandRequest,
        replies: &mut Vec<Asdu>,
    ) {
        let ioa = target.ioa.value();
        let type_id = request.type_id();

        let Some(point_type) = self.registry.get(ioa).map(|config| config.type_id) else {
            warn!(ioa, %type_id, "Command for unknown IOA ignored");
            return;
        };

        if request.header.cot != Cot::Activation {
            warn!(ioa, %type_id, cot = %request.header.cot, "Command with unexpected cause");
            replies.push(self.confirm(request, object, Cot::UnknownCot, true));
            return;
        }

        let value = match target.value {
            Some(value) if (target.accepts)(point_type) => value,
            _ => {
                warn!(ioa, %type_id, %point_type, "Command rejected");
                replies.push(self.confirm(request, object, Cot::ActivationConfirm, true));
                return;
            }
        };

        if target.select {
            info!(ioa, %type_id, value, "Command selected");
            replies.push(self.confirm(request, object, Cot::ActivationConfirm, false));
            return;
        }

        self.registry.apply_command(ioa, value);
        info!(ioa, %type_id, value, "Command executed");

        replies.push(self.confirm(request, object, Cot::ActivationConfirm, false));
        if let Some(asdu) = self
            .registry
            .read_ioa(ioa)
            .and_then(|reading| self.point_asdu(&reading, Cot::ReturnRemoteCommand))
        {
            replies.push(asdu.with_originator(request.header.originator));
        }
        replies.push(self.confirm(request, object, Cot::ActivationTermination, false));
    }
}

/// Value a double-point state carries in the registry.
pub fn double_point_value(state: DoublePointValue) -> f64 {
    f64::from(state.as_u8())
}
