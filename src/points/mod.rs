//! Simulated information objects.
//!
//! The registry is an arena of point slots with an IOA index built once at
//! startup. Configuration is immutable; the live part of each point (last
//! value, command override, quality) sits behind its own lock so sessions
//! only contend on the point they touch.

mod catalog;
mod pattern;

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Iec104Error, Result};
use crate::types::{Cp56Time2a, DataPoint, DataValue, Ioa, Quality, TypeId};

pub use catalog::{default_catalog, load_catalog, parse_catalog};
pub use pattern::{Pattern, Waveform};

fn default_period() -> f64 {
    60.0
}

/// Static description of one simulated point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointConfig {
    /// Information object address (at most 0xFFFFFF)
    pub ioa: u32,
    /// Monitoring type the point is reported as
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Human readable name, only used in logs
    #[serde(default)]
    pub name: String,
    /// Value pattern
    #[serde(default)]
    pub pattern: Pattern,
    /// Lower bound of the pattern
    #[serde(default)]
    pub min: f64,
    /// Upper bound of the pattern
    #[serde(default)]
    pub max: f64,
    /// Period in seconds
    #[serde(default = "default_period")]
    pub period: f64,
    /// Phase shift in seconds
    #[serde(default)]
    pub phase: f64,
    /// Initial quality descriptor byte
    #[serde(default)]
    pub quality: u8,
}

impl PointConfig {
    /// Create a point with a constant value of zero.
    pub fn new(ioa: u32, type_id: TypeId, name: impl Into<String>) -> Self {
        Self {
            ioa,
            type_id,
            name: name.into(),
            pattern: Pattern::Constant,
            min: 0.0,
            max: 0.0,
            period: default_period(),
            phase: 0.0,
            quality: 0,
        }
    }

    /// Set the pattern and its range.
    pub fn pattern(mut self, pattern: Pattern, min: f64, max: f64) -> Self {
        self.pattern = pattern;
        self.min = min;
        self.max = max;
        self
    }

    /// Set period and phase in seconds.
    pub fn timing(mut self, period: f64, phase: f64) -> Self {
        self.period = period;
        self.phase = phase;
        self
    }

    /// Shape parameters of the pattern.
    pub fn waveform(&self) -> Waveform {
        Waveform {
            pattern: self.pattern,
            min: self.min,
            max: self.max,
            period: self.period,
            phase: self.phase,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ioa > Ioa::MAX {
            return Err(Iec104Error::config(format!(
                "point '{}': IOA {} exceeds 24 bits",
                self.name, self.ioa
            )));
        }
        if !self.type_id.is_monitoring() {
            return Err(Iec104Error::config(format!(
                "point {}: {} is not a monitoring type",
                self.ioa, self.type_id
            )));
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(Iec104Error::config(format!(
                "point {}: invalid range [{}, {}]",
                self.ioa, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Snapshot of a point's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointReading {
    /// Information object address
    pub ioa: u32,
    /// Monitoring type
    pub type_id: TypeId,
    /// Current value
    pub value: f64,
    /// Quality descriptor
    pub quality: Quality,
}

impl PointReading {
    /// Encode the reading for its type.
    ///
    /// The time tag is only used by time-tagged types.
    pub fn to_data_point(&self, now: Cp56Time2a) -> Option<DataPoint> {
        let value = DataValue::from_f64(self.type_id, self.value)?;
        let point = DataPoint::with_quality(self.ioa, value, self.quality);
        Some(if self.type_id.has_time_tag() {
            point.with_timestamp(now)
        } else {
            point
        })
    }
}

#[derive(Debug)]
struct PointState {
    last_value: Option<f64>,
    override_value: Option<f64>,
    quality: Quality,
}

#[derive(Debug)]
struct PointSlot {
    config: PointConfig,
    state: Mutex<PointState>,
}

/// Fixed set of simulated points shared by all sessions.
#[derive(Debug)]
pub struct PointRegistry {
    slots: Vec<PointSlot>,
    index: HashMap<u32, usize>,
    started: Instant,
}

impl PointRegistry {
    /// Build a registry, rejecting duplicate or invalid points.
    pub fn new(points: Vec<PointConfig>) -> Result<Self> {
        let mut index = HashMap::with_capacity(points.len());
        let mut slots = Vec::with_capacity(points.len());

        for config in points {
            config.validate()?;
            if index.insert(config.ioa, slots.len()).is_some() {
                return Err(Iec104Error::config(format!("duplicate IOA {}", config.ioa)));
            }
            let state = PointState {
                last_value: None,
                override_value: None,
                quality: Quality::from_raw(config.quality),
            };
            slots.push(PointSlot {
                config,
                state: Mutex::new(state),
            });
        }

        Ok(Self {
            slots,
            index,
            started: Instant::now(),
        })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the registry has no points.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Point configurations in registry order.
    pub fn configs(&self) -> impl Iterator<Item = &PointConfig> + '_ {
        self.slots.iter().map(|slot| &slot.config)
    }

    /// Slot index of `ioa`.
    pub fn index_of(&self, ioa: u32) -> Option<usize> {
        self.index.get(&ioa).copied()
    }

    /// Configuration of `ioa`.
    pub fn get(&self, ioa: u32) -> Option<&PointConfig> {
        self.index_of(ioa).map(|idx| &self.slots[idx].config)
    }

    /// Seconds since the registry was created.
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Current value of the point in slot `idx`.
    pub fn read(&self, idx: usize) -> Option<PointReading> {
        self.read_at(idx, self.elapsed())
    }

    /// Value of the point in slot `idx` at `elapsed` seconds.
    pub fn read_at(&self, idx: usize, elapsed: f64) -> Option<PointReading> {
        let slot = self.slots.get(idx)?;
        let mut state = slot.state.lock();

        let value = match state.override_value {
            Some(value) => value,
            None => slot
                .config
                .waveform()
                .value_at(elapsed, state.last_value, &mut rand::thread_rng()),
        };
        state.last_value = Some(value);

        Some(PointReading {
            ioa: slot.config.ioa,
            type_id: slot.config.type_id,
            value,
            quality: state.quality,
        })
    }

    /// Current value of `ioa`.
    pub fn read_ioa(&self, ioa: u32) -> Option<PointReading> {
        self.read(self.index_of(ioa)?)
    }

    /// Current values of all points in registry order.
    pub fn read_all(&self) -> Vec<PointReading> {
        let elapsed = self.elapsed();
        (0..self.slots.len())
            .filter_map(|idx| self.read_at(idx, elapsed))
            .collect()
    }

    /// Pin `ioa` to `value`, replacing its pattern.
    ///
    /// Returns false if the IOA is unknown.
    pub fn apply_command(&self, ioa: u32, value: f64) -> bool {
        let Some(idx) = self.index_of(ioa) else {
            return false;
        };
        let mut state = self.slots[idx].state.lock();
        state.override_value = Some(value);
        state.last_value = Some(value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PointRegistry {
        PointRegistry::new(vec![
            PointConfig::new(1001, TypeId::MeasuredFloat, "voltage")
                .pattern(Pattern::Sawtooth, 0.0, 100.0)
                .timing(10.0, 0.0),
            PointConfig::new(4001, TypeId::SinglePoint, "breaker").pattern(Pattern::Square, 0.0, 1.0),
            PointConfig::new(5001, TypeId::DoublePointTime56, "isolator")
                .pattern(Pattern::Constant, 1.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert_eq!(registry.index_of(4001), Some(1));
        assert_eq!(registry.get(5001).unwrap().name, "isolator");
        assert!(registry.get(9999).is_none());

        let order: Vec<u32> = registry.configs().map(|c| c.ioa).collect();
        assert_eq!(order, vec![1001, 4001, 5001]);
    }

    #[test]
    fn test_registry_read_at() {
        let registry = registry();
        let reading = registry.read_at(0, 2.5).unwrap();
        assert_eq!(reading.ioa, 1001);
        assert_eq!(reading.type_id, TypeId::MeasuredFloat);
        assert_eq!(reading.value, 25.0);
        assert!(reading.quality.is_good());

        assert!(registry.read_at(3, 0.0).is_none());
    }

    #[test]
    fn test_registry_rejects_invalid_points() {
        let duplicate = PointRegistry::new(vec![
            PointConfig::new(1, TypeId::SinglePoint, "a"),
            PointConfig::new(1, TypeId::DoublePoint, "b"),
        ]);
        assert!(matches!(duplicate, Err(Iec104Error::Config(_))));

        let too_large = PointRegistry::new(vec![PointConfig::new(0x0100_0000, TypeId::SinglePoint, "x")]);
        assert!(too_large.is_err());

        let command = PointRegistry::new(vec![PointConfig::new(1, TypeId::SingleCommand, "x")]);
        assert!(command.is_err());

        let inverted = PointRegistry::new(vec![
            PointConfig::new(1, TypeId::MeasuredFloat, "x").pattern(Pattern::Sine, 5.0, 1.0)
        ]);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_command_override_replaces_pattern() {
        let registry = registry();
        assert!(registry.apply_command(1001, 42.0));
        assert_eq!(registry.read_at(0, 2.5).unwrap().value, 42.0);
        assert_eq!(registry.read_at(0, 7.5).unwrap().value, 42.0);

        assert!(!registry.apply_command(9999, 1.0));
    }

    #[test]
    fn test_read_all_in_registry_order() {
        let registry = registry();
        let readings = registry.read_all();
        let ioas: Vec<u32> = readings.iter().map(|r| r.ioa).collect();
        assert_eq!(ioas, vec![1001, 4001, 5001]);
    }

    #[test]
    fn test_reading_to_data_point() {
        let registry = registry();
        let now = Cp56Time2a::default();

        let point = registry.read_ioa(5001).unwrap().to_data_point(now).unwrap();
        assert_eq!(point.type_id(), TypeId::DoublePointTime56);
        assert_eq!(point.timestamp, Some(now));

        let point = registry.read_at(1, 0.0).unwrap().to_data_point(now).unwrap();
        assert_eq!(point.value, DataValue::Single(true));
        assert!(point.timestamp.is_none());
    }
}
