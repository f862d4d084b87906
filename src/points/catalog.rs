//! Point catalogs: the built-in substation and YAML files.
//!
//! ```yaml
//! points:
//!   - ioa: 1001
//!     type: M_ME_NC_1
//!     name: Bus voltage L1
//!     pattern: sine
//!     min: 225.0
//!     max: 235.0
//!     period: 60
//! ```

use std::path::Path;

use serde::Deserialize;

use super::{Pattern, PointConfig};
use crate::error::{Iec104Error, Result};
use crate::types::TypeId;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Catalog {
    points: Vec<PointConfig>,
}

/// Parse a YAML catalog.
pub fn parse_catalog(content: &str) -> Result<Vec<PointConfig>> {
    let catalog: Catalog = serde_yaml::from_str(content)?;
    if catalog.points.is_empty() {
        return Err(Iec104Error::config("catalog defines no points"));
    }
    Ok(catalog.points)
}

/// Load a YAML catalog from `path`.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<PointConfig>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let points = parse_catalog(&content)?;
    tracing::info!(path = %path.display(), points = points.len(), "Loaded point catalog");
    Ok(points)
}

/// Built-in catalog of a small distribution substation.
pub fn default_catalog() -> Vec<PointConfig> {
    vec![
        // Measurements, short floating point
        PointConfig::new(1001, TypeId::MeasuredFloat, "Bus voltage L1")
            .pattern(Pattern::Sine, 225.0, 235.0)
            .timing(60.0, 0.0),
        PointConfig::new(1002, TypeId::MeasuredFloat, "Bus voltage L2")
            .pattern(Pattern::Sine, 225.0, 235.0)
            .timing(60.0, 20.0),
        PointConfig::new(1003, TypeId::MeasuredFloat, "Bus voltage L3")
            .pattern(Pattern::Sine, 225.0, 235.0)
            .timing(60.0, 40.0),
        PointConfig::new(1004, TypeId::MeasuredFloat, "Feeder current")
            .pattern(Pattern::RandomWalk, 80.0, 120.0),
        PointConfig::new(1005, TypeId::MeasuredFloat, "Active power")
            .pattern(Pattern::Sawtooth, 0.0, 500.0)
            .timing(300.0, 0.0),
        PointConfig::new(1006, TypeId::MeasuredFloat, "Frequency")
            .pattern(Pattern::RandomWalk, 49.9, 50.1),
        // Measurements, scaled and normalized
        PointConfig::new(2001, TypeId::MeasuredScaled, "Transformer temperature")
            .pattern(Pattern::Sine, 40.0, 70.0)
            .timing(600.0, 0.0),
        PointConfig::new(2002, TypeId::MeasuredScaled, "Tap position")
            .pattern(Pattern::Constant, 5.0, 5.0),
        PointConfig::new(3001, TypeId::MeasuredNormalized, "Power factor")
            .pattern(Pattern::RandomWalk, 0.85, 0.99),
        // Status
        PointConfig::new(4001, TypeId::SinglePoint, "Breaker closed")
            .pattern(Pattern::Constant, 1.0, 1.0),
        PointConfig::new(4002, TypeId::SinglePoint, "Protection trip")
            .pattern(Pattern::Square, 0.0, 1.0)
            .timing(120.0, 60.0),
        PointConfig::new(4003, TypeId::SinglePointTime56, "Door alarm")
            .pattern(Pattern::Square, 0.0, 1.0)
            .timing(90.0, 0.0),
        PointConfig::new(5001, TypeId::DoublePoint, "Disconnector position")
            .pattern(Pattern::Constant, 2.0, 2.0),
        PointConfig::new(5002, TypeId::DoublePointTime56, "Earthing switch")
            .pattern(Pattern::Constant, 1.0, 1.0),
        PointConfig::new(6001, TypeId::MeasuredFloatTime56, "Energy meter power")
            .pattern(Pattern::Sine, 100.0, 400.0)
            .timing(900.0, 0.0),
    ]
}
