//! Hazard classification.
//!
//! Pure logic, no I/O. Maps raw readings onto tiers using a
//! [`ThresholdConfig`] supplied by the caller.

use crate::error::CoreError;
use crate::hazard::{Detection, HazardReading, HazardTier, WaterLevel};

/// Default lower bound (inclusive) of the Caution tier, in raw sensor units.
pub const DEFAULT_CAUTION_MIN: f64 = 250.0;

/// Default lower bound (inclusive) of the Danger tier, in raw sensor units.
pub const DEFAULT_DANGER_MIN: f64 = 500.0;

/// Water-level cut points. Always satisfies `caution_min < danger_min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    caution_min: f64,
    danger_min: f64,
}

impl ThresholdConfig {
    /// Build a threshold configuration, rejecting non-finite or inverted cut points.
    pub fn new(caution_min: f64, danger_min: f64) -> Result<Self, CoreError> {
        if !caution_min.is_finite() || !danger_min.is_finite() {
            return Err(CoreError::Configuration(format!(
                "water level thresholds must be finite, got caution_min={caution_min}, danger_min={danger_min}"
            )));
        }
        if caution_min >= danger_min {
            return Err(CoreError::Configuration(format!(
                "caution_min ({caution_min}) must be lower than danger_min ({danger_min})"
            )));
        }
        Ok(Self {
            caution_min,
            danger_min,
        })
    }

    pub fn caution_min(&self) -> f64 {
        self.caution_min
    }

    pub fn danger_min(&self) -> f64 {
        self.danger_min
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            caution_min: DEFAULT_CAUTION_MIN,
            danger_min: DEFAULT_DANGER_MIN,
        }
    }
}

pub fn classify_smoke(detected: bool) -> Detection {
    Detection::from(detected)
}

pub fn classify_rain(detected: bool) -> Detection {
    Detection::from(detected)
}

/// Classify a raw water-level value. Boundary values belong to the higher tier.
///
/// NaN compares false against both cut points and therefore lands in `Low`.
pub fn classify_water_level(raw_value: f64, thresholds: &ThresholdConfig) -> WaterLevel {
    if raw_value >= thresholds.danger_min {
        WaterLevel::Danger
    } else if raw_value >= thresholds.caution_min {
        WaterLevel::Caution
    } else {
        WaterLevel::Low
    }
}

/// Classify any reading, honouring the legacy `high_water_level` override.
pub fn classify(reading: &HazardReading, thresholds: &ThresholdConfig) -> HazardTier {
    match *reading {
        HazardReading::Smoke { detected, .. } => classify_smoke(detected).into(),
        HazardReading::Rain { detected, .. } => classify_rain(detected).into(),
        HazardReading::WaterLevel {
            high_water_level: Some(true),
            ..
        } => WaterLevel::Danger.into(),
        HazardReading::WaterLevel { raw_value, .. } => {
            classify_water_level(raw_value, thresholds).into()
        }
    }
}
