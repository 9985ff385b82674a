//! Hazard readings, tiers, and the change events produced when a tier moves.

use std::fmt;

use serde::Serialize;

/// A single decoded sensor reading, consumed immediately by the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HazardReading {
    Smoke { detected: bool, raw_value: f64 },
    Rain { detected: bool, raw_value: f64 },
    /// `high_water_level` is the legacy override sent by older producers;
    /// `Some(true)` forces [`WaterLevel::Danger`] regardless of `raw_value`.
    WaterLevel {
        raw_value: f64,
        high_water_level: Option<bool>,
    },
}

impl HazardReading {
    /// The quantity this reading updates.
    pub fn field(&self) -> HazardField {
        match self {
            HazardReading::Smoke { .. } => HazardField::Smoke,
            HazardReading::Rain { .. } => HazardField::Rain,
            HazardReading::WaterLevel { .. } => HazardField::WaterLevel,
        }
    }

    /// The raw sensor value carried by the reading.
    pub fn raw_value(&self) -> f64 {
        match *self {
            HazardReading::Smoke { raw_value, .. }
            | HazardReading::Rain { raw_value, .. }
            | HazardReading::WaterLevel { raw_value, .. } => raw_value,
        }
    }
}

/// The monitored quantities. Each one is reconciled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardField {
    Smoke,
    Rain,
    WaterLevel,
}

/// Binary classification used by the smoke and rain detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Detection {
    #[default]
    Clear,
    Detected,
}

impl Detection {
    pub fn is_detected(self) -> bool {
        self == Detection::Detected
    }
}

impl From<bool> for Detection {
    fn from(detected: bool) -> Self {
        if detected {
            Detection::Detected
        } else {
            Detection::Clear
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detection::Clear => f.write_str("Clear"),
            Detection::Detected => f.write_str("Detected"),
        }
    }
}

/// Ordinal water-level tier, ascending in severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum WaterLevel {
    #[default]
    Low,
    Caution,
    Danger,
}

impl fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaterLevel::Low => f.write_str("Low"),
            WaterLevel::Caution => f.write_str("Caution"),
            WaterLevel::Danger => f.write_str("Danger"),
        }
    }
}

/// A classified value for any monitored quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HazardTier {
    Detection(Detection),
    WaterLevel(WaterLevel),
}

impl From<Detection> for HazardTier {
    fn from(d: Detection) -> Self {
        HazardTier::Detection(d)
    }
}

impl From<WaterLevel> for HazardTier {
    fn from(w: WaterLevel) -> Self {
        HazardTier::WaterLevel(w)
    }
}

impl fmt::Display for HazardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HazardTier::Detection(d) => d.fmt(f),
            HazardTier::WaterLevel(w) => w.fmt(f),
        }
    }
}

/// Emitted by the reconciler when a quantity moves to a different tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub field: HazardField,
    pub old_value: HazardTier,
    pub new_value: HazardTier,
    pub raw_value: f64,
}

impl ChangeEvent {
    /// Human-readable audit line for this change.
    pub fn log_message(&self) -> String {
        match self.field {
            HazardField::Smoke => format!("Smoke detector: {}", self.new_value),
            HazardField::Rain => format!("Rainfall detector: {}", self.new_value),
            HazardField::WaterLevel => {
                format!("Water level reading: {} ({})", self.raw_value, self.new_value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_levels_are_ordered_by_severity() {
        assert!(WaterLevel::Low < WaterLevel::Caution);
        assert!(WaterLevel::Caution < WaterLevel::Danger);
    }

    #[test]
    fn water_level_message_drops_trailing_zero_fraction() {
        let change = ChangeEvent {
            field: HazardField::WaterLevel,
            old_value: WaterLevel::Low.into(),
            new_value: WaterLevel::Caution.into(),
            raw_value: 260.0,
        };
        assert_eq!(change.log_message(), "Water level reading: 260 (Caution)");
    }

    #[test]
    fn detector_messages_name_the_detector() {
        let smoke = ChangeEvent {
            field: HazardField::Smoke,
            old_value: Detection::Clear.into(),
            new_value: Detection::Detected.into(),
            raw_value: 0.8,
        };
        let rain = ChangeEvent {
            field: HazardField::Rain,
            old_value: Detection::Detected.into(),
            new_value: Detection::Clear.into(),
            raw_value: 0.0,
        };
        assert_eq!(smoke.log_message(), "Smoke detector: Detected");
        assert_eq!(rain.log_message(), "Rainfall detector: Clear");
    }

    #[test]
    fn tiers_serialize_as_bare_names() {
        let json = serde_json::to_value(HazardTier::from(WaterLevel::Danger)).unwrap();
        assert_eq!(json, "Danger");
        let json = serde_json::to_value(HazardTier::from(Detection::Clear)).unwrap();
        assert_eq!(json, "Clear");
    }
}
