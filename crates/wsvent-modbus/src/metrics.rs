// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Values computed from decoded fields.
//!
//! | Field                          | Source fields                                  |
//! |--------------------------------|------------------------------------------------|
//! | `power_state`                  | `operation_mode`                               |
//! | `fan_level`, `fan_speed_percent` | `current_ventilation_level`                  |
//! | `heat_recovery_efficiency`     | inlet, supply and extract air temperatures     |
//! | `heat_recovery_efficiency_raw` | same, unclamped                                |

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::snapshot::{FieldValue, SnapshotField};
use crate::status::{OperationMode, VentilationLevel};

/// Temperature spread treated as zero: half of one 0.1 °C register step.
pub const MIN_TEMPERATURE_SPREAD: f64 = 0.05;

/// Derived field names.
pub const POWER_STATE: &str = "power_state";
/// Derived field name.
pub const FAN_LEVEL: &str = "fan_level";
/// Derived field name.
pub const FAN_SPEED_PERCENT: &str = "fan_speed_percent";
/// Derived field name.
pub const HEAT_RECOVERY_EFFICIENCY: &str = "heat_recovery_efficiency";
/// Derived field name.
pub const HEAT_RECOVERY_EFFICIENCY_RAW: &str = "heat_recovery_efficiency_raw";

const INLET: &str = "inlet_air_temperature";
const SUPPLY: &str = "supply_air_temperature";
const EXTRACT: &str = "extract_air_temperature";

// =============================================================================
// Efficiency
// =============================================================================

/// Why the efficiency could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "field")]
pub enum Unavailable {
    /// An input has never been read.
    MissingInput(&'static str),
    /// An input is carried over from an earlier poll.
    StaleInput(&'static str),
    /// Extract and inlet temperatures are equal.
    ZeroSpread,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput(name) => write!(f, "{name} missing"),
            Self::StaleInput(name) => write!(f, "{name} stale"),
            Self::ZeroSpread => f.write_str("extract and inlet temperatures are equal"),
        }
    }
}

/// Heat-recovery efficiency result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Efficiency {
    /// Computed value.
    Available {
        /// Clamped to 0-100 for display.
        clamped: f64,
        /// Unclamped value for diagnostics.
        raw: f64,
    },
    /// Not computable.
    Unavailable(Unavailable),
}

impl Efficiency {
    /// Display value.
    pub fn clamped(&self) -> Option<f64> {
        match self {
            Self::Available { clamped, .. } => Some(*clamped),
            Self::Unavailable(_) => None,
        }
    }

    /// Diagnostic value.
    pub fn raw(&self) -> Option<f64> {
        match self {
            Self::Available { raw, .. } => Some(*raw),
            Self::Unavailable(_) => None,
        }
    }
}

/// `(Tsupply - Tinlet) / (Textract - Tinlet) × 100`.
pub fn heat_recovery_efficiency(inlet: f64, supply: f64, extract: f64) -> Efficiency {
    let spread = extract - inlet;
    if !spread.is_finite() || spread.abs() < MIN_TEMPERATURE_SPREAD {
        return Efficiency::Unavailable(Unavailable::ZeroSpread);
    }

    let raw = (supply - inlet) / spread * 100.0;
    if !raw.is_finite() {
        return Efficiency::Unavailable(Unavailable::ZeroSpread);
    }
    Efficiency::Available {
        clamped: raw.clamp(0.0, 100.0),
        raw,
    }
}

// =============================================================================
// DerivedMetrics
// =============================================================================

/// Computes derived fields from a field set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedMetrics;

impl DerivedMetrics {
    /// Efficiency from decoded temperature fields, honouring staleness.
    pub fn efficiency(fields: &BTreeMap<String, SnapshotField>) -> Efficiency {
        let mut temperatures = [0.0; 3];
        for (slot, name) in temperatures.iter_mut().zip([INLET, SUPPLY, EXTRACT]) {
            match fields.get(name) {
                Some(field) if field.stale => {
                    return Efficiency::Unavailable(Unavailable::StaleInput(name))
                }
                Some(field) => match field.value.as_f64() {
                    Some(value) => *slot = value,
                    None => return Efficiency::Unavailable(Unavailable::MissingInput(name)),
                },
                None => return Efficiency::Unavailable(Unavailable::MissingInput(name)),
            }
        }
        let [inlet, supply, extract] = temperatures;
        heat_recovery_efficiency(inlet, supply, extract)
    }

    /// All derived fields. Derived values inherit timestamp and staleness
    /// from their source field; a missing source leaves the field out,
    /// except for the efficiency which is always present.
    pub fn derive(
        fields: &BTreeMap<String, SnapshotField>,
        now: DateTime<Utc>,
    ) -> Vec<(&'static str, SnapshotField)> {
        let mut derived = Vec::with_capacity(5);

        if let Some(source) = fields.get("operation_mode") {
            let power = source
                .value
                .as_state()
                .and_then(OperationMode::from_label)
                .and_then(OperationMode::is_powered)
                .map_or(FieldValue::Unavailable, FieldValue::Bool);
            derived.push((POWER_STATE, inherit(source, power)));
        }

        if let Some(source) = fields.get("current_ventilation_level") {
            let level = source
                .value
                .as_state()
                .and_then(VentilationLevel::from_label)
                .and_then(VentilationLevel::fan_level);
            let (name, percent) = match level {
                Some(level) => (
                    FieldValue::State(level.as_str().to_string()),
                    FieldValue::Integer(i64::from(level.percent())),
                ),
                None => (FieldValue::Unavailable, FieldValue::Unavailable),
            };
            derived.push((FAN_LEVEL, inherit(source, name)));
            derived.push((FAN_SPEED_PERCENT, inherit(source, percent)));
        }

        let (clamped, raw) = match Self::efficiency(fields) {
            Efficiency::Available { clamped, raw } => {
                (FieldValue::Number(clamped), FieldValue::Number(raw))
            }
            Efficiency::Unavailable(reason) => {
                tracing::trace!(%reason, "Heat recovery efficiency unavailable");
                (FieldValue::Unavailable, FieldValue::Unavailable)
            }
        };
        derived.push((HEAT_RECOVERY_EFFICIENCY, SnapshotField::fresh(clamped, now)));
        derived.push((HEAT_RECOVERY_EFFICIENCY_RAW, SnapshotField::fresh(raw, now)));

        derived
    }
}

fn inherit(source: &SnapshotField, value: FieldValue) -> SnapshotField {
    SnapshotField {
        value,
        updated_at: source.updated_at,
        stale: source.stale,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, FieldValue, bool)]) -> BTreeMap<String, SnapshotField> {
        let now = Utc::now();
        entries
            .iter()
            .map(|(name, value, stale)| {
                (
                    name.to_string(),
                    SnapshotField {
                        value: value.clone(),
                        updated_at: now,
                        stale: *stale,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_efficiency_reference_value() {
        let result = heat_recovery_efficiency(5.0, 18.0, 21.0);
        assert_eq!(result.clamped(), Some(81.25));
        assert_eq!(result.raw(), Some(81.25));
    }

    #[test]
    fn test_efficiency_zero_denominator() {
        let result = heat_recovery_efficiency(20.0, 18.0, 20.0);
        assert_eq!(result, Efficiency::Unavailable(Unavailable::ZeroSpread));
        assert_eq!(result.clamped(), None);
    }

    #[test]
    fn test_efficiency_clamped_keeps_raw() {
        let result = heat_recovery_efficiency(5.0, 25.0, 21.0);
        assert_eq!(result.clamped(), Some(100.0));
        assert_eq!(result.raw(), Some(125.0));
    }

    #[test]
    fn test_efficiency_from_fields() {
        let f = fields(&[
            (INLET, FieldValue::Number(5.0), false),
            (SUPPLY, FieldValue::Number(18.0), false),
            (EXTRACT, FieldValue::Number(21.0), false),
        ]);
        assert_eq!(DerivedMetrics::efficiency(&f).clamped(), Some(81.25));
    }

    #[test]
    fn test_efficiency_stale_input() {
        let f = fields(&[
            (INLET, FieldValue::Number(5.0), false),
            (SUPPLY, FieldValue::Number(18.0), true),
            (EXTRACT, FieldValue::Number(21.0), false),
        ]);
        assert_eq!(
            DerivedMetrics::efficiency(&f),
            Efficiency::Unavailable(Unavailable::StaleInput(SUPPLY))
        );
    }

    #[test]
    fn test_efficiency_missing_input() {
        let f = fields(&[(INLET, FieldValue::Number(5.0), false)]);
        assert_eq!(
            DerivedMetrics::efficiency(&f),
            Efficiency::Unavailable(Unavailable::MissingInput(SUPPLY))
        );
    }

    #[test]
    fn test_derive_power_and_fan() {
        let f = fields(&[
            ("operation_mode", FieldValue::State("manual".into()), false),
            ("current_ventilation_level", FieldValue::State("nominal".into()), true),
        ]);
        let derived: BTreeMap<_, _> = DerivedMetrics::derive(&f, Utc::now()).into_iter().collect();

        assert_eq!(derived[POWER_STATE].value, FieldValue::Bool(true));
        assert_eq!(derived[FAN_LEVEL].value, FieldValue::State("medium".into()));
        assert_eq!(derived[FAN_SPEED_PERCENT].value, FieldValue::Integer(66));
        assert!(derived[FAN_LEVEL].stale);
        assert!(derived[HEAT_RECOVERY_EFFICIENCY].value.is_unavailable());
        assert!(derived[HEAT_RECOVERY_EFFICIENCY_RAW].value.is_unavailable());
    }

    #[test]
    fn test_derive_unknown_mode() {
        let f = fields(&[("operation_mode", FieldValue::State("unknown_mode_9".into()), false)]);
        let derived: BTreeMap<_, _> = DerivedMetrics::derive(&f, Utc::now()).into_iter().collect();
        assert!(derived[POWER_STATE].value.is_unavailable());
        assert!(!derived.contains_key(FAN_LEVEL));
    }
}
