// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Raw register values to semantic states.
//!
//! All code tables live here as declarative `(code, label)` slices so that
//! decoding can be checked by reading the table. Unknown codes never fail
//! and are never coerced to a default:
//!
//! | Table              | Unknown code `N` decodes to |
//! |--------------------|-----------------------------|
//! | operation mode     | `unknown_mode_N`            |
//! | ventilation level  | `unknown_level_N`           |
//! | fault / info       | `unrecognized code N`       |
//! | all other tables   | `unknown_N`                 |

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::codec::Reading;
use crate::error::{ModbusResult, ValidationError};
use crate::registers::{CodeSet, RegisterDescriptor, ValueKind};
use crate::snapshot::FieldValue;

// =============================================================================
// Code Tables
// =============================================================================

/// Operating mode labels.
pub const OPERATION_MODES: &[(u32, &str)] = &[
    (0, "off"),
    (1, "manual"),
    (2, "auto_time"),
    (3, "auto_sensor"),
    (4, "eco_supply"),
    (5, "eco_extract"),
];

/// Ventilation level labels.
pub const VENTILATION_LEVELS: &[(u32, &str)] = &[
    (0, "off"),
    (1, "humidity_protection"),
    (2, "reduced"),
    (3, "nominal"),
    (4, "intensive"),
];

/// Season labels.
pub const SEASONS: &[(u32, &str)] = &[(0, "winter"), (1, "summer")];

/// Room temperature source labels.
pub const ROOM_TEMP_SOURCES: &[(u32, &str)] = &[
    (0, "comfort_bde"),
    (1, "external"),
    (2, "internal"),
    (3, "bus"),
];

/// Brine pump / three-way damper labels.
pub const THERMAL_MODES: &[(u32, &str)] = &[(0, "off"), (1, "heating"), (2, "cooling")];

/// Zone damper labels.
pub const ZONE_DAMPERS: &[(u32, &str)] = &[
    (0, "off"),
    (1, "zone_1"),
    (2, "zone_2"),
    (3, "zone_sensor"),
];

/// Built-in fault labels.
pub const FAULT_CODES: &[(u32, &str)] = &[(0, "no_fault")];

/// Built-in info labels.
pub const INFO_CODES: &[(u32, &str)] = &[(0, "no_info")];

fn lookup(table: &[(u32, &'static str)], code: u32) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, label)| *label)
}

fn reverse(table: &[(u32, &'static str)], label: &str) -> Option<u32> {
    table.iter().find(|(_, l)| *l == label).map(|(c, _)| *c)
}

// =============================================================================
// OperationMode
// =============================================================================

/// Operating mode register (550).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Unit switched off.
    Off,
    /// Manual level selection.
    Manual,
    /// Week program.
    AutoTime,
    /// Sensor-controlled.
    AutoSensor,
    /// Supply air only.
    EcoSupply,
    /// Extract air only.
    EcoExtract,
    /// Code outside the table.
    Unknown(u16),
}

impl OperationMode {
    /// Decodes a register value.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Off,
            1 => Self::Manual,
            2 => Self::AutoTime,
            3 => Self::AutoSensor,
            4 => Self::EcoSupply,
            5 => Self::EcoExtract,
            other => Self::Unknown(other),
        }
    }

    /// Parses a published label, including `unknown_mode_N`.
    pub fn from_label(label: &str) -> Option<Self> {
        if let Some(code) = reverse(OPERATION_MODES, label) {
            return Some(Self::from_raw(code as u16));
        }
        label
            .strip_prefix("unknown_mode_")
            .and_then(|n| n.parse().ok())
            .map(Self::Unknown)
    }

    /// Register value.
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::Manual => 1,
            Self::AutoTime => 2,
            Self::AutoSensor => 3,
            Self::EcoSupply => 4,
            Self::EcoExtract => 5,
            Self::Unknown(raw) => raw,
        }
    }

    /// `None` for unknown modes; otherwise whether the unit runs.
    pub fn is_powered(self) -> Option<bool> {
        match self {
            Self::Off => Some(false),
            Self::Unknown(_) => None,
            _ => Some(true),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown_mode_{raw}"),
            known => f.write_str(lookup(OPERATION_MODES, u32::from(known.to_raw())).unwrap_or("")),
        }
    }
}

// =============================================================================
// VentilationLevel / FanLevel
// =============================================================================

/// Ventilation level registers (554, 650).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VentilationLevel {
    /// Level 0.
    Off,
    /// Level 1.
    HumidityProtection,
    /// Level 2.
    Reduced,
    /// Level 3.
    Nominal,
    /// Level 4.
    Intensive,
    /// Code outside the table.
    Unknown(u16),
}

impl VentilationLevel {
    /// Decodes a register value.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Off,
            1 => Self::HumidityProtection,
            2 => Self::Reduced,
            3 => Self::Nominal,
            4 => Self::Intensive,
            other => Self::Unknown(other),
        }
    }

    /// Parses a published label, including `unknown_level_N`.
    pub fn from_label(label: &str) -> Option<Self> {
        if let Some(code) = reverse(VENTILATION_LEVELS, label) {
            return Some(Self::from_raw(code as u16));
        }
        label
            .strip_prefix("unknown_level_")
            .and_then(|n| n.parse().ok())
            .map(Self::Unknown)
    }

    /// Register value.
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::HumidityProtection => 1,
            Self::Reduced => 2,
            Self::Nominal => 3,
            Self::Intensive => 4,
            Self::Unknown(raw) => raw,
        }
    }

    /// Discrete fan level, `None` for unknown codes.
    pub fn fan_level(self) -> Option<FanLevel> {
        match self {
            Self::Off => Some(FanLevel::Off),
            Self::HumidityProtection | Self::Reduced => Some(FanLevel::Low),
            Self::Nominal => Some(FanLevel::Medium),
            Self::Intensive => Some(FanLevel::High),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for VentilationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown_level_{raw}"),
            known => {
                f.write_str(lookup(VENTILATION_LEVELS, u32::from(known.to_raw())).unwrap_or(""))
            }
        }
    }
}

/// Four-step fan level exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanLevel {
    /// 0 %.
    Off,
    /// 33 %.
    Low,
    /// 66 %.
    Medium,
    /// 100 %.
    High,
}

impl FanLevel {
    /// All levels, ascending.
    pub const ALL: [FanLevel; 4] = [Self::Off, Self::Low, Self::Medium, Self::High];

    /// Fixed display percentage.
    pub const fn percent(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 33,
            Self::Medium => 66,
            Self::High => 100,
        }
    }

    /// Highest level whose percentage does not exceed `percent`; any
    /// non-zero request selects at least [`FanLevel::Low`].
    pub fn from_percent(percent: f64) -> ModbusResult<Self> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ValidationError::out_of_range("fan_speed", percent, 0.0, 100.0).into());
        }
        if percent == 0.0 {
            return Ok(Self::Off);
        }

        let level = Self::ALL
            .iter()
            .rev()
            .find(|level| f64::from(level.percent()) <= percent)
            .copied()
            .unwrap_or(Self::Off);
        Ok(level.max(Self::Low))
    }

    /// Ventilation level written for this fan level.
    pub const fn ventilation_level(self) -> VentilationLevel {
        match self {
            Self::Off => VentilationLevel::Off,
            Self::Low => VentilationLevel::Reduced,
            Self::Medium => VentilationLevel::Nominal,
            Self::High => VentilationLevel::Intensive,
        }
    }

    /// Lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a lower-case name.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == label)
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// StatusDecoder
// =============================================================================

/// Turns readings into [`FieldValue`]s and labels back into codes.
///
/// Fault and info tables can be extended with installation-specific
/// labels; the built-in entries always win.
#[derive(Debug, Clone, Default)]
pub struct StatusDecoder {
    fault_labels: BTreeMap<u32, String>,
    info_labels: BTreeMap<u32, String>,
}

impl StatusDecoder {
    /// Decoder with the built-in tables only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds fault labels.
    pub fn with_fault_labels(mut self, labels: impl IntoIterator<Item = (u32, String)>) -> Self {
        self.fault_labels.extend(labels);
        self
    }

    /// Adds info labels.
    pub fn with_info_labels(mut self, labels: impl IntoIterator<Item = (u32, String)>) -> Self {
        self.info_labels.extend(labels);
        self
    }

    /// Decodes one reading according to its descriptor.
    pub fn decode(&self, descriptor: &RegisterDescriptor, reading: &Reading) -> FieldValue {
        match descriptor.value {
            ValueKind::Flag => FieldValue::Bool(reading.raw & 1 == 1),
            ValueKind::Code(set) => FieldValue::State(self.label(set, reading.raw)),
            ValueKind::Unsigned | ValueKind::Signed if descriptor.scale == 1 => {
                FieldValue::Integer(reading.raw)
            }
            ValueKind::Unsigned | ValueKind::Signed => FieldValue::Number(reading.value),
        }
    }

    /// Label for a code in the given table.
    pub fn label(&self, set: CodeSet, raw: i64) -> String {
        let code = raw as u32;
        match set {
            CodeSet::OperationMode => OperationMode::from_raw(code as u16).to_string(),
            CodeSet::VentilationLevel => VentilationLevel::from_raw(code as u16).to_string(),
            CodeSet::Fault => Self::status_label(FAULT_CODES, &self.fault_labels, code),
            CodeSet::Info => Self::status_label(INFO_CODES, &self.info_labels, code),
            other => lookup(Self::table(other), code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("unknown_{code}")),
        }
    }

    /// Code for a label, used by label-valued writes.
    pub fn code_for(&self, set: CodeSet, label: &str) -> Option<u32> {
        match set {
            CodeSet::OperationMode => OperationMode::from_label(label)
                .filter(|m| !matches!(m, OperationMode::Unknown(_)))
                .map(|m| u32::from(m.to_raw())),
            CodeSet::VentilationLevel => VentilationLevel::from_label(label)
                .filter(|l| !matches!(l, VentilationLevel::Unknown(_)))
                .map(|l| u32::from(l.to_raw())),
            CodeSet::Fault | CodeSet::Info => None,
            other => reverse(Self::table(other), label),
        }
    }

    /// Known labels of a table, for error messages and listings.
    pub fn labels(&self, set: CodeSet) -> Vec<&'static str> {
        Self::table(set).iter().map(|(_, label)| *label).collect()
    }

    fn table(set: CodeSet) -> &'static [(u32, &'static str)] {
        match set {
            CodeSet::OperationMode => OPERATION_MODES,
            CodeSet::VentilationLevel => VENTILATION_LEVELS,
            CodeSet::Season => SEASONS,
            CodeSet::RoomTempSource => ROOM_TEMP_SOURCES,
            CodeSet::ThermalMode => THERMAL_MODES,
            CodeSet::ZoneDamper => ZONE_DAMPERS,
            CodeSet::Fault => FAULT_CODES,
            CodeSet::Info => INFO_CODES,
        }
    }

    fn status_label(
        builtin: &[(u32, &'static str)],
        extra: &BTreeMap<u32, String>,
        code: u32,
    ) -> String {
        lookup(builtin, code)
            .map(str::to_string)
            .or_else(|| extra.get(&code).cloned())
            .unwrap_or_else(|| format!("unrecognized code {code}"))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RegisterMap;

    fn reading(raw: i64, scale: f64) -> Reading {
        Reading {
            raw,
            value: raw as f64 / scale,
        }
    }

    #[test]
    fn test_operation_mode_table() {
        assert_eq!(OperationMode::from_raw(2), OperationMode::AutoTime);
        assert_eq!(OperationMode::from_raw(2).to_string(), "auto_time");
        assert_eq!(OperationMode::from_raw(9).to_string(), "unknown_mode_9");
        assert_eq!(OperationMode::from_label("eco_extract"), Some(OperationMode::EcoExtract));
        assert_eq!(OperationMode::from_label("unknown_mode_9"), Some(OperationMode::Unknown(9)));
        assert_eq!(OperationMode::Off.is_powered(), Some(false));
        assert_eq!(OperationMode::Unknown(7).is_powered(), None);
    }

    #[test]
    fn test_ventilation_level_to_fan_level() {
        assert_eq!(VentilationLevel::Off.fan_level(), Some(FanLevel::Off));
        assert_eq!(VentilationLevel::HumidityProtection.fan_level(), Some(FanLevel::Low));
        assert_eq!(VentilationLevel::Reduced.fan_level(), Some(FanLevel::Low));
        assert_eq!(VentilationLevel::Nominal.fan_level(), Some(FanLevel::Medium));
        assert_eq!(VentilationLevel::Intensive.fan_level(), Some(FanLevel::High));
        assert_eq!(VentilationLevel::Unknown(8).fan_level(), None);
        assert_eq!(VentilationLevel::from_raw(8).to_string(), "unknown_level_8");
    }

    #[test]
    fn test_fan_percent_boundaries() {
        assert_eq!(FanLevel::from_percent(0.0).unwrap(), FanLevel::Off);
        assert_eq!(FanLevel::from_percent(1.0).unwrap(), FanLevel::Low);
        assert_eq!(FanLevel::from_percent(33.0).unwrap(), FanLevel::Low);
        assert_eq!(FanLevel::from_percent(34.0).unwrap(), FanLevel::Low);
        assert_eq!(FanLevel::from_percent(65.0).unwrap(), FanLevel::Low);
        assert_eq!(FanLevel::from_percent(66.0).unwrap(), FanLevel::Medium);
        assert_eq!(FanLevel::from_percent(99.0).unwrap(), FanLevel::Medium);
        assert_eq!(FanLevel::from_percent(100.0).unwrap(), FanLevel::High);
        assert!(FanLevel::from_percent(101.0).is_err());
        assert!(FanLevel::from_percent(-1.0).is_err());
    }

    #[test]
    fn test_fan_level_percent_inverse() {
        for level in FanLevel::ALL {
            let percent = f64::from(level.percent());
            assert_eq!(FanLevel::from_percent(percent).unwrap(), level);
        }
    }

    #[test]
    fn test_decode_kinds() {
        let map = RegisterMap::standard().unwrap();
        let decoder = StatusDecoder::new();

        let bypass = map.descriptor("bypass_status").unwrap();
        assert_eq!(decoder.decode(bypass, &reading(1, 1.0)), FieldValue::Bool(true));

        let mode = map.descriptor("operation_mode").unwrap();
        assert_eq!(
            decoder.decode(mode, &reading(3, 1.0)),
            FieldValue::State("auto_sensor".into())
        );

        let temp = map.descriptor("supply_air_temperature").unwrap();
        assert_eq!(decoder.decode(temp, &reading(180, 10.0)), FieldValue::Number(18.0));

        let rpm = map.descriptor("supply_fan_speed").unwrap();
        assert_eq!(decoder.decode(rpm, &reading(1450, 1.0)), FieldValue::Integer(1450));
    }

    #[test]
    fn test_fault_codes() {
        let decoder = StatusDecoder::new().with_fault_labels([(17, "filter_clogged".to_string())]);
        assert_eq!(decoder.label(CodeSet::Fault, 0), "no_fault");
        assert_eq!(decoder.label(CodeSet::Fault, 17), "filter_clogged");
        assert_eq!(decoder.label(CodeSet::Fault, 70_000), "unrecognized code 70000");
        assert_eq!(decoder.label(CodeSet::Info, 0), "no_info");
    }

    #[test]
    fn test_builtin_labels_win() {
        let decoder = StatusDecoder::new().with_fault_labels([(0, "custom".to_string())]);
        assert_eq!(decoder.label(CodeSet::Fault, 0), "no_fault");
    }

    #[test]
    fn test_code_for_labels() {
        let decoder = StatusDecoder::new();
        assert_eq!(decoder.code_for(CodeSet::Season, "summer"), Some(1));
        assert_eq!(decoder.code_for(CodeSet::OperationMode, "auto_time"), Some(2));
        assert_eq!(decoder.code_for(CodeSet::OperationMode, "unknown_mode_9"), None);
        assert_eq!(decoder.code_for(CodeSet::RoomTempSource, "nowhere"), None);
        assert_eq!(decoder.label(CodeSet::ZoneDamper, 7), "unknown_7");
    }
}
