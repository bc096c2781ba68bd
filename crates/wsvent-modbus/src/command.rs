// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Semantic write commands.
//!
//! A [`WriteCommand`] names a field and carries a value in the units a
//! consumer thinks in (degrees, labels, on/off, fan percent). It is resolved
//! to one register and one physical value before the writer sees it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModbusError, ModbusResult, ValidationError};
use crate::registers::{RegisterMap, ValueKind};
use crate::status::{FanLevel, OperationMode, StatusDecoder};

/// Virtual command target resolved to `ventilation_level`.
pub const FAN_SPEED: &str = "fan_speed";

// =============================================================================
// CommandValue / Unit
// =============================================================================

/// Requested value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    /// Physical number.
    Number(f64),
    /// On/off.
    Bool(bool),
    /// Enumerated label.
    State(String),
}

impl CommandValue {
    /// Parses command-line input: `true`/`on`, `false`/`off`, numbers, else a label.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "true" | "on" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        match input.trim().parse::<f64>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::State(input.trim().to_string()),
        }
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::State(s) => f.write_str(s),
        }
    }
}

/// Unit context of a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Physical units of the register.
    #[default]
    Raw,
    /// Fan percentage.
    Percent,
}

// =============================================================================
// WriteCommand
// =============================================================================

/// A validated-on-resolve write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCommand {
    /// Register name, or `fan_speed`.
    pub name: String,
    /// Requested value.
    pub value: CommandValue,
    /// Optional unit context.
    #[serde(default)]
    pub unit: Option<Unit>,
}

impl WriteCommand {
    /// Creates a command.
    pub fn new(name: impl Into<String>, value: CommandValue) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
        }
    }

    /// Sets the unit context.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Numeric command.
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, CommandValue::Number(value))
    }

    /// Target room temperature in °C.
    pub fn target_temperature(celsius: f64) -> Self {
        Self::number("target_temperature", celsius)
    }

    /// Operating mode.
    pub fn operation_mode(mode: OperationMode) -> Self {
        Self::new("operation_mode", CommandValue::State(mode.to_string()))
    }

    /// Boost ventilation on/off.
    pub fn boost(on: bool) -> Self {
        Self::new("boost_ventilation", CommandValue::Bool(on))
    }

    /// Season by label (`winter`, `summer`).
    pub fn season(label: impl Into<String>) -> Self {
        Self::new("season", CommandValue::State(label.into()))
    }

    /// Fan speed in percent.
    pub fn fan_speed(percent: f64) -> Self {
        Self::number(FAN_SPEED, percent).with_unit(Unit::Percent)
    }

    /// Fan level.
    pub fn fan_level(level: FanLevel) -> Self {
        Self::fan_speed(f64::from(level.percent()))
    }

    /// Acknowledges a fault.
    pub fn error_reset() -> Self {
        Self::number("error_reset", 1.0)
    }

    /// Confirms a filter change (`device`, `outdoor` or `room`).
    pub fn filter_change(filter: &str) -> Self {
        Self::number(format!("filter_change_{filter}"), 1.0)
    }

    /// Resolves to a register name and physical value.
    ///
    /// Only shape and lookup errors are reported here; range checks happen
    /// in the writer. The percent unit belongs to `fan_speed` alone.
    pub fn resolve(
        &self,
        map: &RegisterMap,
        decoder: &StatusDecoder,
    ) -> ModbusResult<(&'static str, f64)> {
        if self.name == FAN_SPEED {
            if self.unit == Some(Unit::Raw) {
                return Err(ValidationError::invalid_value(
                    FAN_SPEED,
                    "fan_speed is written in percent or as a level label",
                )
                .into());
            }
            return self.resolve_fan_speed(map);
        }
        if self.unit == Some(Unit::Percent) {
            return Err(ValidationError::invalid_value(
                self.name.as_str(),
                "percent unit applies only to fan_speed",
            )
            .into());
        }

        let descriptor = map.descriptor(&self.name)?;
        let value = match (&self.value, descriptor.value) {
            (CommandValue::Number(v), _) => *v,
            (CommandValue::Bool(on), ValueKind::Flag) => f64::from(u8::from(*on)),
            (CommandValue::State(label), ValueKind::Flag) if label == "off" => 0.0,
            (CommandValue::State(label), ValueKind::Code(set)) => {
                decoder.code_for(set, label).map(f64::from).ok_or_else(|| {
                    ModbusError::from(ValidationError::invalid_value(
                        descriptor.name,
                        format!(
                            "unknown label '{label}', expected one of {}",
                            decoder.labels(set).join(", ")
                        ),
                    ))
                })?
            }
            (other, kind) => {
                return Err(ValidationError::invalid_value(
                    descriptor.name,
                    format!("{other} is not a valid {} value", kind.label()),
                )
                .into())
            }
        };
        Ok((descriptor.name, value))
    }

    fn resolve_fan_speed(&self, map: &RegisterMap) -> ModbusResult<(&'static str, f64)> {
        let level = match &self.value {
            CommandValue::Number(percent) => FanLevel::from_percent(*percent)?,
            CommandValue::State(label) => FanLevel::from_label(label).ok_or_else(|| {
                ModbusError::from(ValidationError::invalid_value(
                    FAN_SPEED,
                    format!("unknown fan level '{label}'"),
                ))
            })?,
            CommandValue::Bool(_) => {
                return Err(
                    ValidationError::invalid_value(FAN_SPEED, "expected a percentage").into(),
                )
            }
        };

        let descriptor = map.descriptor("ventilation_level")?;
        Ok((
            descriptor.name,
            f64::from(level.ventilation_level().to_raw()),
        ))
    }
}

impl fmt::Display for WriteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)?;
        if self.unit == Some(Unit::Percent) {
            f.write_str(" %")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(command: WriteCommand) -> ModbusResult<(&'static str, f64)> {
        let map = RegisterMap::standard().unwrap();
        command.resolve(&map, &StatusDecoder::new())
    }

    #[test]
    fn test_parse_command_value() {
        assert_eq!(CommandValue::parse("21.5"), CommandValue::Number(21.5));
        assert_eq!(CommandValue::parse("on"), CommandValue::Bool(true));
        assert_eq!(CommandValue::parse("false"), CommandValue::Bool(false));
        assert_eq!(CommandValue::parse("off"), CommandValue::State("off".into()));
        assert_eq!(CommandValue::parse("auto_time"), CommandValue::State("auto_time".into()));
    }

    #[test]
    fn test_resolve_number() {
        assert_eq!(
            resolve(WriteCommand::target_temperature(21.5)).unwrap(),
            ("target_temperature", 21.5)
        );
    }

    #[test]
    fn test_resolve_label_and_flag() {
        assert_eq!(
            resolve(WriteCommand::operation_mode(OperationMode::AutoTime)).unwrap(),
            ("operation_mode", 2.0)
        );
        assert_eq!(resolve(WriteCommand::season("summer")).unwrap(), ("season", 1.0));
        assert_eq!(
            resolve(WriteCommand::boost(true)).unwrap(),
            ("boost_ventilation", 1.0)
        );
        assert_eq!(
            resolve(WriteCommand::new("boost_ventilation", CommandValue::parse("off"))).unwrap(),
            ("boost_ventilation", 0.0)
        );
    }

    #[test]
    fn test_resolve_fan_speed() {
        assert_eq!(
            resolve(WriteCommand::fan_speed(0.0)).unwrap(),
            ("ventilation_level", 0.0)
        );
        assert_eq!(
            resolve(WriteCommand::fan_speed(34.0)).unwrap(),
            ("ventilation_level", 2.0)
        );
        assert_eq!(
            resolve(WriteCommand::fan_speed(100.0)).unwrap(),
            ("ventilation_level", 4.0)
        );
        assert_eq!(
            resolve(WriteCommand::fan_level(FanLevel::Medium)).unwrap(),
            ("ventilation_level", 3.0)
        );
        assert!(resolve(WriteCommand::fan_speed(120.0)).unwrap_err().is_validation());
    }

    #[test]
    fn test_resolve_errors() {
        assert!(resolve(WriteCommand::season("spring")).unwrap_err().is_validation());
        assert!(resolve(WriteCommand::number("nonexistent", 1.0)).unwrap_err().is_validation());
        assert!(resolve(WriteCommand::new("target_temperature", CommandValue::Bool(true)))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_percent_unit_only_for_fan_speed() {
        let error = resolve(WriteCommand::number("target_temperature", 50.0).with_unit(Unit::Percent))
            .unwrap_err();
        assert!(error.is_validation());
        assert!(error.to_string().contains("target_temperature"), "{error}");
        assert!(error.to_string().contains("percent unit"), "{error}");

        assert!(
            resolve(WriteCommand::number("ventilation_level", 50.0).with_unit(Unit::Percent))
                .unwrap_err()
                .is_validation()
        );
        assert!(resolve(WriteCommand::number(FAN_SPEED, 50.0).with_unit(Unit::Raw))
            .unwrap_err()
            .is_validation());

        assert_eq!(
            resolve(WriteCommand::number("target_temperature", 21.0).with_unit(Unit::Raw)).unwrap(),
            ("target_temperature", 21.0)
        );
        assert_eq!(
            resolve(WriteCommand::new(FAN_SPEED, CommandValue::State("low".into()))).unwrap(),
            ("ventilation_level", 2.0)
        );
    }

    #[test]
    fn test_filter_change_names() {
        assert_eq!(
            resolve(WriteCommand::filter_change("outdoor")).unwrap(),
            ("filter_change_outdoor", 1.0)
        );
        assert_eq!(resolve(WriteCommand::error_reset()).unwrap(), ("error_reset", 1.0));
    }
}
