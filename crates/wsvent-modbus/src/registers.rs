// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register map of the ventilation unit.
//!
//! The table in [`STANDARD_REGISTERS`] is the protocol contract with the
//! hardware. Reader and writer both resolve logical names through the same
//! [`RegisterMap`], so the two can never disagree about an address, width or
//! scale.
//!
//! Scale is stored as a divisor: a temperature register holding `215` with
//! `scale = 10` means 21.5 °C.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{ConfigurationError, ModbusError, ModbusResult, ValidationError};

/// Maximum registers per FC03 request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

// =============================================================================
// Descriptor Attributes
// =============================================================================

/// Access mode of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Readable only.
    ReadOnly,
    /// Writable only (command registers).
    WriteOnly,
    /// Readable and writable.
    ReadWrite,
}

impl Access {
    /// Returns `true` if reads are permitted.
    pub const fn is_readable(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Returns `true` if writes are permitted.
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    /// Short notation (`ro`, `wo`, `rw`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::WriteOnly => "wo",
            Self::ReadWrite => "rw",
        }
    }
}

/// Code tables understood by the status decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSet {
    /// Operating mode (off, manual, auto...).
    OperationMode,
    /// Ventilation level 0-4.
    VentilationLevel,
    /// Winter / summer.
    Season,
    /// Room temperature sensor source.
    RoomTempSource,
    /// Brine pump and 3-way damper mode.
    ThermalMode,
    /// Zone damper position.
    ZoneDamper,
    /// 32-bit fault code.
    Fault,
    /// 32-bit info code.
    Info,
}

/// How raw words are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "table")]
pub enum ValueKind {
    /// Unsigned integer.
    Unsigned,
    /// Two's complement signed integer.
    Signed,
    /// Single-bit flag (bit 0).
    Flag,
    /// Enumerated code looked up in a table.
    Code(CodeSet),
}

impl ValueKind {
    /// Short notation for listings.
    pub fn label(&self) -> String {
        match self {
            Self::Unsigned => "unsigned".to_string(),
            Self::Signed => "signed".to_string(),
            Self::Flag => "flag".to_string(),
            Self::Code(set) => format!("code:{set:?}"),
        }
    }
}

/// Inclusive writable range in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ValueRange {
    /// Returns `true` if `value` lies within the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

// =============================================================================
// RegisterDescriptor
// =============================================================================

/// Static description of one logical register.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegisterDescriptor {
    /// Stable logical name.
    pub name: &'static str,
    /// Protocol address of the first word.
    pub address: u16,
    /// Word count (1 or 2).
    pub words: u16,
    /// Access mode.
    pub access: Access,
    /// Raw value interpretation.
    pub value: ValueKind,
    /// Divisor from raw to physical units.
    pub scale: u16,
    /// Writable range in physical units.
    pub range: Option<ValueRange>,
    /// Write quantization step in physical units.
    pub step: Option<f64>,
    /// Display unit.
    pub unit: Option<&'static str>,
}

impl RegisterDescriptor {
    const fn base(name: &'static str, address: u16, access: Access, value: ValueKind) -> Self {
        Self {
            name,
            address,
            words: 1,
            access,
            value,
            scale: 1,
            range: None,
            step: None,
            unit: None,
        }
    }

    /// Read-only register.
    pub const fn ro(name: &'static str, address: u16, value: ValueKind) -> Self {
        Self::base(name, address, Access::ReadOnly, value)
    }

    /// Read-write register with an inclusive range.
    pub const fn rw(name: &'static str, address: u16, value: ValueKind, min: f64, max: f64) -> Self {
        Self::base(name, address, Access::ReadWrite, value).range(min, max)
    }

    /// Write-only register with an inclusive range.
    pub const fn wo(name: &'static str, address: u16, min: f64, max: f64) -> Self {
        Self::base(name, address, Access::WriteOnly, ValueKind::Unsigned).range(min, max)
    }

    /// Sets the word count.
    pub const fn words(mut self, words: u16) -> Self {
        self.words = words;
        self
    }

    /// Sets the divisor.
    pub const fn scaled(mut self, scale: u16) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the writable range.
    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange { min, max });
        self
    }

    /// Sets the write quantization step.
    pub const fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the display unit.
    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Address one past the last word.
    pub const fn end_address(&self) -> u32 {
        self.address as u32 + self.words as u32
    }

    /// Returns `true` if the value is signed.
    pub const fn is_signed(&self) -> bool {
        matches!(self.value, ValueKind::Signed)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let fail = |reason: &str| {
            ConfigurationError::invalid_register_map(format!("'{}': {}", self.name, reason))
        };

        if self.name.is_empty() {
            return Err(ConfigurationError::invalid_register_map(format!(
                "register at address {} has an empty name",
                self.address
            )));
        }
        if !(1..=2).contains(&self.words) {
            return Err(fail("word count must be 1 or 2"));
        }
        if self.end_address() > u16::MAX as u32 + 1 {
            return Err(fail("address range exceeds the register space"));
        }
        if self.scale == 0 {
            return Err(fail("scale must be non-zero"));
        }
        if matches!(self.value, ValueKind::Flag) && self.words != 1 {
            return Err(fail("flags occupy exactly one word"));
        }
        if self.access.is_writable() {
            match self.range {
                None => return Err(fail("writable registers need a valid range")),
                Some(r) if !(r.min.is_finite() && r.max.is_finite()) || r.min > r.max => {
                    return Err(fail("range bounds must be finite with min <= max"))
                }
                Some(_) => {}
            }
        }
        if let Some(step) = self.step {
            if !step.is_finite() || step <= 0.0 {
                return Err(fail("step must be positive"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Standard Table
// =============================================================================

use CodeSet as C;
use ValueKind::{Code, Flag, Signed, Unsigned};

/// Register table of the WS ventilation unit family.
pub const STANDARD_REGISTERS: &[RegisterDescriptor] = &[
    // Sensor selection
    RegisterDescriptor::rw("room_temp_selection", 109, Code(C::RoomTempSource), 0.0, 3.0),
    // Filter and volume flow settings
    RegisterDescriptor::rw("filter_device_months", 150, Unsigned, 3.0, 12.0).unit("months"),
    RegisterDescriptor::rw("filter_outdoor_months", 151, Unsigned, 3.0, 18.0).unit("months"),
    RegisterDescriptor::rw("filter_room_months", 152, Unsigned, 1.0, 6.0).unit("months"),
    RegisterDescriptor::ro("filter_duration", 153, Unsigned).unit("min"),
    RegisterDescriptor::ro("volume_flow_reduced", 154, Unsigned).unit("m³/h"),
    RegisterDescriptor::ro("volume_flow_normal", 155, Unsigned).unit("m³/h"),
    RegisterDescriptor::ro("volume_flow_intensive", 156, Unsigned).unit("m³/h"),
    RegisterDescriptor::wo("filter_change_device", 157, 1.0, 1.0),
    RegisterDescriptor::wo("filter_change_outdoor", 158, 1.0, 1.0),
    RegisterDescriptor::wo("filter_change_room", 159, 1.0, 1.0),
    // Temperature settings
    RegisterDescriptor::rw("room_temp_adjust", 300, Signed, -3.0, 3.0).scaled(10).unit("°C"),
    RegisterDescriptor::rw("supply_temp_min_cool", 301, Unsigned, 8.0, 29.0).unit("°C"),
    RegisterDescriptor::rw("room_temp_max", 302, Unsigned, 18.0, 30.0)
        .scaled(10)
        .step(0.5)
        .unit("°C"),
    // Faults and info messages
    RegisterDescriptor::ro("fault_status", 401, Code(C::Fault)).words(2),
    RegisterDescriptor::ro("info_status", 403, Code(C::Info)).words(2),
    RegisterDescriptor::wo("error_reset", 405, 1.0, 1.0),
    // Operation
    RegisterDescriptor::rw("operation_mode", 550, Code(C::OperationMode), 0.0, 5.0),
    RegisterDescriptor::rw("boost_ventilation", 551, Flag, 0.0, 1.0),
    RegisterDescriptor::rw("season", 552, Code(C::Season), 0.0, 1.0),
    RegisterDescriptor::rw("target_temperature", 553, Unsigned, 18.0, 25.0)
        .scaled(10)
        .step(0.5)
        .unit("°C"),
    RegisterDescriptor::rw("ventilation_level", 554, Code(C::VentilationLevel), 0.0, 4.0),
    // Fans and filters
    RegisterDescriptor::ro("current_ventilation_level", 650, Code(C::VentilationLevel)),
    RegisterDescriptor::ro("supply_fan_speed", 651, Unsigned).unit("rpm"),
    RegisterDescriptor::ro("extract_fan_speed", 652, Unsigned).unit("rpm"),
    RegisterDescriptor::ro("current_supply_volume_flow", 653, Unsigned).unit("m³/h"),
    RegisterDescriptor::ro("current_extract_volume_flow", 654, Unsigned).unit("m³/h"),
    RegisterDescriptor::ro("filter_device_days", 655, Unsigned).unit("d"),
    RegisterDescriptor::ro("filter_outdoor_days", 656, Unsigned).unit("d"),
    RegisterDescriptor::ro("filter_room_days", 657, Unsigned).unit("d"),
    // Temperatures
    RegisterDescriptor::ro("room_temperature", 700, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::rw("room_temperature_ext", 701, Signed, 0.0, 40.0).scaled(10).unit("°C"),
    RegisterDescriptor::ro("before_ewt_temperature", 702, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::ro("inlet_air_temperature", 703, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::ro("supply_air_temperature", 704, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::ro("extract_air_temperature", 705, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::ro("exhaust_air_temperature", 706, Signed).scaled(10).unit("°C"),
    RegisterDescriptor::rw("room_temperature_bus", 707, Signed, 0.0, 40.0).scaled(10).unit("°C"),
    // Air quality
    RegisterDescriptor::ro("extract_air_humidity", 750, Unsigned).unit("%"),
    RegisterDescriptor::ro("humidity_sensor_1", 751, Unsigned).unit("%"),
    RegisterDescriptor::ro("humidity_sensor_2", 752, Unsigned).unit("%"),
    RegisterDescriptor::ro("humidity_sensor_3", 753, Unsigned).unit("%"),
    RegisterDescriptor::ro("humidity_sensor_4", 754, Unsigned).unit("%"),
    RegisterDescriptor::ro("co2_sensor_1", 755, Unsigned).scaled(10).unit("ppm"),
    RegisterDescriptor::ro("co2_sensor_2", 756, Unsigned).scaled(10).unit("ppm"),
    RegisterDescriptor::ro("co2_sensor_3", 757, Unsigned).scaled(10).unit("ppm"),
    RegisterDescriptor::ro("co2_sensor_4", 758, Unsigned).scaled(10).unit("ppm"),
    RegisterDescriptor::ro("voc_sensor_1", 759, Unsigned).scaled(10),
    RegisterDescriptor::ro("voc_sensor_2", 760, Unsigned).scaled(10),
    RegisterDescriptor::ro("voc_sensor_3", 761, Unsigned).scaled(10),
    RegisterDescriptor::ro("voc_sensor_4", 762, Unsigned).scaled(10),
    RegisterDescriptor::rw("humidity_bus", 763, Unsigned, 0.0, 100.0).unit("%"),
    RegisterDescriptor::rw("air_quality_bus", 764, Unsigned, 0.0, 5000.0).unit("ppm"),
    // Switch states
    RegisterDescriptor::ro("supply_fan_state", 800, Flag),
    RegisterDescriptor::ro("extract_fan_state", 801, Flag),
    RegisterDescriptor::ro("bypass_status", 802, Flag),
    RegisterDescriptor::ro("ptc_heater", 803, Flag),
    RegisterDescriptor::ro("switch_contact", 804, Flag),
    RegisterDescriptor::ro("post_heater_relay", 805, Flag),
    RegisterDescriptor::ro("brine_pump", 806, Code(C::ThermalMode)),
    RegisterDescriptor::ro("three_way_damper", 807, Code(C::ThermalMode)),
    RegisterDescriptor::ro("zone_damper", 808, Code(C::ZoneDamper)),
    // Operating hours
    RegisterDescriptor::ro("hours_humidity", 850, Unsigned).words(2).unit("h"),
    RegisterDescriptor::ro("hours_reduced", 852, Unsigned).words(2).unit("h"),
    RegisterDescriptor::ro("hours_nominal", 854, Unsigned).words(2).unit("h"),
    RegisterDescriptor::ro("hours_intensive", 856, Unsigned).words(2).unit("h"),
    RegisterDescriptor::ro("hours_total", 858, Unsigned).words(2).unit("h"),
    // Filter monitoring
    RegisterDescriptor::rw("filter_delta_p_limit", 900, Unsigned, 10.0, 200.0).unit("%"),
];

// =============================================================================
// ReadRange
// =============================================================================

/// One contiguous read request covering one or more registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRange {
    /// First address.
    pub start: u16,
    /// Word count.
    pub count: u16,
    /// Registers covered, in address order.
    pub names: Vec<&'static str>,
}

impl ReadRange {
    fn open(descriptor: &RegisterDescriptor) -> Self {
        Self {
            start: descriptor.address,
            count: descriptor.words,
            names: vec![descriptor.name],
        }
    }

    /// Address one past the last word.
    pub fn end_address(&self) -> u32 {
        self.start as u32 + self.count as u32
    }
}

impl fmt::Display for ReadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end_address())
    }
}

// =============================================================================
// RegisterMap
// =============================================================================

/// Validated, name-indexed set of register descriptors.
#[derive(Debug, Clone)]
pub struct RegisterMap {
    descriptors: Vec<RegisterDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl RegisterMap {
    /// Builds a map, rejecting duplicate names and overlapping addresses.
    pub fn new(descriptors: Vec<RegisterDescriptor>) -> ModbusResult<Self> {
        let mut by_name = HashMap::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            descriptor.validate()?;
            if by_name.insert(descriptor.name, index).is_some() {
                return Err(ConfigurationError::invalid_register_map(format!(
                    "duplicate register name '{}'",
                    descriptor.name
                ))
                .into());
            }
        }

        let mut sorted: Vec<&RegisterDescriptor> = descriptors.iter().collect();
        sorted.sort_by_key(|d| d.address);
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.end_address() > b.address as u32 {
                return Err(ConfigurationError::invalid_register_map(format!(
                    "'{}' ({}) overlaps '{}' ({})",
                    a.name, a.address, b.name, b.address
                ))
                .into());
            }
        }

        Ok(Self {
            descriptors,
            by_name,
        })
    }

    /// The register map of the WS unit family.
    pub fn standard() -> ModbusResult<Self> {
        Self::new(STANDARD_REGISTERS.to_vec())
    }

    /// Looks up a descriptor by logical name.
    pub fn descriptor(&self, name: &str) -> ModbusResult<&RegisterDescriptor> {
        self.get(name)
            .ok_or_else(|| ModbusError::unknown_register(name))
    }

    /// Looks up a descriptor by logical name.
    pub fn get(&self, name: &str) -> Option<&RegisterDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    /// Iterates over all descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.descriptors.iter()
    }

    /// Names of every readable register, in table order.
    pub fn readable_names(&self) -> Vec<&'static str> {
        self.descriptors
            .iter()
            .filter(|d| d.access.is_readable())
            .map(|d| d.name)
            .collect()
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Groups `names` into the minimal set of contiguous read requests.
    pub fn group(&self, names: &[&str]) -> ModbusResult<Vec<ReadRange>> {
        self.group_with_limit(names, MAX_REGISTERS_PER_REQUEST)
    }

    /// Groups `names` into contiguous read requests of at most `limit` words.
    ///
    /// Two registers share a request only when the second starts exactly
    /// where the first ends and the combined width stays within `limit`.
    /// Ranges come back in ascending address order.
    pub fn group_with_limit(&self, names: &[&str], limit: u16) -> ModbusResult<Vec<ReadRange>> {
        let mut seen = HashSet::with_capacity(names.len());
        let mut selected = Vec::with_capacity(names.len());

        for &name in names {
            let descriptor = self.descriptor(name)?;
            if !descriptor.access.is_readable() {
                return Err(ValidationError::write_only(name).into());
            }
            if seen.insert(descriptor.name) {
                selected.push(descriptor);
            }
        }
        selected.sort_by_key(|d| d.address);

        let mut ranges: Vec<ReadRange> = Vec::new();
        for descriptor in selected {
            match ranges.last_mut() {
                Some(current)
                    if current.end_address() == descriptor.address as u32
                        && current.count + descriptor.words <= limit =>
                {
                    current.count += descriptor.words;
                    current.names.push(descriptor.name);
                }
                _ => ranges.push(ReadRange::open(descriptor)),
            }
        }

        Ok(ranges)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_map_is_valid() {
        let map = RegisterMap::standard().unwrap();
        assert_eq!(map.len(), STANDARD_REGISTERS.len());
        assert!(!map.is_empty());
    }

    #[test]
    fn test_descriptor_lookup() {
        let map = RegisterMap::standard().unwrap();

        let supply = map.descriptor("supply_air_temperature").unwrap();
        assert_eq!(supply.address, 704);
        assert_eq!(supply.scale, 10);
        assert!(supply.is_signed());
        assert_eq!(supply.access, Access::ReadOnly);

        let err = map.descriptor("warp_drive").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_writable_registers_have_ranges() {
        for d in STANDARD_REGISTERS.iter().filter(|d| d.access.is_writable()) {
            assert!(d.range.is_some(), "{} has no range", d.name);
        }
    }

    #[test]
    fn test_readable_names_skip_command_registers() {
        let map = RegisterMap::standard().unwrap();
        let names = map.readable_names();
        assert!(!names.contains(&"error_reset"));
        assert!(!names.contains(&"filter_change_room"));
        assert!(names.contains(&"operation_mode"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = RegisterMap::new(vec![
            RegisterDescriptor::ro("a", 1, Unsigned),
            RegisterDescriptor::ro("a", 2, Unsigned),
        ]);
        assert!(matches!(result, Err(ModbusError::Configuration(_))));
    }

    #[test]
    fn test_overlapping_addresses_rejected() {
        let result = RegisterMap::new(vec![
            RegisterDescriptor::ro("wide", 10, Unsigned).words(2),
            RegisterDescriptor::ro("narrow", 11, Unsigned),
        ]);
        assert!(matches!(result, Err(ModbusError::Configuration(_))));

        let same_address = RegisterMap::new(vec![
            RegisterDescriptor::ro("a", 10, Unsigned),
            RegisterDescriptor::ro("b", 10, Unsigned),
        ]);
        assert!(same_address.is_err());
    }

    #[test]
    fn test_malformed_descriptors_rejected() {
        assert!(RegisterMap::new(vec![RegisterDescriptor::ro("w", 1, Unsigned).words(3)]).is_err());
        assert!(RegisterMap::new(vec![RegisterDescriptor::ro("s", 1, Unsigned).scaled(0)]).is_err());
        assert!(RegisterMap::new(vec![RegisterDescriptor::rw("r", 1, Unsigned, 5.0, 1.0)]).is_err());
        assert!(RegisterMap::new(vec![RegisterDescriptor::ro("f", 1, Flag).words(2)]).is_err());
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    #[test]
    fn test_group_merges_contiguous_registers() {
        let map = RegisterMap::standard().unwrap();
        let ranges = map
            .group(&["supply_air_temperature", "inlet_air_temperature", "extract_air_temperature"])
            .unwrap();

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, 703);
        assert_eq!(ranges[0].count, 3);
        assert_eq!(
            ranges[0].names,
            vec!["inlet_air_temperature", "supply_air_temperature", "extract_air_temperature"]
        );
    }

    #[test]
    fn test_group_splits_on_gaps() {
        let map = RegisterMap::standard().unwrap();
        let ranges = map
            .group(&["room_temperature", "inlet_air_temperature", "operation_mode"])
            .unwrap();

        let spans: Vec<(u16, u16)> = ranges.iter().map(|r| (r.start, r.count)).collect();
        assert_eq!(spans, vec![(550, 1), (700, 1), (703, 1)]);
    }

    #[test]
    fn test_group_handles_two_word_registers() {
        let map = RegisterMap::standard().unwrap();
        let ranges = map.group(&["hours_total", "hours_humidity", "hours_reduced"]).unwrap();

        let spans: Vec<(u16, u16)> = ranges.iter().map(|r| (r.start, r.count)).collect();
        assert_eq!(spans, vec![(850, 4), (858, 2)]);
    }

    #[test]
    fn test_group_respects_request_limit() {
        let map = RegisterMap::standard().unwrap();
        let names = ["humidity_sensor_1", "humidity_sensor_2", "humidity_sensor_3", "humidity_sensor_4"];
        let ranges = map.group_with_limit(&names, 3).unwrap();

        let spans: Vec<(u16, u16)> = ranges.iter().map(|r| (r.start, r.count)).collect();
        assert_eq!(spans, vec![(751, 3), (754, 1)]);
    }

    #[test]
    fn test_group_full_map() {
        let map = RegisterMap::standard().unwrap();
        let ranges = map.group(&map.readable_names()).unwrap();

        let starts: Vec<u16> = ranges.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![109, 150, 300, 401, 550, 650, 700, 750, 800, 850, 900]);
        let covered: usize = ranges.iter().map(|r| r.names.len()).sum();
        assert_eq!(covered, map.readable_names().len());
    }

    #[test]
    fn test_group_deduplicates_and_rejects_write_only() {
        let map = RegisterMap::standard().unwrap();
        let ranges = map.group(&["season", "season"]).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].names, vec!["season"]);

        assert!(map.group(&["error_reset"]).unwrap_err().is_validation());
    }
}
