// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Immutable device snapshots.
//!
//! A [`DeviceSnapshot`] is built once per poll cycle and published behind an
//! `Arc`; it is never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// FieldValue
// =============================================================================

/// Decoded or derived value of one snapshot field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scaled physical value.
    Number(f64),
    /// Unscaled integer.
    Integer(i64),
    /// Flag.
    Bool(bool),
    /// Enumerated label.
    State(String),
    /// Explicitly not computable (serializes as `null`).
    Unavailable,
}

impl FieldValue {
    /// Numeric view of numbers and integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Label view.
    pub fn as_state(&self) -> Option<&str> {
        match self {
            Self::State(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for [`FieldValue::Unavailable`].
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::State(s) => f.write_str(s),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

// =============================================================================
// SnapshotField
// =============================================================================

/// `(value, timestamp, staleness)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotField {
    /// Value.
    pub value: FieldValue,
    /// When the value was last read from the device.
    pub updated_at: DateTime<Utc>,
    /// Carried over from an earlier poll because the latest read failed.
    pub stale: bool,
}

impl SnapshotField {
    /// A freshly read value.
    pub fn fresh(value: FieldValue, at: DateTime<Utc>) -> Self {
        Self {
            value,
            updated_at: at,
            stale: false,
        }
    }

    /// The same value, marked stale.
    pub fn into_stale(self) -> Self {
        Self {
            stale: true,
            ..self
        }
    }
}

// =============================================================================
// DeviceSnapshot
// =============================================================================

/// Every decoded and derived field at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Increases by one per published snapshot.
    pub sequence: u64,
    /// When the poll cycle finished.
    pub taken_at: DateTime<Utc>,
    /// Fields by name.
    pub fields: BTreeMap<String, SnapshotField>,
}

impl DeviceSnapshot {
    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&SnapshotField> {
        self.fields.get(name)
    }

    /// Value by name.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|f| &f.value)
    }

    /// Numeric value by name.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(FieldValue::as_f64)
    }

    /// Returns `true` if the field exists and is stale.
    pub fn is_stale(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.stale)
    }

    /// Names of stale fields.
    pub fn stale_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.stale)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the snapshot holds no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_serialization() {
        assert_eq!(serde_json::to_string(&FieldValue::Number(21.5)).unwrap(), "21.5");
        assert_eq!(serde_json::to_string(&FieldValue::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&FieldValue::State("auto_time".into())).unwrap(),
            "\"auto_time\""
        );
        assert_eq!(serde_json::to_string(&FieldValue::Unavailable).unwrap(), "null");
    }

    #[test]
    fn test_snapshot_accessors() {
        let now = Utc::now();
        let mut fields = BTreeMap::new();
        fields.insert(
            "room_temperature".to_string(),
            SnapshotField::fresh(FieldValue::Number(21.5), now),
        );
        fields.insert(
            "extract_air_humidity".to_string(),
            SnapshotField::fresh(FieldValue::Integer(48), now).into_stale(),
        );
        let snapshot = DeviceSnapshot {
            sequence: 1,
            taken_at: now,
            fields,
        };

        assert_eq!(snapshot.number("room_temperature"), Some(21.5));
        assert_eq!(snapshot.number("extract_air_humidity"), Some(48.0));
        assert!(snapshot.is_stale("extract_air_humidity"));
        assert!(!snapshot.is_stale("room_temperature"));
        assert!(!snapshot.is_stale("missing"));
        assert_eq!(snapshot.stale_fields(), vec!["extract_air_humidity"]);
        assert_eq!(snapshot.len(), 2);
    }
}
