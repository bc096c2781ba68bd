// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```yaml
//! device:
//!   name: Maico WS 320
//!   poll_interval: 30s
//!
//! connection:
//!   transport:
//!     type: tcp
//!     host: 192.168.1.50
//!     port: 502
//!     unit_id: 1
//!     timeout: 3s
//!   retry:
//!     attempts: 3
//!     initial_delay: 100ms
//!   reconnect:
//!     max_attempts: 5
//!   failure_threshold: 3
//!
//! codes:
//!   fault_labels:
//!     "12": supply_fan_fault
//!
//! logging:
//!   level: info
//!   format: text
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wsvent_modbus::device::{AggregatorOptions, MIN_POLL_INTERVAL};
use wsvent_modbus::{ConnectionConfig, StatusDecoder, TransportConfig};

use crate::error::{ConfigError, ConfigResult};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);

// =============================================================================
// WsventConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsventConfig {
    /// Device identification and polling.
    #[serde(default)]
    pub device: DeviceSettings,

    /// Transport and connection policies.
    pub connection: ConnectionConfig,

    /// Extra fault/info labels.
    #[serde(default)]
    pub codes: CodeLabels,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WsventConfig {
    /// Creates a configuration around connection settings.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            device: DeviceSettings::default(),
            connection,
            codes: CodeLabels::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.device.validate()?;
        self.connection.validate()?;
        self.codes.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Status decoder with the configured labels.
    pub fn decoder(&self) -> ConfigResult<StatusDecoder> {
        Ok(StatusDecoder::new()
            .with_fault_labels(self.codes.fault_codes()?)
            .with_info_labels(self.codes.info_codes()?))
    }

    /// Aggregator options from the device and code sections.
    pub fn aggregator_options(&self) -> ConfigResult<AggregatorOptions> {
        Ok(AggregatorOptions::default()
            .with_poll_interval(self.device.poll_interval)
            .with_decoder(self.decoder()?))
    }

    /// Short description of the configured link.
    pub fn endpoint(&self) -> String {
        self.connection.transport.endpoint()
    }

    /// `"tcp"` or `"rtu"`.
    pub fn transport_kind(&self) -> &'static str {
        match self.connection.transport {
            TransportConfig::Tcp(_) => "tcp",
            TransportConfig::Rtu(_) => "rtu",
        }
    }
}

// =============================================================================
// DeviceSettings
// =============================================================================

/// Device identification and polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSettings {
    /// Human-readable name used in logs.
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Poll period.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl DeviceSettings {
    /// Validates the device settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("device.name", "cannot be empty"));
        }
        if self.poll_interval < MIN_POLL_INTERVAL || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(ConfigError::out_of_range(
                "device.poll_interval",
                humantime::format_duration(self.poll_interval).to_string(),
                humantime::format_duration(MIN_POLL_INTERVAL).to_string(),
                humantime::format_duration(MAX_POLL_INTERVAL).to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

fn default_device_name() -> String {
    "Maico WS".to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

// =============================================================================
// CodeLabels
// =============================================================================

/// Fault and info labels added to the built-in tables.
///
/// Keys are decimal code numbers. Built-in entries take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeLabels {
    /// Fault code labels.
    #[serde(default)]
    pub fault_labels: BTreeMap<String, String>,

    /// Info code labels.
    #[serde(default)]
    pub info_labels: BTreeMap<String, String>,
}

impl CodeLabels {
    /// Validates both tables.
    pub fn validate(&self) -> ConfigResult<()> {
        self.fault_codes()?;
        self.info_codes()?;
        Ok(())
    }

    /// Parsed fault labels.
    pub fn fault_codes(&self) -> ConfigResult<Vec<(u32, String)>> {
        parse_labels("codes.fault_labels", &self.fault_labels)
    }

    /// Parsed info labels.
    pub fn info_codes(&self) -> ConfigResult<Vec<(u32, String)>> {
        parse_labels("codes.info_labels", &self.info_labels)
    }
}

fn parse_labels(field: &str, labels: &BTreeMap<String, String>) -> ConfigResult<Vec<(u32, String)>> {
    labels
        .iter()
        .map(|(code, label)| {
            let code = code.trim().parse::<u32>().map_err(|_| {
                ConfigError::validation(format!("{field}.{code}"), "key must be a code number")
            })?;
            let label = label.trim();
            if label.is_empty() {
                return Err(ConfigError::validation(
                    format!("{field}.{code}"),
                    "label cannot be empty",
                ));
            }
            Ok((code, label.to_string()))
        })
        .collect()
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
