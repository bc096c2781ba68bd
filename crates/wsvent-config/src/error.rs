// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for wsvent-config.

use std::path::PathBuf;

use thiserror::Error;
use wsvent_modbus::{ConfigurationError, ModbusError};

/// Configuration-related errors.
///
/// Every variant is fatal: a configuration that fails to load or validate
/// aborts startup before any transport is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Connection settings rejected by the driver.
    #[error("Invalid connection settings: {0}")]
    Connection(#[source] ConfigurationError),

    /// Required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Unsupported configuration format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },

    /// Invalid environment variable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// The environment variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Value out of range.
    #[error("Value out of range for '{field}': {value} (expected {min}..{max})")]
    OutOfRange {
        /// The field name.
        field: String,
        /// The actual value.
        value: String,
        /// Minimum value.
        min: String,
        /// Maximum value.
        max: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an out of range error.
    pub fn out_of_range<T: std::fmt::Display>(
        field: impl Into<String>,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns a short message suitable for a terminal.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse { path, message } => {
                format!("could not parse {}: {}", path.display(), message)
            }
            ConfigError::Validation { field, message } => {
                format!("invalid setting '{}': {}", field, message)
            }
            ConfigError::Connection(error) => format!("invalid connection settings: {}", error),
            ConfigError::MissingField { field } => format!("missing setting '{}'", field),
            ConfigError::Io { path, .. } => format!("could not read {}", path.display()),
            ConfigError::FileNotFound { path } => {
                format!("configuration file {} does not exist", path.display())
            }
            ConfigError::UnsupportedFormat { format } => {
                format!("unsupported configuration format '{}' (use yaml, toml or json)", format)
            }
            ConfigError::InvalidEnvVar { name, message } => {
                format!("environment variable {}: {}", name, message)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                format!("'{}' = {} is outside {}..{}", field, value, min, max)
            }
            ConfigError::Serialization { message } => message.clone(),
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ConfigError::Io { .. } | ConfigError::FileNotFound { .. })
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::Connection(_) => "connection",
            ConfigError::MissingField { .. } => "missing_field",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::OutOfRange { .. } => "out_of_range",
            ConfigError::Serialization { .. } => "serialization",
        }
    }
}

impl From<ConfigurationError> for ConfigError {
    fn from(error: ConfigurationError) -> Self {
        Self::Connection(error)
    }
}

impl From<ModbusError> for ConfigError {
    fn from(error: ModbusError) -> Self {
        match error {
            ModbusError::Configuration(inner) => Self::Connection(inner),
            other => Self::validation("connection", other.to_string()),
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creation() {
        let error = ConfigError::validation("device.poll_interval", "too short");
        assert!(matches!(error, ConfigError::Validation { .. }));
        assert_eq!(error.error_type(), "validation");

        let error = ConfigError::missing_field("connection");
        assert_eq!(error.error_type(), "missing_field");
        assert_eq!(error.user_message(), "missing setting 'connection'");
    }

    #[test]
    fn test_driver_error_conversion() {
        let error: ConfigError = ModbusError::from(ConfigurationError::invalid_unit_id(0)).into();
        assert!(matches!(error, ConfigError::Connection(_)));
        assert!(error.to_string().contains("unit ID 0"));
    }

    #[test]
    fn test_is_io_error() {
        let error = ConfigError::io(
            "wsvent.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_io_error());
        assert!(ConfigError::file_not_found("wsvent.yaml").is_io_error());
        assert!(!ConfigError::missing_field("host").is_io_error());
    }

    #[test]
    fn test_out_of_range() {
        let error = ConfigError::out_of_range("codes.fault_labels", 70000, 0, 65535);
        assert!(error.user_message().contains("codes.fault_labels"));
    }
}
