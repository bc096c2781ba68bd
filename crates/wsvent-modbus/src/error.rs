// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Driver error types with retry classification and diagnostics.
//!
//! Every fallible driver operation returns [`ModbusError`], which groups
//! failures by how the caller is expected to react:
//!
//! ```text
//! ModbusError
//! ├── Transport      - link failures (refused, timeout, I/O); retried, then reconnect
//! ├── Protocol       - malformed frames and device exceptions; retried like transport
//! ├── Validation     - bad write value, read-only or unknown register; never retried
//! ├── Configuration  - invalid connection settings or register map; fatal at startup
//! └── ShutDown       - the connection manager no longer accepts requests
//! ```
//!
//! # Examples
//!
//! ```
//! use wsvent_modbus::error::{ModbusError, TransportError, ValidationError};
//!
//! let error = ModbusError::transport(TransportError::refused("192.168.1.50", 502));
//! assert!(error.is_retryable());
//!
//! let error = ModbusError::validation(ValidationError::read_only("supply_air_temperature"));
//! assert!(!error.is_retryable());
//! assert!(error.is_validation());
//! ```

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

// =============================================================================
// ModbusError - Main Error Type
// =============================================================================

/// The main error type for driver operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Transport-level failure (connect, I/O, timeout).
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Protocol-level failure (exception response, malformed frame).
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// A request rejected before any I/O.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration detected at construction.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The connection manager has been shut down.
    #[error("Connection manager is shut down; no new requests are accepted")]
    ShutDown,
}

impl ModbusError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a transport error.
    #[inline]
    pub fn transport(error: TransportError) -> Self {
        Self::Transport(error)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Creates a validation error.
    #[inline]
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a "not connected" transport error.
    pub fn not_connected() -> Self {
        Self::Transport(TransportError::NotConnected)
    }

    /// Creates a response timeout error.
    pub fn response_timeout(duration: Duration) -> Self {
        Self::Transport(TransportError::timeout(TimeoutKind::Response, duration))
    }

    /// Creates an exception response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception_response(function_code, exception_code))
    }

    /// Creates an unknown-register validation error.
    pub fn unknown_register(name: impl Into<String>) -> Self {
        Self::Validation(ValidationError::UnknownRegister { name: name.into() })
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if the connection manager should retry the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Protocol(e) => e.is_retryable(),
            Self::Validation(_) | Self::Configuration(_) | Self::ShutDown => false,
        }
    }

    /// Returns `true` if the failure says something about the link rather
    /// than about the request itself.
    ///
    /// Link failures count towards the consecutive-failure threshold.
    pub fn is_link_failure(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Protocol(e) => !e.is_exception(),
            _ => false,
        }
    }

    /// Returns `true` for validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Transport(e) => e.severity(),
            Self::Protocol(e) => e.severity(),
            Self::Validation(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::ShutDown => ErrorSeverity::Info,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::ShutDown => "shutdown",
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Transport(e) => e.recovery_hints(),
            Self::Protocol(e) => e.recovery_hints(),
            Self::Validation(_) => vec!["Check the register name and its writable range"],
            Self::Configuration(_) => vec!["Fix the configuration file and restart"],
            Self::ShutDown => vec![],
        }
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        match self.severity().to_tracing_level() {
            Level::ERROR => tracing::error!(
                severity = %self.severity(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                severity = %self.severity(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                severity = %self.severity(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Which exchange phase a timeout hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Opening the connection.
    Connect,
    /// Waiting for a read response.
    Read,
    /// Waiting for a write acknowledgement.
    Write,
    /// Generic response wait.
    Response,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Read => "read",
            Self::Write => "write",
            Self::Response => "response",
        };
        write!(f, "{}", s)
    }
}

/// Link-level failures for TCP and RTU transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connection refused.
    #[error("Connection refused to {host}:{port}")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}'")]
    DnsResolutionFailed {
        /// The hostname that failed to resolve.
        hostname: String,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Serial port not found (RTU).
    #[error("Serial port not found: {port}")]
    SerialPortNotFound {
        /// Port path.
        port: String,
    },

    /// Serial port access denied (RTU).
    #[error("Serial port access denied: {port}")]
    SerialPortAccessDenied {
        /// Port path.
        port: String,
    },

    /// Serial port could not be configured (RTU).
    #[error("Serial port configuration failed for '{port}': {message}")]
    SerialConfigurationFailed {
        /// Port path.
        port: String,
        /// Error message.
        message: String,
    },

    /// Connection closed by the peer or the network.
    #[error("Connection closed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// No open transport.
    #[error("Not connected to the ventilation unit")]
    NotConnected,

    /// An exchange did not complete in time.
    #[error("{kind} timed out after {duration:?}")]
    Timeout {
        /// Exchange phase.
        kind: TimeoutKind,
        /// Configured limit.
        duration: Duration,
    },

    /// Generic I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates a connection refused error.
    pub fn refused(host: impl Into<String>, port: u16) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Creates a connection refused error with source.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Creates a DNS resolution failed error.
    pub fn dns_failed(hostname: impl Into<String>) -> Self {
        Self::DnsResolutionFailed {
            hostname: hostname.into(),
            source: None,
        }
    }

    /// Creates a serial port not found error.
    pub fn serial_not_found(port: impl Into<String>) -> Self {
        Self::SerialPortNotFound { port: port.into() }
    }

    /// Creates a serial port access denied error.
    pub fn serial_access_denied(port: impl Into<String>) -> Self {
        Self::SerialPortAccessDenied { port: port.into() }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Creates a timeout error.
    pub fn timeout(kind: TimeoutKind, duration: Duration) -> Self {
        Self::Timeout { kind, duration }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// A missing or inaccessible serial device will not fix itself between
    /// attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::SerialPortNotFound { .. }
                | Self::SerialPortAccessDenied { .. }
                | Self::SerialConfigurationFailed { .. }
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Timeout { .. } | Self::Closed { .. } => {
                ErrorSeverity::Warning
            }
            Self::SerialPortAccessDenied { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Check that the ventilation unit or its Modbus gateway is powered on",
                "Verify the IP address and port",
            ],
            Self::DnsResolutionFailed { .. } => vec![
                "Verify the hostname",
                "Try using an IP address instead",
            ],
            Self::SerialPortNotFound { .. } => vec![
                "Verify the serial port path",
                "Check that the RS-485 adapter is plugged in",
            ],
            Self::SerialPortAccessDenied { .. } => vec![
                "Add the service user to the 'dialout' group",
            ],
            Self::SerialConfigurationFailed { .. } => vec![
                "Verify baud rate, parity and stop bits match the unit (default 9600 8E1)",
            ],
            Self::Timeout { .. } => vec![
                "Check wiring or network connectivity",
                "Verify the unit id matches the device setting",
                "Increase the request timeout",
            ],
            Self::Closed { .. } | Self::NotConnected | Self::Io { .. } => {
                vec!["The link will be re-established automatically"]
            }
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Self::Closed {
                reason: Some(error.to_string()),
            },
            io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => Self::NotConnected,
            _ => Self::Io {
                message: error.to_string(),
                source: error,
            },
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Modbus protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device answered with a Modbus exception.
    #[error("Modbus exception: function code {function_code:#04x}, exception {exception_code} ({exception_name})")]
    ExceptionResponse {
        /// The function code that caused the exception.
        function_code: u8,
        /// The exception code.
        exception_code: u8,
        /// Human-readable exception name.
        exception_name: String,
    },

    /// The response held fewer registers than requested.
    #[error("Short response: expected {expected} registers, got {actual}")]
    ShortResponse {
        /// Requested register count.
        expected: usize,
        /// Received register count.
        actual: usize,
    },

    /// The response did not match the request.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Error message.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an exception response error.
    pub fn exception_response(function_code: u8, exception_code: u8) -> Self {
        Self::ExceptionResponse {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code).to_string(),
        }
    }

    /// Returns the human-readable name for an exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }

    /// Creates a short response error.
    pub fn short_response(expected: usize, actual: usize) -> Self {
        Self::ShortResponse { expected, actual }
    }

    /// Creates an unexpected response error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Returns `true` for device exception responses.
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::ExceptionResponse { .. })
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Malformed replies are retried like a transport failure. Of the
    /// exception responses only "acknowledge", "busy" and the gateway codes
    /// are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExceptionResponse { exception_code, .. } => {
                matches!(exception_code, 0x05 | 0x06 | 0x0A | 0x0B)
            }
            _ => true,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ExceptionResponse { exception_code, .. } if *exception_code == 0x06 => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::ExceptionResponse { exception_code, .. } => match exception_code {
                0x02 => vec!["The register address is not implemented by this unit model"],
                0x03 => vec!["The unit rejected the value; check its documented range"],
                0x06 => vec!["The unit is busy; the request will be retried"],
                _ => vec!["Check the unit's Modbus settings"],
            },
            Self::ShortResponse { .. } | Self::UnexpectedResponse { .. } => vec![
                "Verify the unit id; another device may be answering",
                "Check RS-485 wiring and termination",
            ],
        }
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// A request rejected before any network I/O.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No register with this logical name.
    #[error("Unknown register '{name}'")]
    UnknownRegister {
        /// Requested name.
        name: String,
    },

    /// The register cannot be written.
    #[error("Register '{name}' is read-only")]
    ReadOnly {
        /// Register name.
        name: String,
    },

    /// The register cannot be read.
    #[error("Register '{name}' is write-only")]
    WriteOnly {
        /// Register name.
        name: String,
    },

    /// The value lies outside the register's writable range.
    #[error("Value {value} for '{name}' is outside {min}..={max}")]
    OutOfRange {
        /// Register name.
        name: String,
        /// Requested value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// NaN or infinity.
    #[error("Value for '{name}' is not a finite number")]
    NotFinite {
        /// Register name.
        name: String,
    },

    /// The value does not fit the register's kind.
    #[error("Invalid value for '{name}': {message}")]
    InvalidValue {
        /// Register name.
        name: String,
        /// Explanation.
        message: String,
    },
}

impl ValidationError {
    /// Creates a read-only error.
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::ReadOnly { name: name.into() }
    }

    /// Creates a write-only error.
    pub fn write_only(name: impl Into<String>) -> Self {
        Self::WriteOnly { name: name.into() }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            name: name.into(),
            value,
            min,
            max,
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings detected while constructing the driver.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid host.
    #[error("Invalid host '{host}': {reason}")]
    InvalidHost {
        /// The host value.
        host: String,
        /// Reason.
        reason: String,
    },

    /// Invalid port.
    #[error("Invalid port {port}: {reason}")]
    InvalidPort {
        /// The port value.
        port: u16,
        /// Reason.
        reason: String,
    },

    /// Invalid unit id.
    #[error("Invalid unit ID {unit_id}: must be 1-247")]
    InvalidUnitId {
        /// The unit id.
        unit_id: u8,
    },

    /// Invalid timeout.
    #[error("Invalid timeout {duration:?}: {reason}")]
    InvalidTimeout {
        /// Duration.
        duration: Duration,
        /// Reason.
        reason: String,
    },

    /// Invalid baud rate.
    #[error("Invalid baud rate {baud_rate}")]
    InvalidBaudRate {
        /// Baud rate.
        baud_rate: u32,
    },

    /// Invalid retry or reconnect policy.
    #[error("Invalid policy '{field}': {reason}")]
    InvalidPolicy {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// Malformed register map.
    #[error("Invalid register map: {message}")]
    InvalidRegisterMap {
        /// Explanation.
        message: String,
    },

    /// Missing required field.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid host error.
    pub fn invalid_host(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHost {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid port error.
    pub fn invalid_port(port: u16, reason: impl Into<String>) -> Self {
        Self::InvalidPort {
            port,
            reason: reason.into(),
        }
    }

    /// Creates an invalid unit id error.
    pub fn invalid_unit_id(unit_id: u8) -> Self {
        Self::InvalidUnitId { unit_id }
    }

    /// Creates an invalid timeout error.
    pub fn invalid_timeout(duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            duration,
            reason: reason.into(),
        }
    }

    /// Creates an invalid policy error.
    pub fn invalid_policy(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid register map error.
    pub fn invalid_register_map(message: impl Into<String>) -> Self {
        Self::InvalidRegisterMap {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with ModbusError.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// Tests
// =============================================================================
