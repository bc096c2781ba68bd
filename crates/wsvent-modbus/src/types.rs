// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection configuration types.
//!
//! A [`ConnectionConfig`] is built once per device and stays immutable for
//! the lifetime of the [`ConnectionManager`](crate::client::ConnectionManager).
//! It bundles the transport settings (TCP or RTU), the per-request retry
//! policy, the reconnect policy and the consecutive-failure threshold.
//!
//! All types deserialize from configuration files; durations use humantime
//! strings such as `"3s"` or `"250ms"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigurationError, ModbusError};

// =============================================================================
// Defaults
// =============================================================================

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_true() -> bool {
    true
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_failure_threshold() -> u32 {
    3
}

/// Baud rates accepted by [`RtuConfig::validate`].
pub const VALID_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200,
];

// =============================================================================
// TcpConfig
// =============================================================================

/// Configuration for Modbus TCP connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Target host address.
    pub host: String,

    /// Target port (default: 502).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Unit ID / slave address (default: 1).
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Connection timeout.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Enable TCP_NODELAY.
    #[serde(default = "default_true")]
    pub tcp_nodelay: bool,
}

impl TcpConfig {
    /// Creates a configuration for `host` with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the unit id.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::invalid_host(&self.host, "host must not be empty").into());
        }
        if self.port == 0 {
            return Err(ConfigurationError::invalid_port(0, "port must be non-zero").into());
        }
        validate_unit_id(self.unit_id)?;
        validate_timeout(self.connect_timeout, "connect timeout")?;
        validate_timeout(self.timeout, "request timeout")?;
        Ok(())
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            unit_id: default_unit_id(),
            connect_timeout: default_connect_timeout(),
            timeout: default_request_timeout(),
            tcp_nodelay: true,
        }
    }
}

// =============================================================================
// RtuConfig
// =============================================================================

/// Configuration for Modbus RTU (RS-485) connections.
///
/// The defaults match the ventilation unit's factory settings: 9600 baud,
/// 8 data bits, even parity, 1 stop bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtuConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits.
    #[serde(default)]
    pub data_bits: DataBits,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Unit ID / slave address.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl RtuConfig {
    /// Creates a configuration for `port` with default settings.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Sets the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the unit id.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Short frame description, e.g. `9600 8E1`.
    pub fn frame_format(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.port.trim().is_empty() {
            return Err(ConfigurationError::missing_field("port").into());
        }
        if !VALID_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConfigurationError::InvalidBaudRate {
                baud_rate: self.baud_rate,
            }
            .into());
        }
        validate_unit_id(self.unit_id)?;
        validate_timeout(self.timeout, "request timeout")?;
        Ok(())
    }
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            unit_id: default_unit_id(),
            timeout: default_request_timeout(),
        }
    }
}

// =============================================================================
// Serial Port Settings
// =============================================================================

/// Data bits configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits (default).
    #[default]
    Eight,
}

impl DataBits {
    /// Returns the number of bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("unsupported data bits: {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        bits.bits()
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity.
    None,
    /// Odd parity.
    Odd,
    /// Even parity (default).
    #[default]
    Even,
}

impl Parity {
    /// Returns the short character representation.
    pub const fn char(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// Stop bits configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// 1 stop bit (default).
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Returns the number of stop bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("unsupported stop bits: {other}")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        bits.bits()
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// =============================================================================
// TransportConfig (Unified)
// =============================================================================

/// Transport settings for TCP or RTU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Modbus TCP.
    Tcp(TcpConfig),

    /// Modbus RTU over a serial line.
    Rtu(RtuConfig),
}

impl TransportConfig {
    /// Returns the transport kind as a lowercase string.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Rtu(_) => "rtu",
        }
    }

    /// Returns the unit ID.
    pub fn unit_id(&self) -> u8 {
        match self {
            Self::Tcp(c) => c.unit_id,
            Self::Rtu(c) => c.unit_id,
        }
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Tcp(c) => c.timeout,
            Self::Rtu(c) => c.timeout,
        }
    }

    /// Human-readable endpoint, e.g. `192.168.1.50:502` or `/dev/ttyUSB0 @ 9600 8E1`.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Tcp(c) => c.socket_addr(),
            Self::Rtu(c) => format!("{} @ {}", c.port, c.frame_format()),
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ModbusError> {
        match self {
            Self::Tcp(c) => c.validate(),
            Self::Rtu(c) => c.validate(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Tcp(TcpConfig::default())
    }
}

impl From<TcpConfig> for TransportConfig {
    fn from(config: TcpConfig) -> Self {
        Self::Tcp(config)
    }
}

impl From<RtuConfig> for TransportConfig {
    fn from(config: RtuConfig) -> Self {
        Self::Rtu(config)
    }
}

// =============================================================================
// Retry / Reconnect Policies
// =============================================================================

/// Per-request retry policy.
///
/// `attempts` counts every exchange of one logical request, the first one
/// included: with `attempts = 3` a request that keeps failing reaches the
/// transport exactly three times before the error is surfaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Exchanges per logical request.
    pub attempts: u32,

    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Random spread applied to each delay, 0.0-1.0.
    pub jitter: f64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Default::default()
        }
    }

    /// Sets the number of attempts.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the delay bounds.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validates this policy.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.attempts == 0 {
            return Err(ConfigurationError::invalid_policy("retry.attempts", "must be at least 1").into());
        }
        validate_backoff("retry", self.initial_delay, self.max_delay, self.multiplier)?;
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigurationError::invalid_policy("retry.jitter", "must be within 0.0-1.0").into());
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Backoff used when a failed link is replaced by a fresh transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the second connect attempt.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Connect attempts per reconnect cycle.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Sets the delay bounds.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Sets the attempts per reconnect cycle.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Validates this policy.
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_policy(
                "reconnect.max_attempts",
                "must be at least 1",
            )
            .into());
        }
        validate_backoff("reconnect", self.initial_delay, self.max_delay, self.multiplier)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

// =============================================================================
// ConnectionConfig
// =============================================================================

/// Everything the connection manager needs to own one device link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// TCP or RTU settings.
    pub transport: TransportConfig,

    /// Per-request retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Reconnect backoff.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Failed requests in a row the link tolerates; one more declares it failed.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl ConnectionConfig {
    /// Creates a TCP configuration with default policies.
    pub fn tcp(config: TcpConfig) -> Self {
        Self::new(TransportConfig::Tcp(config))
    }

    /// Creates an RTU configuration with default policies.
    pub fn rtu(config: RtuConfig) -> Self {
        Self::new(TransportConfig::Rtu(config))
    }

    /// Creates a configuration with default policies.
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            failure_threshold: default_failure_threshold(),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets the consecutive-failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Validates every part of this configuration.
    pub fn validate(&self) -> Result<(), ModbusError> {
        self.transport.validate()?;
        self.retry.validate()?;
        self.reconnect.validate()?;
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_policy(
                "failure_threshold",
                "must be at least 1",
            )
            .into());
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

fn validate_unit_id(unit_id: u8) -> Result<(), ModbusError> {
    if unit_id == 0 || unit_id > 247 {
        return Err(ConfigurationError::invalid_unit_id(unit_id).into());
    }
    Ok(())
}

fn validate_timeout(timeout: Duration, what: &str) -> Result<(), ModbusError> {
    if timeout.is_zero() {
        return Err(
            ConfigurationError::invalid_timeout(timeout, format!("{what} must be greater than 0"))
                .into(),
        );
    }
    Ok(())
}

fn validate_backoff(
    prefix: &str,
    initial: Duration,
    max: Duration,
    multiplier: f64,
) -> Result<(), ModbusError> {
    if initial > max {
        return Err(ConfigurationError::invalid_policy(
            format!("{prefix}.initial_delay"),
            "must not exceed max_delay",
        )
        .into());
    }
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(ConfigurationError::invalid_policy(
            format!("{prefix}.multiplier"),
            "must be a finite number >= 1.0",
        )
        .into());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
