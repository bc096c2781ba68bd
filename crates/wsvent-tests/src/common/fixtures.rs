// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built devices and configurations so that tests share the same
//! baseline readings.

use std::sync::Arc;
use std::time::Duration;

use wsvent_modbus::{
    AggregatorOptions, ConnectionConfig, ConnectionManager, DeviceStateAggregator, RegisterMap,
    TcpConfig,
};

use super::mocks::SimulatedDevice;

// =============================================================================
// Device Fixtures
// =============================================================================

/// Addresses of frequently used registers.
pub mod addr {
    /// `operation_mode`.
    pub const OPERATION_MODE: u16 = 550;
    /// `boost_ventilation`.
    pub const BOOST: u16 = 551;
    /// `target_temperature`.
    pub const TARGET_TEMPERATURE: u16 = 553;
    /// `ventilation_level`.
    pub const VENTILATION_LEVEL: u16 = 554;
    /// `current_ventilation_level`.
    pub const CURRENT_VENTILATION_LEVEL: u16 = 650;
    /// `room_temperature`, first of the temperature block.
    pub const ROOM_TEMPERATURE: u16 = 700;
    /// `inlet_air_temperature`.
    pub const INLET: u16 = 703;
    /// `supply_air_temperature`.
    pub const SUPPLY: u16 = 704;
    /// `extract_air_temperature`.
    pub const EXTRACT: u16 = 705;
    /// `extract_air_humidity`, first of the air quality block.
    pub const HUMIDITY: u16 = 750;
    /// `fault_status`.
    pub const FAULT_STATUS: u16 = 401;
    /// `room_temp_adjust`.
    pub const ROOM_TEMP_ADJUST: u16 = 300;
}

/// Device fixtures.
pub struct DeviceFixtures;

impl DeviceFixtures {
    /// A running WS 320 in manual mode at nominal level on a winter day:
    /// 5.0 °C outside, 18.0 °C supply, 21.0 °C extract.
    pub fn ws320() -> SimulatedDevice {
        let device = SimulatedDevice::new();
        device
            .set_holding(addr::OPERATION_MODE, 1)
            .set_holding(addr::BOOST, 0)
            .set_holding(552, 0)
            .set_holding(addr::TARGET_TEMPERATURE, 215)
            .set_holding(addr::VENTILATION_LEVEL, 3)
            .set_holding(addr::CURRENT_VENTILATION_LEVEL, 3)
            .set_holding(651, 1450)
            .set_holding(652, 1420)
            .set_holding(653, 180)
            .set_holding(654, 175)
            .set_signed(addr::ROOM_TEMPERATURE, 215)
            .set_signed(addr::INLET, 50)
            .set_signed(addr::SUPPLY, 180)
            .set_signed(addr::EXTRACT, 210)
            .set_signed(706, 85)
            .set_holding(addr::HUMIDITY, 48)
            .set_holding(800, 1)
            .set_holding(801, 1)
            .set_u32(addr::FAULT_STATUS, 0)
            .set_u32(403, 0)
            .set_u32(858, 12_345);
        device
    }
}

// =============================================================================
// Connection Fixtures
// =============================================================================

/// Connection fixtures.
pub struct ConnectionFixtures;

impl ConnectionFixtures {
    /// Default policies: 3 attempts, threshold 3, 5 reconnect attempts.
    ///
    /// Pair with `#[tokio::test(start_paused = true)]` so backoff sleeps
    /// complete instantly.
    pub fn standard() -> ConnectionConfig {
        ConnectionConfig::tcp(TcpConfig::new("ws320.test"))
    }

    /// A connection manager bound to `device`.
    pub fn manager(device: &SimulatedDevice, config: &ConnectionConfig) -> Arc<ConnectionManager> {
        Arc::new(
            ConnectionManager::with_factory(config, device.factory())
                .expect("fixture connection config is valid"),
        )
    }
}

// =============================================================================
// Aggregator Fixtures
// =============================================================================

/// Aggregator fixtures.
pub struct AggregatorFixtures;

impl AggregatorFixtures {
    /// Aggregator with standard settings.
    pub fn standard(device: &SimulatedDevice) -> DeviceStateAggregator {
        Self::with(device, &ConnectionFixtures::standard(), AggregatorOptions::default())
    }

    /// Aggregator polling every `interval`.
    pub fn polling_every(device: &SimulatedDevice, interval: Duration) -> DeviceStateAggregator {
        Self::with(
            device,
            &ConnectionFixtures::standard(),
            AggregatorOptions::default().with_poll_interval(interval),
        )
    }

    /// Aggregator with custom settings.
    pub fn with(
        device: &SimulatedDevice,
        config: &ConnectionConfig,
        options: AggregatorOptions,
    ) -> DeviceStateAggregator {
        let map = Arc::new(RegisterMap::standard().expect("standard register map is valid"));
        DeviceStateAggregator::new(ConnectionFixtures::manager(device, config), map, options)
            .expect("fixture aggregator options are valid")
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration file contents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Complete YAML configuration for a TCP gateway.
    pub fn yaml_tcp() -> &'static str {
        r#"
device:
  name: Living room WS 320
  poll_interval: 15s

connection:
  transport:
    type: tcp
    host: 192.168.1.50
    port: 502
    unit_id: 1
    timeout: 2s
  retry:
    attempts: 3
    initial_delay: 100ms
  reconnect:
    max_attempts: 5
  failure_threshold: 3

codes:
  fault_labels:
    "12": supply_fan_fault
  info_labels:
    "3": filter_due

logging:
  level: info
  format: json
"#
    }

    /// TOML configuration for an RS-485 adapter.
    pub fn toml_rtu() -> &'static str {
        r#"
[device]
name = "Attic WS 160"
poll_interval = "1m"

[connection.transport]
type = "rtu"
port = "/dev/ttyUSB0"
baud_rate = 19200
data_bits = 8
parity = "even"
stop_bits = 1
unit_id = 3
"#
    }

    /// Minimal JSON configuration.
    pub fn json_minimal() -> &'static str {
        r#"{ "connection": { "transport": { "type": "tcp", "host": "ws.local" } } }"#
    }
}
