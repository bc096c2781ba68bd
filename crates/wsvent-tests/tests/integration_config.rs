// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for configuration loading.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use wsvent_config::{ConfigError, ConfigLoader, LogFormat, LogLevel, WsventConfig};
use wsvent_modbus::{FieldValue, Parity, TransportConfig};
use wsvent_tests::prelude::*;

fn write_config(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("wsvent-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn loader() -> ConfigLoader {
    ConfigLoader::new().with_env_vars(false)
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_yaml_tcp() {
    let file = write_config(ConfigFixtures::yaml_tcp(), ".yaml");

    let config = loader().load(file.path()).unwrap();

    assert_eq!(config.device.name, "Living room WS 320");
    assert_eq!(config.device.poll_interval, Duration::from_secs(15));
    assert_eq!(config.transport_kind(), "tcp");
    match &config.connection.transport {
        TransportConfig::Tcp(tcp) => {
            assert_eq!(tcp.host, "192.168.1.50");
            assert_eq!(tcp.port, 502);
            assert_eq!(tcp.timeout, Duration::from_secs(2));
        }
        other => panic!("expected tcp, got {other:?}"),
    }
    assert_eq!(config.connection.retry.attempts, 3);
    assert_eq!(config.connection.failure_threshold, 3);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_toml_rtu() {
    let file = write_config(ConfigFixtures::toml_rtu(), ".toml");

    let config = loader().load(file.path()).unwrap();

    assert_eq!(config.device.name, "Attic WS 160");
    assert_eq!(config.device.poll_interval, Duration::from_secs(60));
    match &config.connection.transport {
        TransportConfig::Rtu(rtu) => {
            assert_eq!(rtu.port, "/dev/ttyUSB0");
            assert_eq!(rtu.baud_rate, 19_200);
            assert_eq!(rtu.data_bits.bits(), 8);
            assert_eq!(rtu.parity, Parity::Even);
            assert_eq!(rtu.stop_bits.bits(), 1);
            assert_eq!(rtu.unit_id, 3);
        }
        other => panic!("expected rtu, got {other:?}"),
    }
}

#[test]
fn test_load_json_uses_defaults() {
    let file = write_config(ConfigFixtures::json_minimal(), ".json");

    let config = loader().load(file.path()).unwrap();

    assert_eq!(config.device.name, "Maico WS");
    assert_eq!(config.endpoint(), "ws.local:502");
    assert_eq!(config.connection.retry.attempts, 3);
    assert_eq!(config.connection.reconnect.max_attempts, 5);
    assert!(config.codes.fault_labels.is_empty());
}

// =============================================================================
// Invalid Files
// =============================================================================

#[test]
fn test_missing_file() {
    let dir = temp_test_dir("wsvent-config");
    let result = loader().load(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn test_unsupported_extension() {
    let file = write_config(ConfigFixtures::json_minimal(), ".ini");
    let result = loader().load(file.path());
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
}

#[test]
fn test_unknown_field_rejected() {
    let file = write_config(
        r#"{ "connection": { "transport": { "type": "tcp", "host": "ws.local" } }, "polling": 5 }"#,
        ".json",
    );
    assert!(matches!(loader().load(file.path()), Err(ConfigError::Parse { .. })));
}

#[test]
fn test_invalid_values_rejected() {
    let cases = [
        ConfigFixtures::yaml_tcp().replace("poll_interval: 15s", "poll_interval: 10ms"),
        ConfigFixtures::yaml_tcp().replace("\"12\": supply_fan_fault", "twelve: supply_fan_fault"),
        ConfigFixtures::yaml_tcp().replace("unit_id: 1", "unit_id: 0"),
        ConfigFixtures::yaml_tcp().replace("host: 192.168.1.50", "host: \"\""),
    ];

    for content in cases {
        let file = write_config(&content, ".yaml");
        assert!(loader().load(file.path()).is_err(), "accepted:\n{content}");
    }
}

// =============================================================================
// Environment Overrides
// =============================================================================

#[test]
fn test_env_overrides() {
    let file = write_config(ConfigFixtures::yaml_tcp(), ".yaml");
    let mut config = loader().load(file.path()).unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
        ("WSVENT_HOST", "10.0.0.7"),
        ("WSVENT_PORT", "1502"),
        ("WSVENT_POLL_INTERVAL", "45s"),
        ("WSVENT_LOG_LEVEL", "debug"),
        ("WSVENT_BAUD_RATE", "9600"),
    ]);

    loader()
        .apply_overrides(&mut config, |name| env.get(name).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.endpoint(), "10.0.0.7:1502");
    assert_eq!(config.device.poll_interval, Duration::from_secs(45));
    assert_eq!(config.logging.level, LogLevel::Debug);
    config.validate().unwrap();
}

#[test]
fn test_invalid_env_override() {
    let mut config = WsventConfig::new(ConnectionFixtures::standard());
    let result = loader().apply_overrides(&mut config, |name| {
        (name == "WSVENT_PORT").then(|| "not-a-port".to_string())
    });
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

// =============================================================================
// Configured Device
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_configured_labels_reach_snapshots() {
    let file = write_config(ConfigFixtures::yaml_tcp(), ".yaml");
    let config = loader().load(file.path()).unwrap();
    let device = DeviceFixtures::ws320();
    device.set_u32(addr::FAULT_STATUS, 12).set_u32(403, 3);

    let aggregator = AggregatorFixtures::with(
        &device,
        &config.connection,
        config.aggregator_options().unwrap(),
    );
    assert_eq!(aggregator.poll_interval(), Duration::from_secs(15));

    let snapshot = aggregator.poll().await.unwrap().snapshot().cloned().unwrap();
    assert_eq!(
        snapshot.value("fault_status"),
        Some(&FieldValue::State("supply_fan_fault".to_string()))
    );
    assert_eq!(
        snapshot.value("info_status"),
        Some(&FieldValue::State("filter_due".to_string()))
    );
}
