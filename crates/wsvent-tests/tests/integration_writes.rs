// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for validated writes.

use wsvent_modbus::{
    CommandValue, FanLevel, FieldValue, ModbusError, OperationMode, Unit, ValidationError,
    WriteCommand,
};
use wsvent_tests::prelude::*;

fn assert_rejected(result: Result<wsvent_modbus::WriteReceipt, ModbusError>) -> ValidationError {
    match result {
        Err(ModbusError::Validation(error)) => error,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// =============================================================================
// Numeric Writes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_write_round_trip() {
    init_test_logging();
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    let receipt = aggregator
        .write(WriteCommand::target_temperature(22.5))
        .await
        .unwrap();

    assert_eq!(receipt.name, "target_temperature");
    assert_eq!(receipt.address, addr::TARGET_TEMPERATURE);
    assert_eq!(receipt.value, 22.5);
    assert_eq!(receipt.words, vec![225]);
    assert_eq!(device.write_log(), vec![(addr::TARGET_TEMPERATURE, vec![225])]);

    let snapshot = aggregator.poll().await.unwrap().snapshot().cloned().unwrap();
    assert_eq!(snapshot.value("target_temperature"), Some(&FieldValue::Number(22.5)));
}

#[tokio::test(start_paused = true)]
async fn test_write_quantized_to_step() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    let receipt = aggregator
        .write(WriteCommand::target_temperature(21.3))
        .await
        .unwrap();

    assert_eq!(receipt.value, 21.5);
    assert_eq!(device.holding(addr::TARGET_TEMPERATURE), 215);
}

#[tokio::test(start_paused = true)]
async fn test_signed_write() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator
        .write(WriteCommand::number("room_temp_adjust", -1.5))
        .await
        .unwrap();

    assert_eq!(device.holding(addr::ROOM_TEMP_ADJUST), (-15i16) as u16);
    let snapshot = aggregator.poll().await.unwrap().snapshot().cloned().unwrap();
    assert_eq!(snapshot.number("room_temp_adjust"), Some(-1.5));
}

#[tokio::test(start_paused = true)]
async fn test_range_bounds_are_inclusive() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator.write(WriteCommand::target_temperature(18.0)).await.unwrap();
    aggregator.write(WriteCommand::target_temperature(25.0)).await.unwrap();
    assert_eq!(device.holding(addr::TARGET_TEMPERATURE), 250);
}

// =============================================================================
// Rejected Writes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_range_write_never_reaches_device() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    for value in [17.5, 25.5, f64::NAN] {
        let error = assert_rejected(
            aggregator
                .write(WriteCommand::target_temperature(value))
                .await,
        );
        assert!(error.to_string().contains("target_temperature"), "{error}");
    }

    assert_eq!(device.exchanges(), 0);
    assert_eq!(device.connects(), 0);
    assert_eq!(aggregator.connection().stats().total_requests(), 0);
    assert_eq!(device.holding(addr::TARGET_TEMPERATURE), 215);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_targets_are_rejected() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    let commands = [
        WriteCommand::number("room_temperature", 21.0),
        WriteCommand::number("no_such_register", 1.0),
        WriteCommand::new("operation_mode", CommandValue::State("turbo".to_string())),
        WriteCommand::number("operation_mode", 2.5),
        WriteCommand::new("target_temperature", CommandValue::Bool(true)),
        WriteCommand::fan_speed(101.0),
        WriteCommand::fan_speed(-1.0),
    ];
    for command in commands {
        let description = command.to_string();
        let result = aggregator.write(command).await;
        assert!(
            matches!(result, Err(ModbusError::Validation(_))),
            "{description}: {result:?}"
        );
    }

    assert_eq!(device.exchanges(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_percent_unit_on_other_target_is_rejected() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);
    let level_before = device.holding(addr::VENTILATION_LEVEL);

    let error = assert_rejected(
        aggregator
            .write(WriteCommand::number("target_temperature", 50.0).with_unit(Unit::Percent))
            .await,
    );
    assert!(error.to_string().contains("percent unit applies only to fan_speed"), "{error}");

    let error = assert_rejected(
        aggregator
            .write(WriteCommand::number("ventilation_level", 100.0).with_unit(Unit::Percent))
            .await,
    );
    assert!(error.to_string().contains("ventilation_level"), "{error}");

    assert_eq!(device.exchanges(), 0);
    assert_eq!(device.connects(), 0);
    assert!(device.write_log().is_empty());
    assert_eq!(device.holding(addr::VENTILATION_LEVEL), level_before);
    assert_eq!(device.holding(addr::TARGET_TEMPERATURE), 215);
}

#[tokio::test(start_paused = true)]
async fn test_fan_speed_with_raw_unit_is_rejected() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);
    let level_before = device.holding(addr::VENTILATION_LEVEL);

    let error = assert_rejected(
        aggregator
            .write(WriteCommand::number("fan_speed", 50.0).with_unit(Unit::Raw))
            .await,
    );
    assert!(error.to_string().contains("fan_speed"), "{error}");

    assert_eq!(device.exchanges(), 0);
    assert_eq!(aggregator.connection().stats().total_requests(), 0);
    assert_eq!(device.holding(addr::VENTILATION_LEVEL), level_before);
}

// =============================================================================
// Label, Flag and Fan Writes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_label_and_flag_writes() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator
        .write(WriteCommand::operation_mode(OperationMode::AutoTime))
        .await
        .unwrap();
    assert_eq!(device.holding(addr::OPERATION_MODE), 2);

    aggregator.write(WriteCommand::season("summer")).await.unwrap();
    assert_eq!(device.holding(552), 1);

    aggregator.write(WriteCommand::boost(true)).await.unwrap();
    assert_eq!(device.holding(addr::BOOST), 1);

    aggregator
        .write(WriteCommand::new(
            "boost_ventilation",
            CommandValue::parse("off"),
        ))
        .await
        .unwrap();
    assert_eq!(device.holding(addr::BOOST), 0);

    let snapshot = aggregator.poll().await.unwrap().snapshot().cloned().unwrap();
    assert_eq!(
        snapshot.value("operation_mode"),
        Some(&FieldValue::State("auto_time".to_string()))
    );
    assert_eq!(snapshot.value("season"), Some(&FieldValue::State("summer".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_fan_speed_percent_mapping() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    for (percent, level) in [
        (0.0, 0),
        (1.0, 2),
        (33.0, 2),
        (50.0, 2),
        (65.9, 2),
        (66.0, 3),
        (99.0, 3),
        (100.0, 4),
    ] {
        let receipt = aggregator
            .write(WriteCommand::fan_speed(percent))
            .await
            .unwrap();
        assert_eq!(receipt.name, "ventilation_level");
        assert_eq!(device.holding(addr::VENTILATION_LEVEL), level, "{percent}%");
    }
}

#[tokio::test(start_paused = true)]
async fn test_fan_level_write_and_readback() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator
        .write(WriteCommand::fan_level(FanLevel::High))
        .await
        .unwrap();
    assert_eq!(device.holding(addr::VENTILATION_LEVEL), 4);

    aggregator
        .write(WriteCommand::new("fan_speed", CommandValue::State("low".to_string())))
        .await
        .unwrap();
    assert_eq!(device.holding(addr::VENTILATION_LEVEL), 2);
}

#[tokio::test(start_paused = true)]
async fn test_command_registers() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator.write(WriteCommand::error_reset()).await.unwrap();
    aggregator
        .write(WriteCommand::filter_change("outdoor"))
        .await
        .unwrap();

    assert_eq!(device.write_log(), vec![(405, vec![1]), (158, vec![1])]);
    assert!(assert_rejected(aggregator.write(WriteCommand::number("error_reset", 0.0)).await)
        .to_string()
        .contains("error_reset"));
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_valid_write_reaches_the_device() {
    let device = DeviceFixtures::ws320();
    let aggregator = AggregatorFixtures::standard(&device);

    let commands = vec![
        WriteCommand::target_temperature(20.0),
        WriteCommand::boost(true),
        WriteCommand::fan_speed(66.0),
        WriteCommand::number("filter_delta_p_limit", 120.0),
        WriteCommand::number("humidity_bus", 45.0),
    ];
    let count = commands.len() as u64;
    for command in commands {
        aggregator.write(command).await.unwrap();
    }

    assert_eq!(device.writes(), count);
    assert_eq!(aggregator.connection().stats().total_requests(), count);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_is_reported() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Exception(3));
    let aggregator = AggregatorFixtures::standard(&device);

    let result = aggregator.write(WriteCommand::boost(true)).await;

    assert!(matches!(result, Err(ModbusError::Protocol(_))));
    assert_eq!(device.writes(), 1);
    assert!(device.write_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_write_retried_after_timeout() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Timeout);
    let aggregator = AggregatorFixtures::standard(&device);

    aggregator.write(WriteCommand::boost(true)).await.unwrap();

    assert_eq!(device.writes(), 2);
    assert_eq!(device.write_log(), vec![(addr::BOOST, vec![1])]);
}
