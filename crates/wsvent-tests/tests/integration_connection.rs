// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for the connection manager.
//!
//! Time is paused in every async test, so retry and reconnect backoff
//! complete instantly while keeping their ordering.

use std::time::Duration;

use wsvent_modbus::{
    LinkState, ModbusError, Request, Response, RetryPolicy,
};
use wsvent_tests::prelude::*;

fn read(address: u16) -> Request {
    Request::read(address, 1)
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_exhausts_attempts_then_fails() {
    init_test_logging();
    let device = DeviceFixtures::ws320();
    device.fail_all(Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    let error = manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap_err();

    assert!(matches!(error, ModbusError::Transport(_)));
    assert_eq!(device.exchanges(), 3);
    assert_eq!(manager.stats().total_requests(), 1);
    assert_eq!(manager.stats().retries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recovered_within_attempts() {
    let device = DeviceFixtures::ws320();
    device.fail_next(2, Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    let response = manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();

    assert_eq!(response, Response::Registers(vec![215]));
    assert_eq!(device.exchanges(), 3);
    let health = manager.health();
    assert_eq!(health.state, LinkState::Connected);
    assert_eq!(health.consecutive_failures, 0);
    assert!(health.last_success.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Timeout);
    let config = ConnectionFixtures::standard().with_retry(RetryPolicy::no_retry());
    let manager = ConnectionFixtures::manager(&device, &config);

    assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());
    assert_eq!(device.exchanges(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exception_is_not_retried_and_not_a_link_failure() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Exception(2));
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    let error = manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap_err();

    assert!(matches!(error, ModbusError::Protocol(_)));
    assert_eq!(device.exchanges(), 1);
    let health = manager.health();
    assert_eq!(health.state, LinkState::Connected);
    assert_eq!(health.consecutive_failures, 0);
}

// =============================================================================
// Failure Threshold and Reconnect
// =============================================================================

/// Drives the link past the default threshold of three failed requests.
async fn fail_link(manager: &wsvent_modbus::ConnectionManager) {
    for _ in 0..4 {
        assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());
    }
    assert_eq!(manager.health().state, LinkState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_connected_until_threshold_exceeded() {
    let device = DeviceFixtures::ws320();
    device.fail_all(Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());
    let health = manager.health();
    assert_eq!(health.state, LinkState::Connected);
    assert_eq!(health.consecutive_failures, 1);
    assert_eq!(device.exchanges(), 3);

    for _ in 0..2 {
        assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());
    }
    let health = manager.health();
    assert_eq!(health.state, LinkState::Connected);
    assert_eq!(health.consecutive_failures, 3);
    assert_eq!(device.transports_created(), 1);

    device.heal();
    manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();
    assert_eq!(manager.health().consecutive_failures, 0);
    assert_eq!(device.transports_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_fails_link_and_next_request_reconnects() {
    init_test_logging();
    let device = DeviceFixtures::ws320();
    device.fail_all(Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());
    let mut health_rx = manager.subscribe_health();

    for _ in 0..3 {
        assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());
    }
    assert_eq!(manager.health().state, LinkState::Connected);
    assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());

    let health = manager.health();
    assert_eq!(health.state, LinkState::Failed);
    assert_eq!(health.consecutive_failures, 4);
    assert_eq!(health.reconnects, 0);
    assert_eq!(device.transports_created(), 1);
    assert!(health_rx.has_changed().unwrap());
    assert_eq!(health_rx.borrow_and_update().state, LinkState::Failed);

    device.heal();
    let response = manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();
    assert_eq!(response, Response::Registers(vec![215]));

    let health = manager.health();
    assert_eq!(health.state, LinkState::Connected);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.reconnects, 1);
    assert_eq!(device.transports_created(), 2);
    assert_eq!(manager.stats().connections(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_gives_up_after_max_attempts() {
    let device = DeviceFixtures::ws320();
    device.fail_all(Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());
    fail_link(&manager).await;
    assert_eq!(device.connects(), 1);
    let exchanges = device.exchanges();

    device.refuse_connect(true);
    let error = manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap_err();

    assert!(matches!(error, ModbusError::Transport(_)));
    assert_eq!(device.connects(), 1 + 5);
    assert_eq!(device.exchanges(), exchanges);
    assert_eq!(manager.health().state, LinkState::Failed);

    device.heal();
    manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();
    assert_eq!(manager.health().state, LinkState::Connected);
    assert_eq!(manager.health().reconnects, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_backoff_waits_between_attempts() {
    let device = DeviceFixtures::ws320();
    device.fail_all(Fault::Timeout);
    let config = ConnectionFixtures::standard().with_retry(RetryPolicy::no_retry());
    let manager = ConnectionFixtures::manager(&device, &config);
    fail_link(&manager).await;

    device.refuse_connect(true);
    let started = tokio::time::Instant::now();
    assert!(manager.execute(read(addr::ROOM_TEMPERATURE)).await.is_err());

    // 1s + 2s + 4s + 8s between five attempts, the first one immediate.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16),
        "elapsed {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_link_is_replaced_immediately() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Closed);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();

    assert_eq!(device.exchanges(), 2);
    assert_eq!(device.transports_created(), 2);
    assert_eq!(manager.health().state, LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_link_open() {
    let device = DeviceFixtures::ws320();
    device.fail_next(1, Fault::Timeout);
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    manager.execute(read(addr::ROOM_TEMPERATURE)).await.unwrap();

    assert_eq!(device.exchanges(), 2);
    assert_eq!(device.transports_created(), 1);
}

// =============================================================================
// Ordering and Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_requests_are_serviced_in_submission_order() {
    let device = DeviceFixtures::ws320();
    device.set_latency(Duration::from_millis(20));
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    let (a, b, c) = tokio::join!(
        manager.execute(read(700)),
        manager.execute(Request::write(553, vec![220])),
        manager.execute(read(553)),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(c.unwrap(), Response::Registers(vec![220]));

    let log: Vec<u16> = device.request_log().iter().map(|(_, address, _)| *address).collect();
    assert_eq!(log, vec![700, 553, 553]);
}

#[tokio::test(start_paused = true)]
async fn test_close_rejects_new_requests() {
    let device = DeviceFixtures::ws320();
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());
    manager.connect().await.unwrap();

    manager.close().await;

    assert!(manager.is_closed());
    assert!(matches!(
        manager.execute(read(addr::ROOM_TEMPERATURE)).await,
        Err(ModbusError::ShutDown)
    ));
    assert_eq!(device.exchanges(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_waits_for_in_flight_request() {
    let device = DeviceFixtures::ws320();
    device.set_latency(Duration::from_millis(50));
    let manager = ConnectionFixtures::manager(&device, &ConnectionFixtures::standard());

    let (result, ()) = tokio::join!(manager.execute(read(addr::ROOM_TEMPERATURE)), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.close().await;
    });

    assert_eq!(result.unwrap(), Response::Registers(vec![215]));
    assert!(matches!(
        manager.execute(read(addr::ROOM_TEMPERATURE)).await,
        Err(ModbusError::ShutDown)
    ));
}
