// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device runtime orchestration.
//!
//! Builds the aggregator from configuration, runs the poll loop, reports
//! snapshots and connection health, and shuts everything down in order on
//! a signal: poll timer first, then the in-flight request, then the
//! transport.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use wsvent_config::{load_config, WsventConfig};
use wsvent_modbus::metrics::HEAT_RECOVERY_EFFICIENCY;
use wsvent_modbus::{
    AggregatorState, ConnectionHealth, DeviceSnapshot, DeviceStateAggregator, LinkState,
};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// DeviceRuntime
// =============================================================================

/// Runs one device until shutdown.
pub struct DeviceRuntime {
    config: Arc<WsventConfig>,
    shutdown: ShutdownCoordinator,
}

impl DeviceRuntime {
    /// Creates a new runtime.
    pub fn new(config: WsventConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Shutdown handle, e.g. for tests or embedding.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Configuration in use.
    pub fn config(&self) -> &WsventConfig {
        &self.config
    }

    /// Builds the aggregator described by the configuration.
    pub fn build_device(config: &WsventConfig) -> BinResult<DeviceStateAggregator> {
        let options = config.aggregator_options()?;
        Ok(DeviceStateAggregator::connect(&config.connection, options)?)
    }

    /// Runs until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            device = %self.config.device.name,
            endpoint = %self.config.endpoint(),
            transport = self.config.transport_kind(),
            "Starting wsvent v{}",
            wsvent_modbus::VERSION
        );

        let device = Self::build_device(&self.config)?;

        if let Err(e) = device.connection().connect().await {
            warn!(error = %e, "Initial connection failed; the poll loop will keep retrying");
        }

        let reporter = spawn_reporter(device.clone(), self.shutdown.clone());
        let poller = device.start();

        info!(
            poll_interval = %humantime::format_duration(device.poll_interval()),
            "wsvent is running"
        );
        let reason = self.shutdown.wait_for_shutdown().await;

        info!(reason = %reason, "Stopping poll loop and closing the link");
        device.shutdown().await;
        if let Err(e) = poller.await {
            warn!(error = %e, "Poll loop ended abnormally");
        }
        if let Err(e) = reporter.await {
            warn!(error = %e, "Reporter ended abnormally");
        }

        let stats = device.connection().stats();
        info!(
            requests = stats.total_requests(),
            success_rate = format!("{:.1}%", stats.success_rate() * 100.0),
            "wsvent shutdown complete"
        );
        Ok(())
    }
}

// =============================================================================
// Reporting
// =============================================================================

fn spawn_reporter(device: DeviceStateAggregator, shutdown: ShutdownCoordinator) -> JoinHandle<()> {
    let mut snapshots = device.subscribe();
    let mut health = device.connection().subscribe_health();
    let mut poll_state = device.subscribe_state();
    let mut stop = shutdown.subscribe();

    tokio::spawn(async move {
        let mut last_state = health.borrow().state;
        let mut last_settled = match *poll_state.borrow() {
            AggregatorState::Polling => AggregatorState::Idle,
            settled => settled,
        };
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        log_snapshot(&snapshot, &device);
                    }
                }
                changed = health.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = health.borrow_and_update().clone();
                    if current.state != last_state {
                        log_health(&current);
                        last_state = current.state;
                    }
                }
                changed = poll_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *poll_state.borrow_and_update();
                    if settled_change(last_settled, current) {
                        log_poll_state(last_settled, current);
                        last_settled = current;
                    }
                }
            }
        }
    })
}

fn log_snapshot(snapshot: &DeviceSnapshot, device: &DeviceStateAggregator) {
    let stale = snapshot.stale_fields();
    let efficiency = snapshot
        .number(HEAT_RECOVERY_EFFICIENCY)
        .map_or_else(|| "unavailable".to_string(), |v| format!("{v:.1}%"));

    if stale.is_empty() {
        info!(
            sequence = snapshot.sequence,
            fields = snapshot.len(),
            state = %device.state(),
            efficiency = %efficiency,
            "Snapshot updated"
        );
    } else {
        warn!(
            sequence = snapshot.sequence,
            fields = snapshot.len(),
            stale = stale.len(),
            state = %device.state(),
            "Snapshot updated with stale fields"
        );
    }
}

/// `Polling` is transient; only moves between settled states are reported.
fn settled_change(last: AggregatorState, current: AggregatorState) -> bool {
    current != AggregatorState::Polling && current != last
}

fn log_poll_state(from: AggregatorState, to: AggregatorState) {
    match to {
        AggregatorState::Degraded => warn!(from = %from, "Polling degraded; some fields are stale"),
        _ => info!(from = %from, state = %to, "Polling recovered"),
    }
}

fn log_health(health: &ConnectionHealth) {
    match health.state {
        LinkState::Connected => info!(reconnects = health.reconnects, "Connection healthy"),
        LinkState::Reconnecting => warn!(
            failures = health.consecutive_failures,
            "Connection lost; reconnecting"
        ),
        LinkState::Failed => warn!(
            failures = health.consecutive_failures,
            last_success = ?health.last_success,
            "Connection failed"
        ),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<WsventConfig>,
    poll_interval: Option<Duration>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: WsventConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the configured poll interval.
    pub fn poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<DeviceRuntime> {
        let mut config = match self.config {
            Some(config) => config,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path).map_err(|e| {
                    BinError::from(e).with_context(format!("Failed to load {}", path.display()))
                })?
            }
        };

        if let Some(interval) = self.poll_interval {
            config.device.poll_interval = interval;
            config.validate()?;
        }

        Ok(DeviceRuntime::new(config))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wsvent_modbus::{ConnectionConfig, TcpConfig};

    fn test_config() -> WsventConfig {
        WsventConfig::new(ConnectionConfig::tcp(TcpConfig::new("127.0.0.1")))
    }

    #[test]
    fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(test_config())
            .poll_interval(Some(Duration::from_secs(10)))
            .build()
            .unwrap();
        assert_eq!(runtime.config().device.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_runtime_builder_rejects_bad_interval() {
        let result = RuntimeBuilder::new()
            .config(test_config())
            .poll_interval(Some(Duration::from_millis(1)))
            .build();
        assert_eq!(result.err().map(|e| e.exit_code()), Some(1));
    }

    #[test]
    fn test_settled_change_ignores_polling() {
        use AggregatorState::{Degraded, Idle, Polling};

        assert!(!settled_change(Idle, Polling));
        assert!(!settled_change(Idle, Idle));
        assert!(settled_change(Idle, Degraded));
        assert!(settled_change(Degraded, Idle));
        assert!(!settled_change(Degraded, Degraded));
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        assert!(RuntimeBuilder::new().build().is_err());
    }

    #[tokio::test]
    async fn test_build_device() {
        let device = DeviceRuntime::build_device(&test_config()).unwrap();
        assert_eq!(device.poll_interval(), Duration::from_secs(30));
        assert!(device.snapshot().is_none());
    }
}
