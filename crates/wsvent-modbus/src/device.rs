// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic polling and snapshot publication.
//!
//! [`DeviceStateAggregator`] owns the poll loop. Each cycle reads every
//! readable register, decodes it, derives the computed metrics and
//! publishes a new immutable [`DeviceSnapshot`]. Fields whose read failed
//! keep their previous value, flagged stale.
//!
//! ```text
//!        tick                     all ranges ok
//! Idle ────────► Polling ─────────────────────────► Idle
//!                   │   some range failed
//!                   └─────────────────────────────► Degraded ──tick──► Polling
//! ```
//!
//! Writes go through [`DeviceStateAggregator::write`], the single write
//! entry point, and share the connection manager's FIFO queue with reads.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::{ConnectionHealth, ConnectionManager};
use crate::codec::{RangeFailure, RawReader, RawWriter, ReadBatch, WriteReceipt};
use crate::command::WriteCommand;
use crate::error::{ConfigurationError, ModbusError, ModbusResult};
use crate::metrics::DerivedMetrics;
use crate::registers::RegisterMap;
use crate::snapshot::{DeviceSnapshot, SnapshotField};
use crate::status::StatusDecoder;
use crate::types::ConnectionConfig;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// AggregatorState / PollOutcome
// =============================================================================

/// Poll state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorState {
    /// Waiting for the next tick; the last poll was complete.
    Idle,
    /// A poll cycle is running.
    Polling,
    /// The last poll left at least one field stale.
    Degraded,
}

impl fmt::Display for AggregatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Degraded => "degraded",
        })
    }
}

/// Result of one [`DeviceStateAggregator::poll`].
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Every range was read.
    Complete(Arc<DeviceSnapshot>),
    /// Some ranges failed; their fields are stale or absent.
    Partial {
        /// Published snapshot.
        snapshot: Arc<DeviceSnapshot>,
        /// Failed ranges.
        failures: Vec<RangeFailure>,
    },
    /// Nothing could be read and there is no earlier snapshot.
    Unavailable(Vec<RangeFailure>),
    /// Another poll was still running.
    Skipped,
}

impl PollOutcome {
    /// The published snapshot, if any.
    pub fn snapshot(&self) -> Option<&Arc<DeviceSnapshot>> {
        match self {
            Self::Complete(snapshot) | Self::Partial { snapshot, .. } => Some(snapshot),
            Self::Unavailable(_) | Self::Skipped => None,
        }
    }

    /// Failed ranges.
    pub fn failures(&self) -> &[RangeFailure] {
        match self {
            Self::Partial { failures, .. } | Self::Unavailable(failures) => failures,
            Self::Complete(_) | Self::Skipped => &[],
        }
    }
}

// =============================================================================
// AggregatorOptions
// =============================================================================

/// Aggregator settings besides the connection.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Poll period.
    pub poll_interval: Duration,
    /// Status decoder (with any extra fault/info labels).
    pub decoder: StatusDecoder,
}

impl AggregatorOptions {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the decoder.
    pub fn with_decoder(mut self, decoder: StatusDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Validates the options.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfigurationError::invalid_timeout(
                self.poll_interval,
                format!("poll interval must be at least {MIN_POLL_INTERVAL:?}"),
            )
            .into());
        }
        Ok(())
    }
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            decoder: StatusDecoder::default(),
        }
    }
}

// =============================================================================
// PollGuard
// =============================================================================

/// Marks a poll cycle in progress. Dropping it clears the in-flight flag and
/// restores the previous state unless the cycle published one. A cancelled
/// poll future drops it too.
struct PollGuard<'a> {
    inner: &'a Inner,
    previous: AggregatorState,
}

impl<'a> PollGuard<'a> {
    /// Caller must already own the in-flight flag.
    fn enter(inner: &'a Inner) -> Self {
        let previous = inner.state.send_replace(AggregatorState::Polling);
        Self { inner, previous }
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        let previous = self.previous;
        self.inner.state.send_if_modified(|state| {
            if *state == AggregatorState::Polling {
                *state = previous;
                true
            } else {
                false
            }
        });
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

// =============================================================================
// DeviceStateAggregator
// =============================================================================

struct Inner {
    connection: Arc<ConnectionManager>,
    map: Arc<RegisterMap>,
    reader: RawReader,
    writer: RawWriter,
    decoder: StatusDecoder,
    poll_interval: Duration,
    snapshot: watch::Sender<Option<Arc<DeviceSnapshot>>>,
    state: watch::Sender<AggregatorState>,
    sequence: AtomicU64,
    in_flight: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    shutdown: Notify,
}

/// Polls the unit, publishes snapshots and accepts writes.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct DeviceStateAggregator {
    inner: Arc<Inner>,
}

impl DeviceStateAggregator {
    /// Builds an aggregator around an existing connection manager.
    pub fn new(
        connection: Arc<ConnectionManager>,
        map: Arc<RegisterMap>,
        options: AggregatorOptions,
    ) -> ModbusResult<Self> {
        options.validate()?;

        let (snapshot, _) = watch::channel(None);
        let (state, _) = watch::channel(AggregatorState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                reader: RawReader::new(connection.clone(), map.clone()),
                writer: RawWriter::new(connection.clone(), map.clone()),
                connection,
                map,
                decoder: options.decoder,
                poll_interval: options.poll_interval,
                snapshot,
                state,
                sequence: AtomicU64::new(0),
                in_flight: AtomicBool::new(false),
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        })
    }

    /// Builds the standard register map and a TCP/RTU connection manager.
    pub fn connect(config: &ConnectionConfig, options: AggregatorOptions) -> ModbusResult<Self> {
        let connection = Arc::new(ConnectionManager::new(config)?);
        let map = Arc::new(RegisterMap::standard()?);
        Self::new(connection, map, options)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Latest snapshot, `None` before the first successful poll.
    pub fn snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribes to snapshot publications.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DeviceSnapshot>>> {
        self.inner.snapshot.subscribe()
    }

    /// Current poll state.
    pub fn state(&self) -> AggregatorState {
        *self.inner.state.borrow()
    }

    /// Subscribes to poll state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<AggregatorState> {
        self.inner.state.subscribe()
    }

    /// Connection health.
    pub fn health(&self) -> ConnectionHealth {
        self.inner.connection.health()
    }

    /// Shared connection manager.
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.inner.connection
    }

    /// Register map.
    pub fn register_map(&self) -> &RegisterMap {
        &self.inner.map
    }

    /// Poll period.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Returns `true` while the poll loop runs.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Runs one poll cycle unless another one is in progress.
    pub async fn poll(&self) -> ModbusResult<PollOutcome> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(ModbusError::ShutDown);
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Poll still in progress; skipping");
            return Ok(PollOutcome::Skipped);
        }

        let _guard = PollGuard::enter(&self.inner);
        let batch = self.inner.reader.read_all().await?;
        Ok(self.publish(batch))
    }

    fn publish(&self, batch: ReadBatch) -> PollOutcome {
        let now = Utc::now();
        let previous = self.snapshot();

        if batch.is_empty() && previous.is_none() {
            tracing::warn!(
                failed_ranges = batch.failures.len(),
                "No register could be read; no snapshot available yet"
            );
            self.inner.state.send_replace(AggregatorState::Degraded);
            return PollOutcome::Unavailable(batch.failures);
        }

        let mut fields = BTreeMap::new();
        for descriptor in self.inner.map.iter().filter(|d| d.access.is_readable()) {
            let field = match batch.get(descriptor.name) {
                Some(reading) => Some(SnapshotField::fresh(
                    self.inner.decoder.decode(descriptor, reading),
                    now,
                )),
                None => previous
                    .as_ref()
                    .and_then(|p| p.get(descriptor.name))
                    .cloned()
                    .map(SnapshotField::into_stale),
            };
            if let Some(field) = field {
                fields.insert(descriptor.name.to_string(), field);
            }
        }

        for (name, field) in DerivedMetrics::derive(&fields, now) {
            fields.insert(name.to_string(), field);
        }

        let snapshot = Arc::new(DeviceSnapshot {
            sequence: self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            taken_at: now,
            fields,
        });
        self.inner.snapshot.send_replace(Some(snapshot.clone()));

        if batch.is_complete() {
            self.inner.state.send_replace(AggregatorState::Idle);
            tracing::debug!(
                sequence = snapshot.sequence,
                fields = snapshot.len(),
                "Snapshot published"
            );
            PollOutcome::Complete(snapshot)
        } else {
            self.inner.state.send_replace(AggregatorState::Degraded);
            tracing::warn!(
                sequence = snapshot.sequence,
                failed_ranges = batch.failures.len(),
                stale_fields = snapshot.stale_fields().len(),
                "Degraded snapshot published"
            );
            PollOutcome::Partial {
                snapshot,
                failures: batch.failures,
            }
        }
    }

    /// Starts the periodic poll loop. Ticks that fire while a poll is still
    /// running are skipped, not queued.
    pub fn start(&self) -> JoinHandle<()> {
        self.inner.running.store(true, Ordering::SeqCst);
        let this = self.clone();

        tokio::spawn(async move {
            let period = this.inner.poll_interval;
            tracing::info!(
                interval_ms = period.as_millis() as u64,
                endpoint = %this.inner.connection.endpoint(),
                "Poll loop started"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = this.inner.shutdown.notified() => break,
                    _ = interval.tick() => {
                        match this.poll().await {
                            Ok(_) => {}
                            Err(ModbusError::ShutDown) => break,
                            Err(error) => error.log("poll cycle"),
                        }
                    }
                }
            }

            this.inner.running.store(false, Ordering::SeqCst);
            tracing::info!("Poll loop stopped");
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Resolves and writes one command.
    ///
    /// Validation failures return before any request is queued. A valid
    /// command always reaches the connection manager.
    pub async fn write(&self, command: WriteCommand) -> ModbusResult<WriteReceipt> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(ModbusError::ShutDown);
        }

        let (register, value) = command.resolve(&self.inner.map, &self.inner.decoder)?;
        tracing::debug!(command = %command, register, value, "Executing write command");
        self.inner.writer.write(register, value).await
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops the poll loop, waits for the in-flight request and closes the
    /// transport. Later polls and writes fail with [`ModbusError::ShutDown`].
    pub async fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.notify_one();
        self.inner.connection.close().await;
        tracing::info!("Device aggregator shut down");
    }
}

impl fmt::Debug for DeviceStateAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStateAggregator")
            .field("endpoint", &self.inner.connection.endpoint())
            .field("poll_interval", &self.inner.poll_interval)
            .field("state", &self.state())
            .field("sequence", &self.inner.sequence.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
