// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Serialized access to the one transport.
//!
//! [`ConnectionManager`] is the only component that talks to a
//! [`ModbusTransport`]. Every read and write is funnelled through
//! [`ConnectionManager::execute`], which holds a fair (FIFO) async mutex for
//! the duration of the exchange, so requests are serviced strictly in
//! submission order and never interleave on the wire.
//!
//! # Failure handling
//!
//! ```text
//! execute(request)
//!   ├── link Failed? ── Reconnecting, fresh transport from the factory,
//!   │                   reconnect backoff (1s, 2s, 4s, ... up to 60s)
//!   ├── attempt 1 ── ok ──────────────────────────► reset counter, Connected
//!   ├── backoff (100ms, 200ms, ... ±jitter)
//!   ├── attempt 2 ...
//!   └── attempts exhausted on a link failure ─────► counter += 1,
//!                                                   surface last error
//!
//! counter > failure_threshold
//!   └── Failed, close transport
//! ```
//!
//! The counter tracks failed requests, not failed attempts: one request
//! that exhausts its retries adds one.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::error::{ModbusError, ModbusResult};
use crate::types::{ConnectionConfig, ReconnectPolicy, RetryPolicy, TransportConfig};

use super::retry::ExponentialBackoff;
use super::rtu::ModbusRtuTransport;
use super::tcp::ModbusTcpTransport;
use super::transport::{ModbusTransport, Request, Response};

// =============================================================================
// TransportFactory
// =============================================================================

/// Produces fresh, unopened transports.
///
/// The manager asks for a new transport on every (re)connect and never
/// reopens a handle that has failed.
pub trait TransportFactory: Send + Sync {
    /// Creates a new, disconnected transport.
    fn create(&self) -> Box<dyn ModbusTransport>;

    /// Endpoint description for logs.
    fn describe(&self) -> String {
        "custom transport".to_string()
    }
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn ModbusTransport> + Send + Sync,
{
    fn create(&self) -> Box<dyn ModbusTransport> {
        self()
    }
}

/// Factory building TCP or RTU transports from configuration.
#[derive(Debug, Clone)]
pub struct ConfigTransportFactory {
    config: TransportConfig,
}

impl ConfigTransportFactory {
    /// Creates a factory for the given transport settings.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for ConfigTransportFactory {
    fn create(&self) -> Box<dyn ModbusTransport> {
        match &self.config {
            TransportConfig::Tcp(tcp) => Box::new(ModbusTcpTransport::new(tcp.clone())),
            TransportConfig::Rtu(rtu) => Box::new(ModbusRtuTransport::new(rtu.clone())),
        }
    }

    fn describe(&self) -> String {
        self.config.endpoint()
    }
}

// =============================================================================
// ConnectionHealth
// =============================================================================

/// Link state as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// The last exchange or connect succeeded.
    Connected,
    /// A (re)connect is in progress or has not happened yet.
    Reconnecting,
    /// The consecutive-failure threshold was exceeded.
    Failed,
}

impl LinkState {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable connection health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionHealth {
    /// Current link state.
    pub state: LinkState,
    /// Requests failed on the link since the last successful one.
    pub consecutive_failures: u32,
    /// Time of the last successful exchange.
    pub last_success: Option<DateTime<Utc>>,
    /// Reconnect cycles started.
    pub reconnects: u64,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            state: LinkState::Reconnecting,
            consecutive_failures: 0,
            last_success: None,
            reconnects: 0,
        }
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Request counters.
#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_attempts: AtomicU64,
    retries: AtomicU64,
    total_response_time_us: AtomicU64,
    connections: AtomicU64,
}

impl ClientStats {
    fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self, duration: Duration) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Logical requests submitted.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Logical requests that eventually succeeded.
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    /// Individual exchanges that failed.
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Retries performed.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Transports opened.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Success rate (0.0 - 1.0).
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 1.0;
        }
        self.successful_requests() as f64 / total as f64
    }

    /// Mean duration of successful requests, retries included.
    pub fn average_response_time(&self) -> Duration {
        let success = self.successful_requests();
        if success == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / success)
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

struct Link {
    transport: Option<Box<dyn ModbusTransport>>,
    consecutive_failures: u32,
    needs_reconnect: bool,
    /// Set while an exchange is on the wire. Still set on the next lock
    /// means the caller was cancelled mid-exchange and a late reply may be
    /// pending, so the transport is not reused.
    mid_exchange: bool,
}

/// Owns the transport and serializes every exchange.
pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    link: Mutex<Link>,
    retry: RetryPolicy,
    retry_backoff: ExponentialBackoff,
    reconnect: ReconnectPolicy,
    reconnect_backoff: ExponentialBackoff,
    failure_threshold: u32,
    health: watch::Sender<ConnectionHealth>,
    stats: ClientStats,
    closed: AtomicBool,
    endpoint: String,
}

impl ConnectionManager {
    /// Validates the configuration and builds a manager for real TCP/RTU
    /// transports. No connection is opened yet.
    pub fn new(config: &ConnectionConfig) -> ModbusResult<Self> {
        let factory = ConfigTransportFactory::new(config.transport.clone());
        Self::with_factory(config, Arc::new(factory))
    }

    /// Builds a manager around a custom transport factory.
    pub fn with_factory(
        config: &ConnectionConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> ModbusResult<Self> {
        config.validate()?;

        let (health, _) = watch::channel(ConnectionHealth::default());
        let endpoint = factory.describe();

        Ok(Self {
            retry_backoff: ExponentialBackoff::from(&config.retry),
            reconnect_backoff: ExponentialBackoff::from(&config.reconnect),
            retry: config.retry.clone(),
            reconnect: config.reconnect.clone(),
            failure_threshold: config.failure_threshold,
            factory,
            link: Mutex::new(Link {
                transport: None,
                consecutive_failures: 0,
                needs_reconnect: false,
                mid_exchange: false,
            }),
            health,
            stats: ClientStats::default(),
            closed: AtomicBool::new(false),
            endpoint,
        })
    }

    /// Current health.
    pub fn health(&self) -> ConnectionHealth {
        self.health.borrow().clone()
    }

    /// Subscribes to health changes.
    pub fn subscribe_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.subscribe()
    }

    /// Request counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Endpoint description.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Opens the transport eagerly. Optional; `execute` connects on demand.
    pub async fn connect(&self) -> ModbusResult<()> {
        self.ensure_open()?;
        let mut link = self.link.lock().await;
        self.ensure_open()?;
        self.prepare(&mut link).await
    }

    /// Runs one logical request: reconnects first if the link was declared
    /// failed, then retries link failures with backoff. A request that still
    /// fails on the link counts once towards the failure threshold.
    ///
    /// `retry.attempts` is the total number of exchanges, the first included.
    pub async fn execute(&self, request: Request) -> ModbusResult<Response> {
        self.ensure_open()?;
        let mut link = self.link.lock().await;
        self.ensure_open()?;

        self.stats.record_request();
        if link.needs_reconnect {
            self.reconnect(&mut link).await?;
        }

        let started = Instant::now();
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.exchange(&mut link, &request).await {
                Ok(response) => {
                    self.record_success(&mut link);
                    self.stats.record_success(started.elapsed());
                    return Ok(response);
                }
                Err(error) => {
                    self.stats.record_failed_attempt();

                    attempt += 1;
                    if !error.is_retryable() || attempt >= attempts || self.is_closed() {
                        if error.is_link_failure() {
                            self.record_failure(&mut link, &error).await;
                        }
                        error.log(&format!("{request} after {attempt} attempt(s)"));
                        return Err(error);
                    }

                    let delay = self.retry_backoff.delay(attempt - 1);
                    tracing::debug!(
                        request = %request,
                        attempt = attempt + 1,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying request"
                    );
                    self.stats.record_retry();
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Stops accepting requests, waits for the in-flight exchange and closes
    /// the transport.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut link = self.link.lock().await;
        if let Some(mut transport) = link.transport.take() {
            if let Err(e) = transport.disconnect().await {
                tracing::warn!(error = %e, "Error while closing transport");
            }
        }
        tracing::info!(endpoint = %self.endpoint, "Connection manager closed");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> ModbusResult<()> {
        if self.is_closed() {
            return Err(ModbusError::ShutDown);
        }
        Ok(())
    }

    async fn exchange(&self, link: &mut Link, request: &Request) -> ModbusResult<Response> {
        if link.mid_exchange {
            tracing::debug!("Previous exchange was abandoned; replacing transport");
        }
        if link.mid_exchange || !link.transport.as_ref().is_some_and(|t| t.is_connected()) {
            self.open_fresh(link).await?;
        }
        let transport = link
            .transport
            .as_mut()
            .ok_or_else(ModbusError::not_connected)?;

        link.mid_exchange = true;
        let result = transport.execute(request).await;
        link.mid_exchange = false;
        result
    }

    /// Makes sure an open transport is available, reconnecting a failed link.
    async fn prepare(&self, link: &mut Link) -> ModbusResult<()> {
        if link.needs_reconnect {
            return self.reconnect(link).await;
        }

        let usable = link.transport.as_ref().is_some_and(|t| t.is_connected());
        if !usable {
            self.open_fresh(link).await?;
        }
        Ok(())
    }

    async fn open_fresh(&self, link: &mut Link) -> ModbusResult<()> {
        if let Some(mut stale) = link.transport.take() {
            stale.disconnect().await.ok();
        }

        link.mid_exchange = false;

        let mut transport = self.factory.create();
        transport.connect().await?;

        tracing::info!(endpoint = %transport.display_name(), "Transport connected");
        link.transport = Some(transport);
        self.stats.record_connection();
        self.health.send_modify(|h| h.state = LinkState::Connected);
        Ok(())
    }

    async fn reconnect(&self, link: &mut Link) -> ModbusResult<()> {
        self.health.send_modify(|h| {
            h.state = LinkState::Reconnecting;
            h.reconnects += 1;
        });
        tracing::info!(
            endpoint = %self.endpoint,
            max_attempts = self.reconnect.max_attempts,
            "Reconnecting"
        );

        let max_attempts = self.reconnect.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.reconnect_backoff.delay(attempt - 1);
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before reconnect attempt"
                );
                tokio::time::sleep(delay).await;
            }
            if self.is_closed() {
                return Err(ModbusError::ShutDown);
            }

            match self.open_fresh(link).await {
                Ok(()) => {
                    link.needs_reconnect = false;
                    link.consecutive_failures = 0;
                    self.health.send_modify(|h| h.consecutive_failures = 0);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
                    let fatal = !e.is_retryable();
                    last_error = Some(e);
                    if fatal {
                        break;
                    }
                }
            }
        }

        self.health.send_modify(|h| h.state = LinkState::Failed);
        Err(last_error.unwrap_or_else(ModbusError::not_connected))
    }

    fn record_success(&self, link: &mut Link) {
        link.consecutive_failures = 0;
        self.health.send_modify(|h| {
            h.state = LinkState::Connected;
            h.consecutive_failures = 0;
            h.last_success = Some(Utc::now());
        });
    }

    async fn record_failure(&self, link: &mut Link, error: &ModbusError) {
        link.consecutive_failures = link.consecutive_failures.saturating_add(1);
        let failures = link.consecutive_failures;
        self.health.send_modify(|h| h.consecutive_failures = failures);

        if failures > self.failure_threshold && !link.needs_reconnect {
            tracing::warn!(
                endpoint = %self.endpoint,
                consecutive_failures = failures,
                threshold = self.failure_threshold,
                error = %error,
                "Connection failed; transport will be replaced"
            );
            if let Some(mut transport) = link.transport.take() {
                transport.disconnect().await.ok();
            }
            link.needs_reconnect = true;
            self.health.send_modify(|h| h.state = LinkState::Failed);
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("attempts", &self.retry.attempts)
            .field("failure_threshold", &self.failure_threshold)
            .field("health", &*self.health.borrow())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::TransportState;
    use crate::error::TransportError;
    use crate::types::TcpConfig;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Transport failing its first `fail_first` reads with a timeout.
    struct FlakyTransport {
        state: TransportState,
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl ModbusTransport for FlakyTransport {
        async fn connect(&mut self) -> ModbusResult<()> {
            self.state = TransportState::Connected;
            Ok(())
        }

        async fn disconnect(&mut self) -> ModbusResult<()> {
            self.state = TransportState::Disconnected;
            Ok(())
        }

        fn state(&self) -> TransportState {
            self.state
        }

        async fn read_holding_registers(&mut self, _: u16, count: u16) -> ModbusResult<Vec<u16>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(TransportError::timeout(
                    crate::error::TimeoutKind::Read,
                    Duration::from_secs(3),
                )
                .into());
            }
            Ok(vec![0; count as usize])
        }

        async fn write_single_register(&mut self, _: u16, _: u16) -> ModbusResult<()> {
            Ok(())
        }

        async fn write_multiple_registers(&mut self, _: u16, _: &[u16]) -> ModbusResult<()> {
            Ok(())
        }

        fn unit_id(&self) -> u8 {
            1
        }

        fn display_name(&self) -> String {
            "flaky".to_string()
        }
    }

    fn manager(fail_first: usize, calls: Arc<AtomicUsize>) -> ConnectionManager {
        let factory = move || -> Box<dyn ModbusTransport> {
            Box::new(FlakyTransport {
                state: TransportState::Disconnected,
                calls: calls.clone(),
                fail_first,
            })
        };
        let config = ConnectionConfig::tcp(TcpConfig::new("127.0.0.1"));
        ConnectionManager::with_factory(&config, Arc::new(factory)).unwrap()
    }

    #[test]
    fn test_initial_health() {
        let manager = manager(0, Arc::new(AtomicUsize::new(0)));
        let health = manager.health();
        assert_eq!(health.state, LinkState::Reconnecting);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = manager(2, calls.clone());

        let response = manager
            .execute(Request::ReadHolding { address: 700, count: 2 })
            .await
            .unwrap();

        assert_eq!(response, Response::Registers(vec![0, 0]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.stats().retries(), 2);

        let health = manager.health();
        assert_eq!(health.state, LinkState::Connected);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_counts_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = manager(usize::MAX, calls.clone());
        let request = Request::ReadHolding { address: 700, count: 1 };

        assert!(manager.execute(request.clone()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.health().consecutive_failures, 1);
        assert_eq!(manager.health().state, LinkState::Connected);

        for _ in 0..2 {
            assert!(manager.execute(request.clone()).await.is_err());
        }
        assert_eq!(manager.health().consecutive_failures, 3);
        assert_eq!(manager.health().state, LinkState::Connected);

        assert!(manager.execute(request).await.is_err());
        assert_eq!(manager.health().consecutive_failures, 4);
        assert_eq!(manager.health().state, LinkState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_manager_rejects_requests() {
        let manager = manager(0, Arc::new(AtomicUsize::new(0)));
        manager.close().await;

        let result = manager
            .execute(Request::ReadHolding { address: 700, count: 1 })
            .await;
        assert!(matches!(result, Err(ModbusError::ShutDown)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config =
            ConnectionConfig::tcp(TcpConfig::new("127.0.0.1")).with_failure_threshold(0);
        assert!(ConnectionManager::new(&config).is_err());
    }

    #[test]
    fn test_config_factory_describe() {
        let factory = ConfigTransportFactory::new(TransportConfig::Tcp(TcpConfig::new("10.0.0.5")));
        assert!(factory.describe().contains("10.0.0.5"));
        assert_eq!(factory.create().state(), TransportState::Disconnected);
    }

    #[test]
    fn test_stats_defaults() {
        let stats = ClientStats::default();
        assert_eq!(stats.success_rate(), 1.0);
        assert_eq!(stats.average_response_time(), Duration::ZERO);
    }
}
