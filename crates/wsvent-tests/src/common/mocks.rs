// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! A [`SimulatedDevice`] is an in-memory register bank shared by every
//! [`MockTransport`] the [`MockTransportFactory`] hands out, so the state
//! survives reconnects the way a real unit does.
//!
//! - Configurable failures: next N exchanges, every exchange, or only
//!   requests touching an address window
//! - Recording of interactions for verification
//! - Thread-safe for concurrent testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use wsvent_modbus::{
    ModbusError, ModbusResult, ModbusTransport, TransportError, TransportFactory, TransportState,
};

// =============================================================================
// Fault
// =============================================================================

/// Failure injected into an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No response within the timeout; the link stays open.
    Timeout,
    /// Peer closed the connection; the transport must be replaced.
    Closed,
    /// Modbus exception response with the given code.
    Exception(u8),
}

impl Fault {
    fn to_error(self, function_code: u8) -> ModbusError {
        match self {
            Fault::Timeout => ModbusError::response_timeout(Duration::from_secs(3)),
            Fault::Closed => TransportError::closed(Some("reset by peer".to_string())).into(),
            Fault::Exception(code) => ModbusError::exception(function_code, code),
        }
    }
}

// =============================================================================
// SimulatedDevice
// =============================================================================

#[derive(Debug, Default)]
struct Bank {
    holding: HashMap<u16, u16>,
    fail_next: VecDeque<Fault>,
    fail_all: Option<Fault>,
    fail_window: Vec<(u16, u16, Fault)>,
    refuse_connect: bool,
    latency: Duration,
    write_log: Vec<(u16, Vec<u16>)>,
    request_log: Vec<(u8, u16, u16)>,
}

#[derive(Debug, Default)]
struct Counters {
    exchanges: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    connects: AtomicU64,
    transports: AtomicU64,
}

/// In-memory ventilation unit.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice {
    bank: Arc<Mutex<Bank>>,
    counters: Arc<Counters>,
}

impl SimulatedDevice {
    /// Creates an empty device; unset registers read as zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self) -> MutexGuard<'_, Bank> {
        self.bank.lock().expect("simulated device lock poisoned")
    }

    // -------------------------------------------------------------------------
    // Register access
    // -------------------------------------------------------------------------

    /// Sets a holding register word.
    pub fn set_holding(&self, address: u16, value: u16) -> &Self {
        self.bank().holding.insert(address, value);
        self
    }

    /// Sets a signed holding register.
    pub fn set_signed(&self, address: u16, value: i16) -> &Self {
        self.set_holding(address, value as u16)
    }

    /// Sets a two-word holding register, high word first.
    pub fn set_u32(&self, address: u16, value: u32) -> &Self {
        self.set_holding(address, (value >> 16) as u16);
        self.set_holding(address + 1, value as u16)
    }

    /// Current holding register word.
    pub fn holding(&self, address: u16) -> u16 {
        self.bank().holding.get(&address).copied().unwrap_or(0)
    }

    // -------------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------------

    /// Fails the next `count` exchanges with `fault`.
    pub fn fail_next(&self, count: usize, fault: Fault) {
        self.bank().fail_next.extend(std::iter::repeat(fault).take(count));
    }

    /// Fails every exchange until [`heal`](Self::heal).
    pub fn fail_all(&self, fault: Fault) {
        self.bank().fail_all = Some(fault);
    }

    /// Fails every request touching `start..start + count`.
    pub fn fail_window(&self, start: u16, count: u16, fault: Fault) {
        self.bank().fail_window.push((start, count, fault));
    }

    /// Refuses new connections.
    pub fn refuse_connect(&self, refuse: bool) {
        self.bank().refuse_connect = refuse;
    }

    /// Delay added to every exchange.
    pub fn set_latency(&self, latency: Duration) {
        self.bank().latency = latency;
    }

    /// Clears every injected failure.
    pub fn heal(&self) {
        let mut bank = self.bank();
        bank.fail_next.clear();
        bank.fail_all = None;
        bank.fail_window.clear();
        bank.refuse_connect = false;
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    /// Exchanges that reached the device, failed ones included.
    pub fn exchanges(&self) -> u64 {
        self.counters.exchanges.load(Ordering::SeqCst)
    }

    /// Read exchanges.
    pub fn reads(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Write exchanges.
    pub fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::SeqCst)
    }

    /// Connection attempts.
    pub fn connects(&self) -> u64 {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Transports handed out by the factory.
    pub fn transports_created(&self) -> u64 {
        self.counters.transports.load(Ordering::SeqCst)
    }

    /// Successful writes as `(address, words)`.
    pub fn write_log(&self) -> Vec<(u16, Vec<u16>)> {
        self.bank().write_log.clone()
    }

    /// Every exchange as `(function code, address, word count)`, in order.
    pub fn request_log(&self) -> Vec<(u8, u16, u16)> {
        self.bank().request_log.clone()
    }

    /// Factory producing transports bound to this device.
    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        Arc::new(MockTransportFactory {
            device: self.clone(),
        })
    }

    // -------------------------------------------------------------------------
    // Exchange handling
    // -------------------------------------------------------------------------

    async fn begin(&self, function_code: u8, address: u16, count: u16) -> ModbusResult<()> {
        self.counters.exchanges.fetch_add(1, Ordering::SeqCst);
        let latency = {
            let mut bank = self.bank();
            bank.request_log.push((function_code, address, count));
            bank.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let fault = {
            let mut bank = self.bank();
            let end = u32::from(address) + u32::from(count);
            bank.fail_next.pop_front().or(bank.fail_all).or_else(|| {
                bank.fail_window
                    .iter()
                    .find(|(start, len, _)| {
                        u32::from(*start) < end && u32::from(address) < u32::from(*start) + u32::from(*len)
                    })
                    .map(|(_, _, fault)| *fault)
            })
        };
        match fault {
            Some(fault) => Err(fault.to_error(function_code)),
            None => Ok(()),
        }
    }

    fn read_words(&self, address: u16, count: u16) -> Vec<u16> {
        let bank = self.bank();
        (0..count)
            .map(|offset| bank.holding.get(&(address + offset)).copied().unwrap_or(0))
            .collect()
    }

    fn store(&self, address: u16, values: &[u16]) {
        let mut bank = self.bank();
        for (offset, value) in values.iter().enumerate() {
            bank.holding.insert(address + offset as u16, *value);
        }
        bank.write_log.push((address, values.to_vec()));
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// Transport talking to a [`SimulatedDevice`].
#[derive(Debug)]
pub struct MockTransport {
    device: SimulatedDevice,
    state: TransportState,
}

impl MockTransport {
    /// Creates a disconnected transport.
    pub fn new(device: SimulatedDevice) -> Self {
        Self {
            device,
            state: TransportState::Disconnected,
        }
    }

    fn check_connected(&self) -> ModbusResult<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(ModbusError::not_connected())
        }
    }

    fn observe<T>(&mut self, result: ModbusResult<T>) -> ModbusResult<T> {
        if let Err(ModbusError::Transport(TransportError::Closed { .. })) = &result {
            self.state = TransportState::Error;
        }
        result
    }
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        self.device.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.device.bank().refuse_connect {
            self.state = TransportState::Error;
            return Err(TransportError::refused("simulated", 502).into());
        }
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

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.check_connected()?;
        self.device.counters.reads.fetch_add(1, Ordering::SeqCst);
        let result = self.device.begin(0x03, address, count).await;
        let result = result.map(|()| self.device.read_words(address, count));
        self.observe(result)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        self.check_connected()?;
        self.device.counters.writes.fetch_add(1, Ordering::SeqCst);
        let result = self.device.begin(0x06, address, 1).await;
        let result = result.map(|()| self.device.store(address, &[value]));
        self.observe(result)
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ModbusResult<()> {
        self.check_connected()?;
        self.device.counters.writes.fetch_add(1, Ordering::SeqCst);
        let result = self.device.begin(0x10, address, values.len() as u16).await;
        let result = result.map(|()| self.device.store(address, values));
        self.observe(result)
    }

    fn unit_id(&self) -> u8 {
        1
    }

    fn display_name(&self) -> String {
        "simulated WS unit".to_string()
    }
}

// =============================================================================
// MockTransportFactory
// =============================================================================

/// Hands out fresh [`MockTransport`]s and counts them.
#[derive(Debug, Clone)]
pub struct MockTransportFactory {
    device: SimulatedDevice,
}

impl MockTransportFactory {
    /// Creates a factory for `device`.
    pub fn new(device: SimulatedDevice) -> Self {
        Self { device }
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self) -> Box<dyn ModbusTransport> {
        self.device.counters.transports.fetch_add(1, Ordering::SeqCst);
        Box::new(MockTransport::new(self.device.clone()))
    }

    fn describe(&self) -> String {
        "simulated WS unit".to_string()
    }
}
