// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # wsvent-modbus
//!
//! Modbus driver for Maico WS ventilation units (WS 75 … WS 470).
//!
//! This crate turns the unit's register map into a typed, periodically
//! refreshed device state:
//!
//! - **Register map**: a static table of every register with address, width,
//!   signedness, scale, range and access mode
//! - **Transports**: Modbus TCP and Modbus RTU, both built on `tokio-modbus`
//! - **Connection manager**: one request at a time in FIFO order, bounded
//!   retry with exponential backoff, reconnect after repeated link failures
//! - **Codec**: contiguous batched reads and range-checked writes
//! - **Status decoding**: enumerated codes to stable labels
//! - **Derived metrics**: power state, fan level and heat-recovery efficiency
//! - **Aggregator**: periodic polling into immutable snapshots with
//!   per-field staleness
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   DeviceStateAggregator                         │
//! │        (poll loop · snapshots · single write entry point)       │
//! └─────────────────────────────────────────────────────────────────┘
//!        │ read_all                 │ decode/derive          │ write
//!        ▼                          ▼                        ▼
//! ┌──────────────┐        ┌──────────────────┐      ┌──────────────┐
//! │  RawReader   │        │  StatusDecoder   │      │  RawWriter   │
//! │ (RegisterMap)│        │  DerivedMetrics  │      │ (RegisterMap)│
//! └──────────────┘        └──────────────────┘      └──────────────┘
//!        │                                                   │
//!        └───────────────────────┬───────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ConnectionManager                           │
//! │            (FIFO queue · retry · reconnect · health)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//! ┌─────────────────────┐                 ┌─────────────────────┐
//! │  ModbusTcpTransport │                 │  ModbusRtuTransport │
//! └─────────────────────┘                 └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use wsvent_modbus::{
//!     AggregatorOptions, ConnectionConfig, DeviceStateAggregator, TcpConfig, WriteCommand,
//! };
//!
//! let config = ConnectionConfig::tcp(TcpConfig::new("192.168.1.50"));
//! let device = DeviceStateAggregator::connect(
//!     &config,
//!     AggregatorOptions::default().with_poll_interval(Duration::from_secs(15)),
//! )?;
//!
//! let poller = device.start();
//!
//! device.write(WriteCommand::target_temperature(21.5)).await?;
//! if let Some(snapshot) = device.snapshot() {
//!     println!("efficiency: {:?}", snapshot.number("heat_recovery_efficiency"));
//! }
//!
//! device.shutdown().await;
//! poller.await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod codec;
pub mod command;
pub mod device;
pub mod error;
pub mod metrics;
pub mod registers;
pub mod snapshot;
pub mod status;
pub mod types;

// =============================================================================
// Re-exports - Error Module
// =============================================================================

pub use error::{
    // Main error type
    ModbusError,
    ModbusResult,
    // Error categories
    ConfigurationError,
    ProtocolError,
    TransportError,
    ValidationError,
    TimeoutKind,
    // Error metadata
    ErrorSeverity,
};

// =============================================================================
// Re-exports - Types Module
// =============================================================================

pub use types::{
    ConnectionConfig, DataBits, Parity, ReconnectPolicy, RetryPolicy, RtuConfig, StopBits,
    TcpConfig, TransportConfig,
};

// =============================================================================
// Re-exports - Client Module
// =============================================================================

pub use client::{
    // Connection
    ClientStats,
    ConfigTransportFactory,
    ConnectionHealth,
    ConnectionManager,
    LinkState,
    TransportFactory,
    // Transport
    ModbusRtuTransport,
    ModbusTcpTransport,
    ModbusTransport,
    Request,
    Response,
    TransportState,
    // Retry
    ExponentialBackoff,
};

// =============================================================================
// Re-exports - Device Model
// =============================================================================

pub use codec::{RangeFailure, RawReader, RawWriter, ReadBatch, Reading, WriteReceipt};
pub use command::{CommandValue, Unit, WriteCommand};
pub use device::{AggregatorOptions, AggregatorState, DeviceStateAggregator, PollOutcome};
pub use metrics::{DerivedMetrics, Efficiency};
pub use registers::{
    Access, CodeSet, ReadRange, RegisterDescriptor, RegisterMap, ValueKind,
    ValueRange,
};
pub use snapshot::{DeviceSnapshot, FieldValue, SnapshotField};
pub use status::{FanLevel, OperationMode, StatusDecoder, VentilationLevel};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
