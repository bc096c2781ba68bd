// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transports and the connection manager.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │            ConnectionManager               │
//! │  FIFO mutex · retry/backoff · reconnect    │
//! │  ConnectionHealth (watch channel)          │
//! └──────────────────┬─────────────────────────┘
//!                    │ Box<dyn ModbusTransport>
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │ModbusTcpTransport│ │ModbusRtuTransport│
//! └─────────────────┘ └─────────────────┘
//! ```

mod connection;
mod retry;
mod rtu;
mod tcp;
mod transport;

pub use connection::{
    ClientStats, ConfigTransportFactory, ConnectionHealth, ConnectionManager, LinkState,
    TransportFactory,
};
pub use retry::ExponentialBackoff;
pub use rtu::ModbusRtuTransport;
pub use tcp::ModbusTcpTransport;
pub use transport::{ModbusTransport, Request, Response, TransportState};
