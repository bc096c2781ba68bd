// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract transport layer.
//!
//! A [`ModbusTransport`] owns one open link (TCP socket or serial port) and
//! performs exactly one request/response exchange per call. It does not
//! retry and it does not reconnect; both belong to the
//! [`ConnectionManager`](super::ConnectionManager), which is the only
//! component allowed to drive a transport.

use async_trait::async_trait;
use std::fmt;

use crate::error::{ModbusResult, ProtocolError};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Transport is disconnected.
    #[default]
    Disconnected,
    /// Transport is connecting.
    Connecting,
    /// Transport is connected and ready.
    Connected,
    /// Transport hit an unrecoverable error and must be replaced.
    Error,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// One Modbus exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// FC03.
    ReadHolding {
        /// First address.
        address: u16,
        /// Register count.
        count: u16,
    },
    /// FC06.
    WriteSingle {
        /// Target address.
        address: u16,
        /// Word to write.
        value: u16,
    },
    /// FC16.
    WriteMultiple {
        /// First address.
        address: u16,
        /// Words to write.
        values: Vec<u16>,
    },
}

impl Request {
    /// Builds a holding register read.
    pub fn read(address: u16, count: u16) -> Self {
        Self::ReadHolding { address, count }
    }

    /// Builds the write request for one or more words.
    pub fn write(address: u16, values: Vec<u16>) -> Self {
        match values.as_slice() {
            [value] => Self::WriteSingle {
                address,
                value: *value,
            },
            _ => Self::WriteMultiple { address, values },
        }
    }

    /// Modbus function code.
    pub fn function_code(&self) -> u8 {
        match self {
            Self::ReadHolding { .. } => 0x03,
            Self::WriteSingle { .. } => 0x06,
            Self::WriteMultiple { .. } => 0x10,
        }
    }

    /// First address touched by the request.
    pub fn address(&self) -> u16 {
        match self {
            Self::ReadHolding { address, .. }
            | Self::WriteSingle { address, .. }
            | Self::WriteMultiple { address, .. } => *address,
        }
    }

    /// Returns `true` for write requests.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteSingle { .. } | Self::WriteMultiple { .. })
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadHolding { address, count } => write!(f, "FC03 {address}+{count}"),
            Self::WriteSingle { address, value } => write!(f, "FC06 {address}={value}"),
            Self::WriteMultiple { address, values } => {
                write!(f, "FC16 {address}={values:?}")
            }
        }
    }
}

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Register words returned by a read.
    Registers(Vec<u16>),
    /// Write acknowledged.
    Written,
}

impl Response {
    /// Consumes the response, returning read words.
    pub fn into_registers(self) -> Option<Vec<u16>> {
        match self {
            Self::Registers(words) => Some(words),
            Self::Written => None,
        }
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// One open link to the ventilation unit.
///
/// # Implementors
///
/// - [`ModbusTcpTransport`](super::tcp::ModbusTcpTransport)
/// - [`ModbusRtuTransport`](super::rtu::ModbusRtuTransport)
#[async_trait]
pub trait ModbusTransport: Send {
    /// Opens the link.
    async fn connect(&mut self) -> ModbusResult<()>;

    /// Closes the link. Closing an already closed link is a no-op.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Current state.
    fn state(&self) -> TransportState;

    /// Returns `true` if the link is open.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// FC03 read.
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// FC06 write.
    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()>;

    /// FC16 write.
    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ModbusResult<()>;

    /// Unit / slave id.
    fn unit_id(&self) -> u8;

    /// Human-readable endpoint for logs.
    fn display_name(&self) -> String;

    /// Performs one exchange and checks the response shape.
    async fn execute(&mut self, request: &Request) -> ModbusResult<Response> {
        match request {
            Request::ReadHolding { address, count } => {
                let words = self.read_holding_registers(*address, *count).await?;
                check_length(&words, *count)?;
                Ok(Response::Registers(words))
            }
            Request::WriteSingle { address, value } => {
                self.write_single_register(*address, *value).await?;
                Ok(Response::Written)
            }
            Request::WriteMultiple { address, values } => {
                self.write_multiple_registers(*address, values).await?;
                Ok(Response::Written)
            }
        }
    }
}

fn check_length(words: &[u16], count: u16) -> ModbusResult<()> {
    if words.len() != count as usize {
        return Err(ProtocolError::short_response(count as usize, words.len()).into());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Connecting.is_connected());
        assert_eq!(TransportState::default(), TransportState::Disconnected);
        assert_eq!(TransportState::Error.to_string(), "error");
    }

    #[test]
    fn test_request_builders() {
        assert_eq!(
            Request::read(700, 8),
            Request::ReadHolding { address: 700, count: 8 }
        );
        assert_eq!(Request::read(1, 2).function_code(), 0x03);

        let single = Request::write(553, vec![215]);
        assert_eq!(single, Request::WriteSingle { address: 553, value: 215 });
        assert!(single.is_write());

        let multiple = Request::write(850, vec![0, 1]);
        assert_eq!(multiple.function_code(), 0x10);
        assert_eq!(multiple.address(), 850);
    }

    #[test]
    fn test_request_display() {
        assert_eq!(
            Request::ReadHolding { address: 700, count: 8 }.to_string(),
            "FC03 700+8"
        );
        assert_eq!(
            Request::WriteSingle { address: 550, value: 2 }.to_string(),
            "FC06 550=2"
        );
    }

    #[test]
    fn test_response_into_registers() {
        assert_eq!(Response::Registers(vec![1, 2]).into_registers(), Some(vec![1, 2]));
        assert_eq!(Response::Written.into_registers(), None);
    }
}
