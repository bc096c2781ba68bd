// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport.
//!
//! Wraps a `tokio-modbus` client context. Each call maps the nested
//! `timeout -> transport -> exception` result of the library into the
//! driver's [`ModbusError`] taxonomy.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{Context as ModbusContext, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, ExceptionCode};

use crate::error::{ModbusError, ModbusResult, ProtocolError, TimeoutKind, TransportError};
use crate::types::TcpConfig;

use super::transport::{ModbusTransport, TransportState};

// =============================================================================
// ModbusTcpTransport
// =============================================================================

/// Modbus TCP link to the ventilation unit (or its Ethernet gateway).
///
/// # Example
///
/// ```rust,ignore
/// use wsvent_modbus::client::{ModbusTcpTransport, ModbusTransport};
/// use wsvent_modbus::types::TcpConfig;
///
/// let mut transport = ModbusTcpTransport::new(TcpConfig::new("192.168.1.50"));
/// transport.connect().await?;
/// let words = transport.read_holding_registers(700, 8).await?;
/// ```
pub struct ModbusTcpTransport {
    config: TcpConfig,
    context: Option<ModbusContext>,
    state: TransportState,
}

impl ModbusTcpTransport {
    /// Creates a disconnected transport.
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            context: None,
            state: TransportState::Disconnected,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Takes owned values so no borrow of the transport lives across the
    /// lookup; the transport itself is not `Sync`.
    async fn resolve_address(host: String, addr_str: String) -> ModbusResult<SocketAddr> {
        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(addr_str.as_str()).await.map_err(|e| {
            ModbusError::transport(TransportError::DnsResolutionFailed {
                hostname: host.clone(),
                source: Some(e),
            })
        })?;

        addrs
            .next()
            .ok_or_else(|| ModbusError::transport(TransportError::dns_failed(&host)))
    }

    fn context(&mut self) -> ModbusResult<&mut ModbusContext> {
        self.context.as_mut().ok_or_else(ModbusError::not_connected)
    }

    fn observe(&mut self, error: &ModbusError) {
        if is_broken_link(error) {
            self.context = None;
            self.state = TransportState::Error;
        }
    }
}

/// Maps a `tokio-modbus` error to the driver taxonomy.
pub(crate) fn map_modbus_error(error: TokioModbusError, request_timeout: Duration) -> ModbusError {
    match error {
        TokioModbusError::Transport(io_error) => match io_error.kind() {
            io::ErrorKind::TimedOut => {
                ModbusError::transport(TransportError::timeout(TimeoutKind::Response, request_timeout))
            }
            io::ErrorKind::UnexpectedEof => {
                ModbusError::transport(TransportError::closed(Some("unexpected end of stream".into())))
            }
            _ => ModbusError::transport(TransportError::from(io_error)),
        },
        TokioModbusError::Protocol(protocol_error) => {
            ModbusError::protocol(ProtocolError::unexpected(protocol_error.to_string()))
        }
    }
}

/// Returns `true` if the socket or port can no longer be used. Timeouts
/// leave the link open.
pub(crate) fn is_broken_link(error: &ModbusError) -> bool {
    matches!(
        error,
        ModbusError::Transport(
            TransportError::Closed { .. } | TransportError::NotConnected | TransportError::Io { .. }
        )
    )
}

/// Maps a device exception response.
pub(crate) fn map_exception(function_code: u8, exception: ExceptionCode) -> ModbusError {
    ModbusError::exception(function_code, u8::from(exception))
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state == TransportState::Connected {
            return Ok(());
        }

        self.state = TransportState::Connecting;

        let lookup = Self::resolve_address(self.config.host.clone(), self.config.socket_addr());
        let socket_addr = match lookup.await {
            Ok(addr) => addr,
            Err(e) => {
                self.state = TransportState::Error;
                return Err(e);
            }
        };

        let host = self.config.host.clone();
        let port = self.config.port;
        let nodelay = self.config.tcp_nodelay;
        let slave = Slave(self.config.unit_id);

        let connect_future = async move {
            let stream = TcpStream::connect(socket_addr)
                .await
                .map_err(|e| ModbusError::transport(TransportError::refused_with(host, port, e)))?;

            stream.set_nodelay(nodelay).ok();

            Ok::<_, ModbusError>(tcp::attach_slave(stream, slave))
        };

        let result = timeout(self.config.connect_timeout, connect_future)
            .await
            .map_err(|_| {
                ModbusError::transport(TransportError::timeout(
                    TimeoutKind::Connect,
                    self.config.connect_timeout,
                ))
            })
            .and_then(|inner| inner);

        match result {
            Ok(ctx) => {
                self.context = Some(ctx);
                self.state = TransportState::Connected;
                tracing::info!(
                    host = %self.config.host,
                    port = self.config.port,
                    unit_id = self.config.unit_id,
                    "Connected to ventilation unit over Modbus TCP"
                );
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Error;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(error = %e, "Error while closing Modbus TCP connection");
            }
            tracing::debug!(
                host = %self.config.host,
                port = self.config.port,
                "Disconnected from ventilation unit"
            );
        }
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let limit = self.config.timeout;
        let ctx = self.context()?;

        let result = timeout(limit, ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| ModbusError::transport(TransportError::timeout(TimeoutKind::Read, limit)))
            .and_then(|r| r.map_err(|e| map_modbus_error(e, limit)))
            .and_then(|r| r.map_err(|e| map_exception(0x03, e)));

        if let Err(e) = &result {
            self.observe(e);
        }
        result
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        let limit = self.config.timeout;
        let ctx = self.context()?;

        let result = timeout(limit, ctx.write_single_register(address, value))
            .await
            .map_err(|_| ModbusError::transport(TransportError::timeout(TimeoutKind::Write, limit)))
            .and_then(|r| r.map_err(|e| map_modbus_error(e, limit)))
            .and_then(|r| r.map_err(|e| map_exception(0x06, e)));

        if let Err(e) = &result {
            self.observe(e);
        }
        result
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let limit = self.config.timeout;
        let ctx = self.context()?;

        let result = timeout(limit, ctx.write_multiple_registers(address, values))
            .await
            .map_err(|_| ModbusError::transport(TransportError::timeout(TimeoutKind::Write, limit)))
            .and_then(|r| r.map_err(|e| map_modbus_error(e, limit)))
            .and_then(|r| r.map_err(|e| map_exception(0x10, e)));

        if let Err(e) = &result {
            self.observe(e);
        }
        result
    }

    fn unit_id(&self) -> u8 {
        self.config.unit_id
    }

    fn display_name(&self) -> String {
        format!(
            "Modbus TCP {}:{} (unit {})",
            self.config.host, self.config.port, self.config.unit_id
        )
    }
}

impl std::fmt::Debug for ModbusTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpTransport")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("unit_id", &self.config.unit_id)
            .field("state", &self.state)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_disconnected() {
        let transport = ModbusTcpTransport::new(TcpConfig::new("127.0.0.1"));
        assert_eq!(transport.config().port, 502);
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_display_name() {
        let transport =
            ModbusTcpTransport::new(TcpConfig::new("ws320.local").with_port(5020).with_unit_id(5));
        assert_eq!(transport.display_name(), "Modbus TCP ws320.local:5020 (unit 5)");
    }

    #[tokio::test]
    async fn test_resolve_address_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let config = TcpConfig::new("127.0.0.1").with_port(5020);
        let lookup = ModbusTcpTransport::resolve_address(config.host.clone(), config.socket_addr());
        assert_send(&lookup);
        assert_eq!(lookup.await.unwrap(), "127.0.0.1:5020".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_debug_impl() {
        let transport = ModbusTcpTransport::new(TcpConfig::new("127.0.0.1"));
        let debug_str = format!("{:?}", transport);
        assert!(debug_str.contains("127.0.0.1"));
        assert!(debug_str.contains("502"));
    }

    #[test]
    fn test_map_modbus_error() {
        let limit = Duration::from_secs(3);

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let error = map_modbus_error(TokioModbusError::Transport(timed_out), limit);
        assert!(error.is_link_failure());
        assert_eq!(error.category(), "transport");

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let error = map_modbus_error(TokioModbusError::Transport(reset), limit);
        assert!(matches!(
            error,
            ModbusError::Transport(TransportError::Closed { .. })
        ));
    }

    #[test]
    fn test_map_exception() {
        let error = map_exception(0x03, ExceptionCode::IllegalDataAddress);
        assert!(!error.is_link_failure());
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("Illegal Data Address"));
    }

    #[tokio::test]
    async fn test_read_without_connect_fails() {
        let mut transport = ModbusTcpTransport::new(TcpConfig::new("127.0.0.1"));
        let result = transport.read_holding_registers(700, 1).await;
        assert!(matches!(
            result,
            Err(ModbusError::Transport(TransportError::NotConnected))
        ));
    }
}
