// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU transport over an RS-485 serial adapter.
//!
//! The WS units ship with 9600 baud, 8 data bits, even parity and one stop
//! bit; all four are configurable through [`RtuConfig`].

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{Context as ModbusContext, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_serial::{
    DataBits as SerialDataBits, Parity as SerialParity, SerialPortBuilderExt,
    StopBits as SerialStopBits,
};

use crate::error::{ModbusError, ModbusResult, TimeoutKind, TransportError};
use crate::types::{DataBits, Parity, RtuConfig, StopBits};

use super::tcp::{is_broken_link, map_exception, map_modbus_error};
use super::transport::{ModbusTransport, TransportState};

// =============================================================================
// ModbusRtuTransport
// =============================================================================

/// Modbus RTU link over a serial port.
///
/// # Example
///
/// ```rust,ignore
/// use wsvent_modbus::client::{ModbusRtuTransport, ModbusTransport};
/// use wsvent_modbus::types::RtuConfig;
///
/// let mut transport = ModbusRtuTransport::new(RtuConfig::new("/dev/ttyUSB0"));
/// transport.connect().await?;
/// ```
pub struct ModbusRtuTransport {
    config: RtuConfig,
    context: Option<ModbusContext>,
    state: TransportState,
}

impl ModbusRtuTransport {
    /// Creates a closed transport.
    pub fn new(config: RtuConfig) -> Self {
        Self {
            config,
            context: None,
            state: TransportState::Disconnected,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RtuConfig {
        &self.config
    }

    /// Returns the serial port path.
    pub fn port(&self) -> &str {
        &self.config.port
    }

    fn convert_data_bits(bits: DataBits) -> SerialDataBits {
        match bits {
            DataBits::Seven => SerialDataBits::Seven,
            DataBits::Eight => SerialDataBits::Eight,
        }
    }

    fn convert_parity(parity: Parity) -> SerialParity {
        match parity {
            Parity::None => SerialParity::None,
            Parity::Odd => SerialParity::Odd,
            Parity::Even => SerialParity::Even,
        }
    }

    fn convert_stop_bits(bits: StopBits) -> SerialStopBits {
        match bits {
            StopBits::One => SerialStopBits::One,
            StopBits::Two => SerialStopBits::Two,
        }
    }

    fn map_serial_error(&self, e: tokio_serial::Error) -> TransportError {
        let port = self.config.port.clone();
        match e.kind {
            tokio_serial::ErrorKind::NoDevice => TransportError::serial_not_found(port),
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::serial_access_denied(port)
            }
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                TransportError::serial_not_found(port)
            }
            _ => TransportError::SerialConfigurationFailed {
                port,
                message: e.to_string(),
            },
        }
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

#[async_trait]
impl ModbusTransport for ModbusRtuTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state == TransportState::Connected {
            return Ok(());
        }

        self.state = TransportState::Connecting;

        let builder = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(Self::convert_data_bits(self.config.data_bits))
            .parity(Self::convert_parity(self.config.parity))
            .stop_bits(Self::convert_stop_bits(self.config.stop_bits));

        let serial = match builder.open_native_async() {
            Ok(serial) => serial,
            Err(e) => {
                self.state = TransportState::Error;
                return Err(ModbusError::transport(self.map_serial_error(e)));
            }
        };

        self.context = Some(rtu::attach_slave(serial, Slave(self.config.unit_id)));
        self.state = TransportState::Connected;

        tracing::info!(
            port = %self.config.port,
            frame = %self.config.frame_format(),
            unit_id = self.config.unit_id,
            "Opened Modbus RTU serial link"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(error = %e, "Error while closing serial port");
            }
            tracing::debug!(port = %self.config.port, "Closed Modbus RTU serial link");
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
            "Modbus RTU {} @{}bps (unit {})",
            self.config.port, self.config.baud_rate, self.config.unit_id
        )
    }
}

impl std::fmt::Debug for ModbusRtuTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusRtuTransport")
            .field("port", &self.config.port)
            .field("frame", &self.config.frame_format())
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
    fn test_new_is_closed() {
        let transport = ModbusRtuTransport::new(RtuConfig::new("/dev/ttyUSB0"));
        assert_eq!(transport.port(), "/dev/ttyUSB0");
        assert_eq!(transport.config().baud_rate, 9600);
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[test]
    fn test_display_name() {
        let transport = ModbusRtuTransport::new(
            RtuConfig::new("/dev/ttyAMA0").with_baud_rate(19200).with_unit_id(3),
        );
        assert_eq!(transport.display_name(), "Modbus RTU /dev/ttyAMA0 @19200bps (unit 3)");
    }

    #[test]
    fn test_convert_data_bits() {
        assert_eq!(
            ModbusRtuTransport::convert_data_bits(DataBits::Eight),
            SerialDataBits::Eight
        );
        assert_eq!(
            ModbusRtuTransport::convert_data_bits(DataBits::Seven),
            SerialDataBits::Seven
        );
    }

    #[test]
    fn test_convert_parity() {
        assert_eq!(ModbusRtuTransport::convert_parity(Parity::Even), SerialParity::Even);
        assert_eq!(ModbusRtuTransport::convert_parity(Parity::None), SerialParity::None);
    }

    #[test]
    fn test_convert_stop_bits() {
        assert_eq!(ModbusRtuTransport::convert_stop_bits(StopBits::One), SerialStopBits::One);
        assert_eq!(ModbusRtuTransport::convert_stop_bits(StopBits::Two), SerialStopBits::Two);
    }

    #[test]
    fn test_serial_error_mapping() {
        let transport = ModbusRtuTransport::new(RtuConfig::new("/dev/ttyUSB9"));

        let missing = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            transport.map_serial_error(missing),
            TransportError::SerialPortNotFound { .. }
        ));

        let denied = tokio_serial::Error::new(
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        let mapped = transport.map_serial_error(denied);
        assert!(matches!(mapped, TransportError::SerialPortAccessDenied { .. }));
        assert!(!mapped.is_retryable());
    }

    #[test]
    fn test_debug_impl() {
        let transport = ModbusRtuTransport::new(RtuConfig::new("/dev/ttyUSB0"));
        let debug_str = format!("{:?}", transport);
        assert!(debug_str.contains("/dev/ttyUSB0"));
        assert!(debug_str.contains("9600 8E1"));
    }
}
