// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Validated register writes.
//!
//! [`RawWriter::write`] is the only code path that turns a value into a
//! write request. It either reaches [`ConnectionManager::execute`] or returns
//! an error; there is no silent no-op.

use std::sync::Arc;

use serde::Serialize;

use crate::client::{ConnectionManager, Request, Response};
use crate::error::{ModbusResult, ProtocolError};
use crate::registers::RegisterMap;

use super::encode;

/// Acknowledged write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReceipt {
    /// Register name.
    pub name: &'static str,
    /// Register address.
    pub address: u16,
    /// Physical value written (after step quantization).
    pub value: f64,
    /// Words sent.
    pub words: Vec<u16>,
}

/// Encodes physical values and writes them through the connection manager.
#[derive(Debug, Clone)]
pub struct RawWriter {
    connection: Arc<ConnectionManager>,
    map: Arc<RegisterMap>,
}

impl RawWriter {
    /// Creates a writer sharing the given connection and map.
    pub fn new(connection: Arc<ConnectionManager>, map: Arc<RegisterMap>) -> Self {
        Self { connection, map }
    }

    /// Validates and encodes without touching the network.
    pub fn prepare(&self, name: &str, value: f64) -> ModbusResult<(WriteReceipt, Request)> {
        let descriptor = self.map.descriptor(name)?;
        let (value, words) = encode(descriptor, value)?;
        let request = Request::write(descriptor.address, words.clone());

        Ok((
            WriteReceipt {
                name: descriptor.name,
                address: descriptor.address,
                value,
                words,
            },
            request,
        ))
    }

    /// Writes `value` (physical units) to the named register.
    ///
    /// Validation failures return before any request is issued.
    pub async fn write(&self, name: &str, value: f64) -> ModbusResult<WriteReceipt> {
        let (receipt, request) = self.prepare(name, value)?;

        match self.connection.execute(request).await? {
            Response::Written => {
                tracing::info!(
                    register = receipt.name,
                    address = receipt.address,
                    value = receipt.value,
                    "Register written"
                );
                Ok(receipt)
            }
            Response::Registers(_) => {
                Err(ProtocolError::unexpected("register data in reply to a write").into())
            }
        }
    }
}
