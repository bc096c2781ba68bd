// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched register reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::{ConnectionManager, Request};
use crate::error::{ModbusError, ModbusResult, ProtocolError, ValidationError};
use crate::registers::{ReadRange, RegisterMap};

use super::{decode_raw, to_physical};

// =============================================================================
// ReadBatch
// =============================================================================

/// One decoded register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Assembled and sign-extended register integer.
    pub raw: i64,
    /// Physical value (`raw / scale`).
    pub value: f64,
}

/// A read range that could not be refreshed.
#[derive(Debug, Clone)]
pub struct RangeFailure {
    /// The range that failed.
    pub range: ReadRange,
    /// Final error after retries.
    pub error: Arc<ModbusError>,
}

/// Result of [`RawReader::read_batch`]: decoded readings plus per-range
/// failures.
#[derive(Debug, Clone, Default)]
pub struct ReadBatch {
    /// Readings by register name.
    pub readings: BTreeMap<&'static str, Reading>,
    /// Ranges that failed.
    pub failures: Vec<RangeFailure>,
}

impl ReadBatch {
    /// Reading for `name`, if its range succeeded.
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.readings.get(name)
    }

    /// Error for `name`, if its range failed.
    pub fn error_for(&self, name: &str) -> Option<&Arc<ModbusError>> {
        self.failures
            .iter()
            .find(|f| f.range.names.iter().any(|n| *n == name))
            .map(|f| &f.error)
    }

    /// Returns `true` when every range succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` when nothing could be read.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// =============================================================================
// RawReader
// =============================================================================

/// Groups names into contiguous ranges, issues one request per range and
/// decodes the returned words.
#[derive(Debug, Clone)]
pub struct RawReader {
    connection: Arc<ConnectionManager>,
    map: Arc<RegisterMap>,
}

impl RawReader {
    /// Creates a reader sharing the given connection and map.
    pub fn new(connection: Arc<ConnectionManager>, map: Arc<RegisterMap>) -> Self {
        Self { connection, map }
    }

    /// The register map.
    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Reads the named registers.
    ///
    /// Unknown or write-only names fail up front without any I/O. A failing
    /// range is recorded in [`ReadBatch::failures`] and does not stop the
    /// remaining ranges. Only shutdown aborts the whole batch.
    pub async fn read_batch(&self, names: &[&str]) -> ModbusResult<ReadBatch> {
        let ranges = self.map.group(names)?;
        let mut batch = ReadBatch::default();

        for range in ranges {
            match self.read_range(&range).await {
                Ok(words) => {
                    if let Err(error) = self.decode_range(&range, &words, &mut batch) {
                        batch.failures.push(RangeFailure {
                            range,
                            error: Arc::new(error),
                        });
                    }
                }
                Err(ModbusError::ShutDown) => return Err(ModbusError::ShutDown),
                Err(error) => {
                    tracing::warn!(
                        range = %range,
                        registers = range.names.len(),
                        error = %error,
                        "Register range could not be read"
                    );
                    batch.failures.push(RangeFailure {
                        range,
                        error: Arc::new(error),
                    });
                }
            }
        }

        tracing::debug!(
            readings = batch.readings.len(),
            failed_ranges = batch.failures.len(),
            "Read batch finished"
        );
        Ok(batch)
    }

    /// Reads every readable register in the map.
    pub async fn read_all(&self) -> ModbusResult<ReadBatch> {
        let names = self.map.readable_names();
        self.read_batch(&names).await
    }

    /// Reads a single register and returns its error directly.
    pub async fn read(&self, name: &str) -> ModbusResult<Reading> {
        let descriptor = self.map.descriptor(name)?;
        if !descriptor.access.is_readable() {
            return Err(ValidationError::write_only(name).into());
        }

        let words = self
            .read_range(&ReadRange {
                start: descriptor.address,
                count: descriptor.words,
                names: vec![descriptor.name],
            })
            .await?;
        let raw = decode_raw(descriptor, &words)?;
        Ok(Reading {
            raw,
            value: to_physical(descriptor, raw),
        })
    }

    async fn read_range(&self, range: &ReadRange) -> ModbusResult<Vec<u16>> {
        self.connection
            .execute(Request::read(range.start, range.count))
            .await?
            .into_registers()
            .ok_or_else(|| ProtocolError::unexpected("write acknowledgement for a read").into())
    }

    fn decode_range(
        &self,
        range: &ReadRange,
        words: &[u16],
        batch: &mut ReadBatch,
    ) -> ModbusResult<()> {
        let mut decoded = Vec::with_capacity(range.names.len());

        for name in &range.names {
            let descriptor = self.map.descriptor(name)?;
            let offset = usize::from(descriptor.address - range.start);
            let end = offset + usize::from(descriptor.words);
            let slice = words
                .get(offset..end)
                .ok_or_else(|| ProtocolError::short_response(usize::from(range.count), words.len()))?;
            let raw = decode_raw(descriptor, slice)?;
            decoded.push((
                descriptor.name,
                Reading {
                    raw,
                    value: to_physical(descriptor, raw),
                },
            ));
        }

        batch.readings.extend(decoded);
        Ok(())
    }
}
