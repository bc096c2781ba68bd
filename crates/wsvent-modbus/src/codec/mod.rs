// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register word codec plus the batched reader and validated writer.
//!
//! Decoding and encoding are the exact inverse of each other and both are
//! driven by the same [`RegisterDescriptor`], so the reader and the writer
//! can never disagree on scale, width or signedness.
//!
//! ```text
//! words ──assemble (big-endian word order)──► u32
//!       ──sign-extend (signed only)─────────► raw: i64
//!       ──÷ scale────────────────────────────► physical: f64
//!
//! physical ──validate range──► quantize to step ──× scale, round──► raw
//!          ──check width────► split into words (high word first)
//! ```

mod reader;
mod writer;

pub use reader::{RangeFailure, RawReader, ReadBatch, Reading};
pub use writer::{RawWriter, WriteReceipt};

use crate::error::{ModbusResult, ProtocolError, ValidationError};
use crate::registers::{RegisterDescriptor, ValueKind};

// =============================================================================
// Decoding
// =============================================================================

/// Joins up to two words, high word first.
pub fn assemble(words: &[u16]) -> u32 {
    words
        .iter()
        .fold(0u32, |acc, word| (acc << 16) | u32::from(*word))
}

/// Decodes the raw integer of one register from its words.
pub fn decode_raw(descriptor: &RegisterDescriptor, words: &[u16]) -> ModbusResult<i64> {
    if words.len() != descriptor.words as usize {
        return Err(ProtocolError::short_response(descriptor.words as usize, words.len()).into());
    }

    let unsigned = assemble(words);
    let raw = match (descriptor.value, descriptor.words) {
        (ValueKind::Signed, 1) => i64::from(unsigned as u16 as i16),
        (ValueKind::Signed, _) => i64::from(unsigned as i32),
        (ValueKind::Flag, _) => i64::from(unsigned & 0x0001),
        _ => i64::from(unsigned),
    };
    Ok(raw)
}

/// Converts a raw integer to physical units.
pub fn to_physical(descriptor: &RegisterDescriptor, raw: i64) -> f64 {
    raw as f64 / f64::from(descriptor.scale)
}

// =============================================================================
// Encoding
// =============================================================================

/// Validates a physical value against the descriptor and encodes it.
///
/// Returns the quantized physical value actually written and its words.
pub fn encode(descriptor: &RegisterDescriptor, value: f64) -> ModbusResult<(f64, Vec<u16>)> {
    let name = descriptor.name;

    if !descriptor.access.is_writable() {
        return Err(ValidationError::read_only(name).into());
    }
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { name: name.into() }.into());
    }
    if let Some(range) = descriptor.range {
        if !range.contains(value) {
            return Err(ValidationError::out_of_range(name, value, range.min, range.max).into());
        }
    }
    if matches!(descriptor.value, ValueKind::Flag | ValueKind::Code(_)) && value.fract() != 0.0 {
        return Err(ValidationError::invalid_value(name, "expected a whole number").into());
    }

    let quantized = match descriptor.step {
        Some(step) => (value / step).round() * step,
        None => value,
    };

    let raw = (quantized * f64::from(descriptor.scale)).round() as i64;
    let words = split(descriptor, raw)?;
    Ok((quantized, words))
}

fn split(descriptor: &RegisterDescriptor, raw: i64) -> ModbusResult<Vec<u16>> {
    let (min, max) = match (descriptor.is_signed(), descriptor.words) {
        (true, 1) => (i64::from(i16::MIN), i64::from(i16::MAX)),
        (true, _) => (i64::from(i32::MIN), i64::from(i32::MAX)),
        (false, 1) => (0, i64::from(u16::MAX)),
        (false, _) => (0, i64::from(u32::MAX)),
    };
    if raw < min || raw > max {
        return Err(ValidationError::invalid_value(
            descriptor.name,
            format!("raw value {raw} does not fit {} word(s)", descriptor.words),
        )
        .into());
    }

    let bits = raw as u32;
    Ok(match descriptor.words {
        1 => vec![bits as u16],
        _ => vec![(bits >> 16) as u16, bits as u16],
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RegisterMap;

    fn descriptor(name: &str) -> RegisterDescriptor {
        *RegisterMap::standard().unwrap().descriptor(name).unwrap()
    }

    #[test]
    fn test_assemble_big_endian_words() {
        assert_eq!(assemble(&[0x0001, 0x86A0]), 100_000);
        assert_eq!(assemble(&[0x1234]), 0x1234);
    }

    #[test]
    fn test_decode_signed_temperature() {
        let d = descriptor("inlet_air_temperature");
        assert_eq!(decode_raw(&d, &[0xFFCE]).unwrap(), -50);
        assert_eq!(to_physical(&d, -50), -5.0);
        assert_eq!(decode_raw(&d, &[215]).unwrap(), 215);
    }

    #[test]
    fn test_decode_two_word_counter() {
        let d = descriptor("hours_total");
        let raw = decode_raw(&d, &[0x0001, 0x0002]).unwrap();
        assert_eq!(raw, 65_538);
        assert_eq!(to_physical(&d, raw), 65_538.0);
    }

    #[test]
    fn test_decode_flag_uses_bit_zero() {
        let d = descriptor("bypass_status");
        assert_eq!(decode_raw(&d, &[0x0003]).unwrap(), 1);
        assert_eq!(decode_raw(&d, &[0x0002]).unwrap(), 0);
    }

    #[test]
    fn test_decode_wrong_width() {
        let d = descriptor("fault_status");
        assert!(decode_raw(&d, &[1]).is_err());
    }

    #[test]
    fn test_encode_scaled_value() {
        let d = descriptor("target_temperature");
        let (value, words) = encode(&d, 21.5).unwrap();
        assert_eq!(value, 21.5);
        assert_eq!(words, vec![215]);
    }

    #[test]
    fn test_encode_quantizes_to_step() {
        let d = descriptor("target_temperature");
        let (value, words) = encode(&d, 21.3).unwrap();
        assert_eq!(value, 21.5);
        assert_eq!(words, vec![215]);
    }

    #[test]
    fn test_encode_negative_signed() {
        let d = descriptor("room_temp_adjust");
        let (_, words) = encode(&d, -1.5).unwrap();
        assert_eq!(words, vec![(-15i16) as u16]);
        assert_eq!(decode_raw(&d, &words).unwrap(), -15);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        let d = descriptor("target_temperature");
        let err = encode(&d, 30.0).unwrap_err();
        assert!(err.is_validation());
        assert!(encode(&d, 17.9).is_err());
        assert!(encode(&d, 18.0).is_ok());
        assert!(encode(&d, 25.0).is_ok());
    }

    #[test]
    fn test_encode_rejects_read_only_and_nan() {
        assert!(encode(&descriptor("supply_air_temperature"), 20.0).is_err());
        assert!(encode(&descriptor("target_temperature"), f64::NAN).is_err());
    }

    #[test]
    fn test_encode_rejects_fractional_code() {
        let d = descriptor("operation_mode");
        assert!(encode(&d, 1.5).is_err());
        assert_eq!(encode(&d, 2.0).unwrap().1, vec![2]);
    }
}
