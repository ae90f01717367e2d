//! Codec for MySQL BIT columns.

use super::{Codec, Parameter, TargetType, overflow_error};
use crate::context::CodecContext;
use crate::types::{ColumnDef, MySqlType};
use flowsql_core::{Result, Value};

/// Codec for bit sets.
///
/// A BIT column payload is a big-endian byte array of `ceil(bits / 8)`
/// bytes; bit 0 of the decoded set is the least significant bit of the
/// last byte. MySQL caps BIT width at 64, so a `u64` holds any column.
pub(super) struct BitSetCodec;

impl Codec for BitSetCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Bits && column == MySqlType::Bit
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        _binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        // The payload is big-endian in both protocols; an empty buffer is
        // the empty set.
        if payload.len() > 8 {
            return Err(overflow_error("64-bit bit set", payload.len()));
        }

        let mut bits = 0u64;
        for &byte in payload {
            bits = (bits << 8) | u64::from(byte);
        }
        Ok(Value::Bits(bits))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Bits(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Bits(bits) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Bit,
            encode_bits(*bits),
            bits.to_string(),
        ))
    }
}

/// The smallest little-endian byte array preserving the highest set bit.
///
/// The empty set still travels as one zero byte for wire compatibility.
fn encode_bits(bits: u64) -> Vec<u8> {
    if bits == 0 {
        return vec![0x00];
    }

    let significant = 8 - (bits.leading_zeros() / 8) as usize;
    bits.to_le_bytes()[..significant].to_vec()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{column, context};
    use super::super::Codecs;
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn decode_big_endian_payload() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Bit, false);

        let v = codecs
            .decode(
                Some(&[0x8D, 0x56, 0x7C, 0x91, 0x3B, 0x4F, 0x61, 0xA2]),
                &col,
                TargetType::Bits,
                true,
                &ctx,
            )
            .unwrap();
        assert_eq!(v, Value::Bits(0x8D56_7C91_3B4F_61A2));

        // Bit 0 is the LSB of the last byte.
        let v = codecs
            .decode(Some(&[0x04, 0x01]), &col, TargetType::Bits, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Bits(0x0401));

        // Empty buffer decodes to the empty set.
        let v = codecs
            .decode(Some(&[]), &col, TargetType::Bits, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Bits(0));

        assert!(codecs
            .decode(Some(&[0u8; 9]), &col, TargetType::Bits, true, &ctx)
            .is_err());
    }

    #[test]
    fn encode_known_vector() {
        let codecs = Codecs::default();
        let ctx = context();

        let param = codecs
            .encode(&Value::Bits(0x8D56_7C91_3B4F_61A2), &ctx)
            .unwrap();
        assert_eq!(
            param.binary_bytes(),
            &[0xA2, 0x61, 0x4F, 0x3B, 0x91, 0x7C, 0x56, 0x8D]
        );
        assert_eq!(param.text_literal(), "10184874622288687010");
    }

    #[test]
    fn encode_trims_to_highest_set_bit() {
        assert_eq!(encode_bits(0), vec![0x00]);
        assert_eq!(encode_bits(0x01), vec![0x01]);
        assert_eq!(encode_bits(0x0100), vec![0x00, 0x01]);
        assert_eq!(encode_bits(0x0008_D567_0000_0F61), vec![0x61, 0x0F, 0x00, 0x00, 0x67, 0xD5, 0x08]);
    }

    #[test]
    fn roundtrip_through_decoder() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Bit, false);

        for bits in [0u64, 1, 0xFE_DC_BA, 0x8D56_7C91_3B4F_61A2] {
            let param = codecs.encode(&Value::Bits(bits), &ctx).unwrap();
            // The wire parameter is little-endian; the column payload is
            // big-endian, so mirror the bytes before decoding.
            let mut be = param.binary_bytes().to_vec();
            be.reverse();
            let value = codecs
                .decode(Some(&be), &col, TargetType::Bits, true, &ctx)
                .unwrap();
            assert_eq!(value, Value::Bits(bits));
        }
    }
}
