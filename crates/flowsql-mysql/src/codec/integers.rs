//! Codecs for booleans and integers of every width and signedness.

use super::{
    Codec, Parameter, TargetType, overflow_error, parse_error, parse_int_ascii, parse_uint_ascii,
    underflow_error,
};
use crate::context::CodecContext;
use crate::types::{ColumnDef, MySqlType};
use flowsql_core::{Result, Value};

/// Decode any numeric column payload to `i64`.
///
/// Floating point and DECIMAL columns truncate toward zero, matching the
/// narrowing rules for integer targets.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn decode_i64(payload: &[u8], column: &ColumnDef, binary: bool) -> Result<i64> {
    let ty = column.mysql_type();

    if !binary {
        return match ty {
            MySqlType::Float | MySqlType::Double => {
                let text = std::str::from_utf8(payload)
                    .map_err(|_| parse_error("integer", payload))?;
                let value: f64 = text.trim().parse().map_err(|_| parse_error("integer", payload))?;
                Ok(value as i64)
            }
            MySqlType::Decimal => decimal_to_i64(payload),
            _ if ty.is_unsigned() => {
                let value = parse_uint_ascii(payload)?;
                i64::try_from(value).map_err(|_| overflow_error("i64", value))
            }
            _ => parse_int_ascii(payload),
        };
    }

    match ty {
        MySqlType::TinyInt => read_fixed(payload, 1, "TINYINT").map(|b| i64::from(b[0] as i8)),
        MySqlType::TinyIntUnsigned => read_fixed(payload, 1, "TINYINT").map(|b| i64::from(b[0])),
        MySqlType::SmallInt | MySqlType::Year => read_fixed(payload, 2, "SMALLINT")
            .map(|b| i64::from(i16::from_le_bytes([b[0], b[1]]))),
        MySqlType::SmallIntUnsigned => read_fixed(payload, 2, "SMALLINT")
            .map(|b| i64::from(u16::from_le_bytes([b[0], b[1]]))),
        // MySQL transmits 32-bit two's complement for 24-bit integers.
        MySqlType::MediumInt | MySqlType::Int => read_fixed(payload, 4, "INT")
            .map(|b| i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
        MySqlType::MediumIntUnsigned | MySqlType::IntUnsigned => read_fixed(payload, 4, "INT")
            .map(|b| i64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
        MySqlType::BigInt => read_fixed(payload, 8, "BIGINT").map(|b| {
            i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        }),
        MySqlType::BigIntUnsigned => {
            let b = read_fixed(payload, 8, "BIGINT")?;
            let value = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
            i64::try_from(value).map_err(|_| overflow_error("i64", value))
        }
        MySqlType::Float => read_fixed(payload, 4, "FLOAT")
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64),
        MySqlType::Double => read_fixed(payload, 8, "DOUBLE").map(|b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as i64
        }),
        MySqlType::Decimal => decimal_to_i64(payload),
        _ => Err(parse_error("integer", payload)),
    }
}

/// Decode any numeric column payload to `u64`; negative values overflow.
pub(super) fn decode_u64(payload: &[u8], column: &ColumnDef, binary: bool) -> Result<u64> {
    if binary && column.mysql_type() == MySqlType::BigIntUnsigned {
        let b = read_fixed(payload, 8, "BIGINT")?;
        return Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]));
    }
    if !binary && column.mysql_type() == MySqlType::BigIntUnsigned {
        return parse_uint_ascii(payload);
    }

    let value = decode_i64(payload, column, binary)?;
    u64::try_from(value).map_err(|_| overflow_error("u64", value))
}

fn read_fixed<'a>(payload: &'a [u8], len: usize, what: &'static str) -> Result<&'a [u8]> {
    if payload.len() < len {
        return Err(underflow_error(what, payload));
    }
    Ok(&payload[..len])
}

/// Truncate an ASCII decimal toward zero.
fn decimal_to_i64(payload: &[u8]) -> Result<i64> {
    let end = payload
        .iter()
        .position(|&b| b == b'.')
        .unwrap_or(payload.len());
    let integral = &payload[..end];

    match integral {
        b"" | b"-" | b"+" => Ok(0),
        _ => parse_int_ascii(integral),
    }
}

/// The smallest on-wire integer parameter that losslessly represents `v`.
///
/// Unsigned rungs sit between the signed ones, so 200 travels as one
/// TINYINT UNSIGNED byte and 40000 as a two-byte SMALLINT UNSIGNED.
pub(super) fn narrowest_parameter(v: i64) -> Parameter {
    let text = v.to_string();

    if let Ok(b) = i8::try_from(v) {
        return Parameter::new(MySqlType::TinyInt, vec![b as u8], text);
    }
    if let Ok(b) = u8::try_from(v) {
        return Parameter::new(MySqlType::TinyIntUnsigned, vec![b], text);
    }
    if let Ok(s) = i16::try_from(v) {
        return Parameter::new(MySqlType::SmallInt, s.to_le_bytes().to_vec(), text);
    }
    if let Ok(s) = u16::try_from(v) {
        return Parameter::new(MySqlType::SmallIntUnsigned, s.to_le_bytes().to_vec(), text);
    }
    if let Ok(i) = i32::try_from(v) {
        return Parameter::new(MySqlType::Int, i.to_le_bytes().to_vec(), text);
    }
    if let Ok(i) = u32::try_from(v) {
        return Parameter::new(MySqlType::IntUnsigned, i.to_le_bytes().to_vec(), text);
    }
    Parameter::new(MySqlType::BigInt, v.to_le_bytes().to_vec(), text)
}

fn narrowest_unsigned_parameter(v: u64) -> Parameter {
    match i64::try_from(v) {
        Ok(signed) => narrowest_parameter(signed),
        Err(_) => Parameter::new(
            MySqlType::BigIntUnsigned,
            v.to_le_bytes().to_vec(),
            v.to_string(),
        ),
    }
}

/// Codec for `bool`, mapped over TINYINT(1) and BIT by convention.
pub(super) struct BooleanCodec;

impl Codec for BooleanCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Bool && (column.is_integer() || column == MySqlType::Bit)
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        if column.mysql_type() == MySqlType::Bit {
            // BIT payloads are big-endian bytes in both protocols.
            return Ok(Value::Bool(payload.iter().any(|&b| b != 0)));
        }
        Ok(Value::Bool(decode_i64(payload, column, binary)? != 0))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Bool(v) = value else { unreachable!() };
        let byte = u8::from(*v);
        Ok(Parameter::new(
            MySqlType::TinyInt,
            vec![byte],
            byte.to_string(),
        ))
    }
}

macro_rules! narrowing_codec {
    ($name:ident, $target:path, $native:ty, $variant:path, $expected:literal) => {
        pub(super) struct $name;

        impl Codec for $name {
            fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
                target == $target && column.is_numeric()
            }

            fn decode(
                &self,
                payload: &[u8],
                column: &ColumnDef,
                _target: TargetType,
                binary: bool,
                _ctx: &CodecContext,
            ) -> Result<Value> {
                let wide = decode_i64(payload, column, binary)?;
                let narrow = <$native>::try_from(wide)
                    .map_err(|_| overflow_error($expected, wide))?;
                Ok($variant(narrow))
            }

            fn can_encode(&self, value: &Value) -> bool {
                matches!(value, $variant(_))
            }

            fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
                let $variant(v) = value else { unreachable!() };
                Ok(narrowest_parameter(i64::from(*v)))
            }
        }
    };
}

narrowing_codec!(ByteCodec, TargetType::I8, i8, Value::TinyInt, "i8");
narrowing_codec!(ShortCodec, TargetType::I16, i16, Value::SmallInt, "i16");
narrowing_codec!(IntegerCodec, TargetType::I32, i32, Value::Int, "i32");

/// Codec for `i64`, the widest signed integer target.
pub(super) struct LongCodec;

impl Codec for LongCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::I64 && column.is_numeric()
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        Ok(Value::BigInt(decode_i64(payload, column, binary)?))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::BigInt(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::BigInt(v) = value else { unreachable!() };
        Ok(narrowest_parameter(*v))
    }
}

/// Codec for `u64`, needed for the full BIGINT UNSIGNED range.
pub(super) struct UnsignedLongCodec;

impl Codec for UnsignedLongCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::U64 && column.is_numeric()
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        Ok(Value::UnsignedBigInt(decode_u64(payload, column, binary)?))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::UnsignedBigInt(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::UnsignedBigInt(v) = value else { unreachable!() };
        Ok(narrowest_unsigned_parameter(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{column, context};
    use super::super::{Codecs, TargetType};
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn narrowing_chooses_smallest_wire_type() {
        let param = narrowest_parameter(200);
        assert_eq!(param.mysql_type(), MySqlType::TinyIntUnsigned);
        assert_eq!(param.binary_bytes(), &[0xC8]);

        let param = narrowest_parameter(40_000);
        assert_eq!(param.mysql_type(), MySqlType::SmallIntUnsigned);
        assert_eq!(param.binary_bytes(), &[0x40, 0x9C]);

        let param = narrowest_parameter(1_000_000_000);
        assert_eq!(param.mysql_type(), MySqlType::Int);
        assert_eq!(param.binary_bytes(), &1_000_000_000i32.to_le_bytes()[..]);

        let param = narrowest_parameter(-1);
        assert_eq!(param.mysql_type(), MySqlType::TinyInt);
        assert_eq!(param.binary_bytes(), &[0xFF]);

        let param = narrowest_parameter(i64::MAX);
        assert_eq!(param.mysql_type(), MySqlType::BigInt);

        let param = narrowest_unsigned_parameter(u64::MAX);
        assert_eq!(param.mysql_type(), MySqlType::BigIntUnsigned);
        assert_eq!(param.binary_bytes(), &[0xFF; 8]);
    }

    #[test]
    fn binary_decode_widths() {
        let codecs = Codecs::default();
        let ctx = context();

        let col = column(FieldType::Tiny, false);
        let v = codecs
            .decode(Some(&[0xFF]), &col, TargetType::I32, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Int(-1));

        let col = column(FieldType::Tiny, true);
        let v = codecs
            .decode(Some(&[0xFF]), &col, TargetType::I32, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Int(255));

        // MEDIUMINT arrives as 32-bit two's complement, little endian.
        let col = column(FieldType::Int24, false);
        let v = codecs
            .decode(Some(&(-8_388_608i32).to_le_bytes()), &col, TargetType::I32, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Int(-8_388_608));

        let col = column(FieldType::LongLong, false);
        let v = codecs
            .decode(Some(&i64::MIN.to_le_bytes()), &col, TargetType::I64, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::BigInt(i64::MIN));
    }

    #[test]
    fn text_decode_accepts_signs_and_rejects_garbage() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Long, false);

        assert_eq!(
            codecs
                .decode(Some(b"+42"), &col, TargetType::I32, false, &ctx)
                .unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            codecs
                .decode(Some(b"-42"), &col, TargetType::I32, false, &ctx)
                .unwrap(),
            Value::Int(-42)
        );
        assert!(codecs.decode(Some(b""), &col, TargetType::I32, false, &ctx).is_err());
        assert!(codecs
            .decode(Some(b"4 2"), &col, TargetType::I32, false, &ctx)
            .is_err());
    }

    #[test]
    fn widening_decode_checks_overflow() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::LongLong, false);

        // A BIGINT payload that fits i32 narrows fine.
        let v = codecs
            .decode(Some(&1_000i64.to_le_bytes()), &col, TargetType::I32, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Int(1_000));

        // One that does not is a decode error, not a wrap.
        let err = codecs
            .decode(
                Some(&5_000_000_000i64.to_le_bytes()),
                &col,
                TargetType::I32,
                true,
                &ctx,
            )
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn decimal_column_truncates_toward_zero() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::NewDecimal, false);

        assert_eq!(
            codecs
                .decode(Some(b"12.9"), &col, TargetType::I32, false, &ctx)
                .unwrap(),
            Value::Int(12)
        );
        assert_eq!(
            codecs
                .decode(Some(b"-12.9"), &col, TargetType::I32, false, &ctx)
                .unwrap(),
            Value::Int(-12)
        );
    }

    #[test]
    fn unsigned_target_rejects_negatives() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Long, false);

        assert!(codecs
            .decode(Some(b"-1"), &col, TargetType::U64, false, &ctx)
            .is_err());

        let col = column(FieldType::LongLong, true);
        assert_eq!(
            codecs
                .decode(Some(b"18446744073709551615"), &col, TargetType::U64, false, &ctx)
                .unwrap(),
            Value::UnsignedBigInt(u64::MAX)
        );
    }

    #[test]
    fn boolean_from_tiny_and_bit() {
        let codecs = Codecs::default();
        let ctx = context();

        let col = column(FieldType::Tiny, false);
        assert_eq!(
            codecs
                .decode(Some(&[1]), &col, TargetType::Bool, true, &ctx)
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            codecs
                .decode(Some(b"0"), &col, TargetType::Bool, false, &ctx)
                .unwrap(),
            Value::Bool(false)
        );

        let col = column(FieldType::Bit, false);
        assert_eq!(
            codecs
                .decode(Some(&[0x00, 0x04]), &col, TargetType::Bool, true, &ctx)
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn encode_roundtrip_through_matching_decoder() {
        let codecs = Codecs::default();
        let ctx = context();

        let param = codecs.encode(&Value::Int(40_000), &ctx).unwrap();
        assert_eq!(param.mysql_type(), MySqlType::SmallIntUnsigned);

        // Feed the wire bytes back through the matching column decoder.
        let col = column(FieldType::Short, true);
        let value = codecs
            .decode(Some(param.binary_bytes()), &col, TargetType::I32, true, &ctx)
            .unwrap();
        assert_eq!(value, Value::Int(40_000));
    }
}
