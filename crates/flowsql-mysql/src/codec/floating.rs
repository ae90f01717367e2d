//! Codecs for floating point and DECIMAL values.

use super::{Codec, Parameter, TargetType, parse_error, underflow_error};
use crate::context::CodecContext;
use crate::protocol::PacketWriter;
use crate::types::{ColumnDef, MySqlType};
use flowsql_core::{Result, Value};

fn decode_f64(payload: &[u8], column: &ColumnDef, binary: bool) -> Result<f64> {
    let ty = column.mysql_type();

    if binary {
        return match ty {
            MySqlType::Float => {
                if payload.len() < 4 {
                    return Err(underflow_error("FLOAT", payload));
                }
                Ok(f64::from(f32::from_le_bytes([
                    payload[0], payload[1], payload[2], payload[3],
                ])))
            }
            MySqlType::Double => {
                if payload.len() < 8 {
                    return Err(underflow_error("DOUBLE", payload));
                }
                Ok(f64::from_le_bytes([
                    payload[0], payload[1], payload[2], payload[3], payload[4], payload[5],
                    payload[6], payload[7],
                ]))
            }
            // DECIMAL stays ASCII on the wire in both protocols.
            MySqlType::Decimal => parse_ascii_f64(payload),
            _ => {
                let wide = super::integers::decode_i64(payload, column, binary)?;
                #[allow(clippy::cast_precision_loss)]
                Ok(wide as f64)
            }
        };
    }

    match ty {
        _ if ty.is_integer() => {
            let wide = super::integers::decode_i64(payload, column, binary)?;
            #[allow(clippy::cast_precision_loss)]
            Ok(wide as f64)
        }
        _ => parse_ascii_f64(payload),
    }
}

fn parse_ascii_f64(payload: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(payload).map_err(|_| parse_error("float", payload))?;
    if text.is_empty() {
        return Err(parse_error("float", payload));
    }
    text.trim().parse().map_err(|_| parse_error("float", payload))
}

/// Codec for `f32`.
pub(super) struct FloatCodec;

impl Codec for FloatCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::F32 && column.is_numeric()
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        #[allow(clippy::cast_possible_truncation)]
        Ok(Value::Float(decode_f64(payload, column, binary)? as f32))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Float(v) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Float,
            v.to_le_bytes().to_vec(),
            v.to_string(),
        ))
    }
}

/// Codec for `f64`.
pub(super) struct DoubleCodec;

impl Codec for DoubleCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::F64 && column.is_numeric()
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        Ok(Value::Double(decode_f64(payload, column, binary)?))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Double(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Double(v) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Double,
            v.to_le_bytes().to_vec(),
            v.to_string(),
        ))
    }
}

/// Codec for DECIMAL values, kept in their exact ASCII form.
pub(super) struct DecimalCodec;

impl Codec for DecimalCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Decimal && column.is_numeric()
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        let ty = column.mysql_type();
        if ty == MySqlType::Decimal {
            let text =
                std::str::from_utf8(payload).map_err(|_| parse_error("decimal", payload))?;
            if !is_decimal_syntax(text) {
                return Err(parse_error("decimal", payload));
            }
            return Ok(Value::Decimal(text.to_string()));
        }

        // Widening from another numeric column keeps the printed form.
        if matches!(ty, MySqlType::Float | MySqlType::Double) {
            return Ok(Value::Decimal(decode_f64(payload, column, binary)?.to_string()));
        }
        let wide = super::integers::decode_i64(payload, column, binary)?;
        Ok(Value::Decimal(wide.to_string()))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Decimal(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Decimal(v) = value else { unreachable!() };
        if !is_decimal_syntax(v) {
            return Err(parse_error("decimal", v.as_bytes()));
        }

        // DECIMAL is ASCII on the wire in the binary protocol as well,
        // transmitted as a length-encoded string.
        let mut writer = PacketWriter::with_capacity(v.len() + 1);
        writer.write_lenenc_bytes(v.as_bytes());
        Ok(Parameter::new(
            MySqlType::Decimal,
            writer.into_bytes(),
            v.clone(),
        ))
    }
}

fn is_decimal_syntax(text: &str) -> bool {
    let rest = text.strip_prefix(['+', '-']).unwrap_or(text);
    if rest.is_empty() {
        return false;
    }
    let mut dots = 0;
    let mut digits = 0;
    for c in rest.chars() {
        match c {
            '.' => dots += 1,
            '0'..='9' => digits += 1,
            _ => return false,
        }
    }
    dots <= 1 && digits > 0
}

#[cfg(test)]
mod tests {
    use super::super::testing::{column, context};
    use super::super::{Codecs, TargetType};
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn float_binary_is_four_bytes_le() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Float, false);

        let payload = 1.5f32.to_le_bytes();
        let v = codecs
            .decode(Some(&payload), &col, TargetType::F32, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Float(1.5));

        let param = codecs.encode(&Value::Float(1.5), &ctx).unwrap();
        assert_eq!(param.binary_bytes(), &payload);
        assert_eq!(param.text_literal(), "1.5");
    }

    #[test]
    fn double_binary_is_eight_bytes_le() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Double, false);

        let payload = (-2.25f64).to_le_bytes();
        let v = codecs
            .decode(Some(&payload), &col, TargetType::F64, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Double(-2.25));
    }

    #[test]
    fn text_parse_tolerates_exponents() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Double, false);

        let v = codecs
            .decode(Some(b"1.25e2"), &col, TargetType::F64, false, &ctx)
            .unwrap();
        assert_eq!(v, Value::Double(125.0));

        assert!(codecs
            .decode(Some(b"abc"), &col, TargetType::F64, false, &ctx)
            .is_err());
    }

    #[test]
    fn decimal_is_ascii_in_both_modes() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::NewDecimal, false);

        for binary in [false, true] {
            let v = codecs
                .decode(Some(b"-123.4500"), &col, TargetType::Decimal, binary, &ctx)
                .unwrap();
            assert_eq!(v, Value::Decimal("-123.4500".to_string()));
        }

        assert!(codecs
            .decode(Some(b"12.3.4"), &col, TargetType::Decimal, false, &ctx)
            .is_err());
    }

    #[test]
    fn decimal_encode_is_length_prefixed_ascii() {
        let codecs = Codecs::default();
        let ctx = context();

        let param = codecs
            .encode(&Value::Decimal("42.50".to_string()), &ctx)
            .unwrap();
        assert_eq!(param.mysql_type(), crate::types::MySqlType::Decimal);
        assert_eq!(param.binary_bytes(), b"\x0542.50");
        assert_eq!(param.text_literal(), "42.50");
    }

    #[test]
    fn float_widens_to_decimal_target() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Long, false);

        let v = codecs
            .decode(Some(b"77"), &col, TargetType::Decimal, false, &ctx)
            .unwrap();
        assert_eq!(v, Value::Decimal("77".to_string()));
    }

    #[test]
    fn decimal_syntax_check() {
        assert!(is_decimal_syntax("0"));
        assert!(is_decimal_syntax("-12.75"));
        assert!(is_decimal_syntax("+.5"));
        assert!(!is_decimal_syntax(""));
        assert!(!is_decimal_syntax("."));
        assert!(!is_decimal_syntax("1,5"));
    }
}
