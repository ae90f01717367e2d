//! Codecs for character, binary and JSON values.

use super::{Codec, Parameter, TargetType};
use crate::context::CodecContext;
use crate::protocol::PacketWriter;
use crate::types::{ColumnDef, MySqlType};
use flowsql_core::error::{Error, TypeError, TypeErrorKind};
use flowsql_core::{Result, Value};

/// Escape a string into a quoted MySQL literal.
///
/// Handles the backslash-and-quote dialect: `\0`, `\n`, `\r`, `\Z`,
/// `\"`, `\'` and `\\`.
pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Format raw bytes as a hex literal (`X'2A'`).
fn hex_literal(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + 3);
    out.push_str("X'");
    for byte in data {
        out.push_str(&format!("{byte:02X}"));
    }
    out.push('\'');
    out
}

fn lenenc(data: &[u8]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(data.len() + 9);
    writer.write_lenenc_bytes(data);
    writer.into_bytes()
}

/// Codec for strings over the CHARACTER column family.
pub(super) struct StringCodec;

impl Codec for StringCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::String
            && (column.is_string() || matches!(column, MySqlType::Json | MySqlType::Decimal))
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        _binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        // Character payloads are bytes of text in both protocols.
        Ok(Value::Text(String::from_utf8_lossy(payload).into_owned()))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Text(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Text(s) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::VarChar,
            lenenc(s.as_bytes()),
            escape_string(s),
        ))
    }
}

/// Codec for raw bytes over the BINARY column family.
pub(super) struct BytesCodec;

impl Codec for BytesCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Bytes
            && (column.is_binary() || column.is_string() || column == MySqlType::Bit)
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        _binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        Ok(Value::Bytes(payload.to_vec()))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Bytes(data) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::VarBinary,
            lenenc(data),
            hex_literal(data),
        ))
    }
}

/// Codec for JSON documents.
pub(super) struct JsonCodec;

impl Codec for JsonCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Json && (column == MySqlType::Json || column.is_string())
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        _binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        serde_json::from_slice(payload).map(Value::Json).map_err(|e| {
            Error::Type(TypeError {
                kind: TypeErrorKind::ParseSyntax,
                expected: "valid JSON",
                actual: e.to_string(),
                column: None,
            })
        })
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Json(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Json(doc) = value else { unreachable!() };
        let serialized = doc.to_string();
        Ok(Parameter::new(
            MySqlType::Json,
            lenenc(serialized.as_bytes()),
            escape_string(&serialized),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{binary_column, column, context};
    use super::super::Codecs;
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn escape_dialect() {
        assert_eq!(escape_string("hello"), "'hello'");
        assert_eq!(escape_string("it's"), "'it\\'s'");
        assert_eq!(escape_string("a\\b"), "'a\\\\b'");
        assert_eq!(escape_string("line\nbreak"), "'line\\nbreak'");
        assert_eq!(escape_string("cr\rlf"), "'cr\\rlf'");
        assert_eq!(escape_string("nul\0byte"), "'nul\\0byte'");
        assert_eq!(escape_string("quote\"d"), "'quote\\\"d'");
        assert_eq!(escape_string("ctrl\x1az"), "'ctrl\\Zz'");
    }

    #[test]
    fn string_decode_respects_column_family() {
        let codecs = Codecs::default();
        let ctx = context();

        let col = column(FieldType::VarString, false);
        let v = codecs
            .decode(Some(b"hello"), &col, TargetType::String, false, &ctx)
            .unwrap();
        assert_eq!(v, Value::Text("hello".to_string()));

        // ENUM and SET are string columns.
        let col = column(FieldType::Enum, false);
        let v = codecs
            .decode(Some(b"red"), &col, TargetType::String, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Text("red".to_string()));

        // A VARBINARY column does not satisfy a string target.
        let col = binary_column(FieldType::VarString);
        assert!(codecs
            .decode(Some(b"raw"), &col, TargetType::String, false, &ctx)
            .is_err());
    }

    #[test]
    fn bytes_decode_from_binary_family() {
        let codecs = Codecs::default();
        let ctx = context();

        let col = binary_column(FieldType::Blob);
        let v = codecs
            .decode(Some(&[1, 2, 3]), &col, TargetType::Bytes, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn string_encode_forms() {
        let codecs = Codecs::default();
        let ctx = context();

        let param = codecs
            .encode(&Value::Text("it's".to_string()), &ctx)
            .unwrap();
        assert_eq!(param.mysql_type(), MySqlType::VarChar);
        assert_eq!(param.binary_bytes(), b"\x04it's");
        assert_eq!(param.text_literal(), "'it\\'s'");
    }

    #[test]
    fn bytes_encode_forms() {
        let codecs = Codecs::default();
        let ctx = context();

        let param = codecs.encode(&Value::Bytes(vec![0x2A, 0xFF]), &ctx).unwrap();
        assert_eq!(param.mysql_type(), MySqlType::VarBinary);
        assert_eq!(param.binary_bytes(), &[0x02, 0x2A, 0xFF]);
        assert_eq!(param.text_literal(), "X'2AFF'");
    }

    #[test]
    fn json_roundtrip() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Json, false);

        let doc = serde_json::json!({"k": [1, 2, 3]});
        let v = codecs
            .decode(
                Some(doc.to_string().as_bytes()),
                &col,
                TargetType::Json,
                false,
                &ctx,
            )
            .unwrap();
        assert_eq!(v, Value::Json(doc.clone()));

        assert!(codecs
            .decode(Some(b"{broken"), &col, TargetType::Json, false, &ctx)
            .is_err());

        let param = codecs.encode(&Value::Json(doc.clone()), &ctx).unwrap();
        assert_eq!(param.mysql_type(), MySqlType::Json);
        assert_eq!(param.text_literal(), escape_string(&doc.to_string()));
    }
}
