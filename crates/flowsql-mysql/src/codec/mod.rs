//! Typed value codecs.
//!
//! The registry resolves, for a `(column type, target type)` pair on decode
//! and for the runtime value type on encode, the single codec to use.
//! Resolution is a linear scan over a fixed priority list: primitive-typed
//! codecs come before object-typed ones and exact conversions before
//! widening ones, so the scan order is the tie-breaker and resolution is
//! deterministic.

mod bits;
mod floating;
mod integers;
mod strings;
mod temporal;

use crate::context::CodecContext;
use crate::protocol::PacketWriter;
use crate::types::{ColumnDef, MySqlType};
use flowsql_core::error::{Error, TypeError, TypeErrorKind};
use flowsql_core::{Result, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// The native type a caller asks a column to decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Bits,
    Date,
    Time,
    Duration,
    DateTime,
    Zoned,
    Offset,
    Instant,
    Year,
    String,
    Bytes,
    Json,
}

impl TargetType {
    /// A printable name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TargetType::Bool => "bool",
            TargetType::I8 => "i8",
            TargetType::I16 => "i16",
            TargetType::I32 => "i32",
            TargetType::I64 => "i64",
            TargetType::U64 => "u64",
            TargetType::F32 => "f32",
            TargetType::F64 => "f64",
            TargetType::Decimal => "decimal",
            TargetType::Bits => "bit set",
            TargetType::Date => "date",
            TargetType::Time => "time",
            TargetType::Duration => "duration",
            TargetType::DateTime => "date-time",
            TargetType::Zoned => "zoned date-time",
            TargetType::Offset => "offset date-time",
            TargetType::Instant => "instant",
            TargetType::Year => "year",
            TargetType::String => "string",
            TargetType::Bytes => "bytes",
            TargetType::Json => "json",
        }
    }
}

/// An encoded statement parameter.
///
/// A parameter carries its nominal MySQL type and both serialised forms.
/// Each emission channel may be consumed at most once; a second write on
/// the same channel is a usage error. Equality is `(type, binary bytes)`.
#[derive(Debug)]
pub struct Parameter {
    ty: MySqlType,
    binary: Vec<u8>,
    text: String,
    binary_taken: AtomicBool,
    text_taken: AtomicBool,
}

impl Parameter {
    pub(crate) fn new(ty: MySqlType, binary: Vec<u8>, text: String) -> Self {
        Self {
            ty,
            binary,
            text,
            binary_taken: AtomicBool::new(false),
            text_taken: AtomicBool::new(false),
        }
    }

    /// The SQL NULL parameter.
    #[must_use]
    pub fn null() -> Self {
        Self::new(MySqlType::Null, Vec::new(), "NULL".to_string())
    }

    /// The nominal MySQL type of this parameter.
    #[must_use]
    pub fn mysql_type(&self) -> MySqlType {
        self.ty
    }

    /// Whether this parameter is SQL NULL (flagged via the null bitmap).
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.ty == MySqlType::Null
    }

    /// Emit the binary form into an execute packet body.
    #[allow(clippy::result_large_err)]
    pub fn write_binary(&self, out: &mut PacketWriter) -> Result<()> {
        self.take(&self.binary_taken, "binary")?;
        out.write_bytes(&self.binary);
        Ok(())
    }

    /// Emit the text literal into a formatted query.
    #[allow(clippy::result_large_err)]
    pub fn write_text(&self, out: &mut String) -> Result<()> {
        self.take(&self.text_taken, "text")?;
        out.push_str(&self.text);
        Ok(())
    }

    #[allow(clippy::result_large_err)]
    fn take(&self, channel: &AtomicBool, name: &str) -> Result<()> {
        if channel.swap(true, Ordering::AcqRel) {
            return Err(Error::usage(format!(
                "parameter {} form already consumed",
                name
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn binary_bytes(&self) -> &[u8] {
        &self.binary
    }

    #[cfg(test)]
    pub(crate) fn text_literal(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.binary == other.binary
    }
}

impl Eq for Parameter {}

impl Clone for Parameter {
    fn clone(&self) -> Self {
        // A clone is a fresh parameter; consumption state does not travel.
        Self::new(self.ty, self.binary.clone(), self.text.clone())
    }
}

/// One entry of the codec table.
pub(crate) trait Codec: Send + Sync {
    /// Whether this codec can decode the given column into the target.
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool;

    /// Decode a non-NULL column payload.
    #[allow(clippy::result_large_err)]
    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value>;

    /// Whether this codec claims the runtime type of the value.
    fn can_encode(&self, value: &Value) -> bool;

    /// Encode a value into a parameter.
    #[allow(clippy::result_large_err)]
    fn encode(&self, value: &Value, ctx: &CodecContext) -> Result<Parameter>;
}

/// The codec registry.
pub struct Codecs {
    codecs: Vec<Box<dyn Codec>>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            codecs: vec![
                Box::new(integers::BooleanCodec),
                Box::new(integers::ByteCodec),
                Box::new(integers::ShortCodec),
                Box::new(integers::IntegerCodec),
                Box::new(integers::LongCodec),
                Box::new(integers::UnsignedLongCodec),
                Box::new(floating::FloatCodec),
                Box::new(floating::DoubleCodec),
                Box::new(floating::DecimalCodec),
                Box::new(bits::BitSetCodec),
                Box::new(temporal::YearCodec),
                Box::new(temporal::DateCodec),
                Box::new(temporal::TimeCodec),
                Box::new(temporal::DurationCodec),
                Box::new(temporal::DateTimeCodec),
                Box::new(temporal::OffsetDateTimeCodec),
                Box::new(temporal::InstantCodec),
                Box::new(strings::StringCodec),
                Box::new(strings::BytesCodec),
                Box::new(strings::JsonCodec),
            ],
        }
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs")
            .field("len", &self.codecs.len())
            .finish()
    }
}

impl Codecs {
    /// Decode a column payload into the requested target type.
    ///
    /// `payload` is `None` when the row signalled SQL NULL for the column.
    #[allow(clippy::result_large_err)]
    pub fn decode(
        &self,
        payload: Option<&[u8]>,
        column: &ColumnDef,
        target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        let Some(payload) = payload else {
            return Ok(Value::Null);
        };

        let column_type = column.mysql_type();
        for codec in &self.codecs {
            if codec.can_decode(column_type, target) {
                return codec
                    .decode(payload, column, target, binary, ctx)
                    .map_err(|e| attach_column(e, column));
            }
        }

        Err(Error::Type(TypeError {
            kind: TypeErrorKind::UnsupportedConversion,
            expected: target.name(),
            actual: column_type.name().to_string(),
            column: Some(column.name.clone()),
        }))
    }

    /// Decode a column payload into its natural target type.
    #[allow(clippy::result_large_err)]
    pub fn decode_default(
        &self,
        payload: Option<&[u8]>,
        column: &ColumnDef,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        let target = Self::default_target(column, ctx);
        self.decode(payload, column, target, binary, ctx)
    }

    /// Encode a value into a parameter.
    #[allow(clippy::result_large_err)]
    pub fn encode(&self, value: &Value, ctx: &CodecContext) -> Result<Parameter> {
        if value.is_null() {
            return Ok(Parameter::null());
        }

        for codec in &self.codecs {
            if codec.can_encode(value) {
                return codec.encode(value, ctx);
            }
        }

        Err(Error::Type(TypeError {
            kind: TypeErrorKind::NoCodec,
            expected: "any encodable value",
            actual: value.type_name().to_string(),
            column: None,
        }))
    }

    /// The target type a column decodes into when the caller does not ask
    /// for a specific one.
    #[must_use]
    pub fn default_target(column: &ColumnDef, ctx: &CodecContext) -> TargetType {
        match column.mysql_type() {
            MySqlType::TinyInt | MySqlType::TinyIntUnsigned
                if ctx.tiny_int_as_boolean && column.column_length == 1 =>
            {
                TargetType::Bool
            }
            MySqlType::TinyInt | MySqlType::SmallInt => TargetType::I16,
            MySqlType::TinyIntUnsigned | MySqlType::SmallIntUnsigned => TargetType::I32,
            MySqlType::MediumInt | MySqlType::MediumIntUnsigned | MySqlType::Int => TargetType::I32,
            MySqlType::IntUnsigned | MySqlType::BigInt => TargetType::I64,
            MySqlType::BigIntUnsigned => TargetType::U64,
            MySqlType::Year => TargetType::Year,
            MySqlType::Float => TargetType::F32,
            MySqlType::Double => TargetType::F64,
            MySqlType::Decimal => TargetType::Decimal,
            MySqlType::Bit => TargetType::Bits,
            MySqlType::Date => TargetType::Date,
            MySqlType::Time => TargetType::Duration,
            MySqlType::DateTime | MySqlType::Timestamp => TargetType::DateTime,
            MySqlType::Json => TargetType::Json,
            MySqlType::Char
            | MySqlType::VarChar
            | MySqlType::Text
            | MySqlType::Enum
            | MySqlType::Set => TargetType::String,
            MySqlType::Binary
            | MySqlType::VarBinary
            | MySqlType::Blob
            | MySqlType::Geometry => TargetType::Bytes,
            MySqlType::Null => TargetType::String,
        }
    }
}

fn attach_column(error: Error, column: &ColumnDef) -> Error {
    match error {
        Error::Type(mut te) => {
            if te.column.is_none() {
                te.column = Some(column.name.clone());
            }
            Error::Type(te)
        }
        other => other,
    }
}

/// Decode failure: the payload text did not parse as the target.
pub(crate) fn parse_error(expected: &'static str, payload: &[u8]) -> Error {
    Error::Type(TypeError {
        kind: TypeErrorKind::ParseSyntax,
        expected,
        actual: format!("malformed payload {:?}", String::from_utf8_lossy(payload)),
        column: None,
    })
}

/// Decode failure: the widened value does not fit the target.
pub(crate) fn overflow_error(expected: &'static str, value: impl std::fmt::Display) -> Error {
    Error::Type(TypeError {
        kind: TypeErrorKind::Overflow,
        expected,
        actual: format!("value {} out of range", value),
        column: None,
    })
}

/// Decode failure: the buffer is shorter than the column requires.
pub(crate) fn underflow_error(expected: &'static str, payload: &[u8]) -> Error {
    Error::protocol(format!(
        "buffer under-run decoding {}: {} bytes left",
        expected,
        payload.len()
    ))
}

/// Parse an ASCII decimal integer with an optional leading sign.
///
/// Empty payloads are a decode error, as are stray characters.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_int_ascii(payload: &[u8]) -> Result<i64> {
    let (negative, digits) = match payload.first() {
        Some(b'-') => (true, &payload[1..]),
        Some(b'+') => (false, &payload[1..]),
        Some(_) => (false, payload),
        None => return Err(parse_error("integer", payload)),
    };

    if digits.is_empty() {
        return Err(parse_error("integer", payload));
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(parse_error("integer", payload));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| {
                let digit = i64::from(b - b'0');
                if negative {
                    v.checked_sub(digit)
                } else {
                    v.checked_add(digit)
                }
            })
            .ok_or_else(|| overflow_error("i64", String::from_utf8_lossy(payload)))?;
    }

    Ok(value)
}

/// Parse an ASCII decimal unsigned integer with an optional `+` sign.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_uint_ascii(payload: &[u8]) -> Result<u64> {
    let digits = match payload.first() {
        Some(b'+') => &payload[1..],
        Some(_) => payload,
        None => return Err(parse_error("unsigned integer", payload)),
    };

    if digits.is_empty() {
        return Err(parse_error("unsigned integer", payload));
    }

    let mut value: u64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(parse_error("unsigned integer", payload));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| overflow_error("u64", String::from_utf8_lossy(payload)))?;
    }

    Ok(value)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::context::{ConnectionContext, ZeroDateOption};
    use crate::types::{FieldType, column_flags};
    use crate::version::ServerVersion;
    use crate::zone::ZoneId;

    pub fn context() -> CodecContext {
        ConnectionContext::new(ServerVersion::parse("8.0.33"), 0, 0, Some(ZoneId::utc()))
            .codec_context()
    }

    pub fn context_with_zone(zone: ZoneId) -> CodecContext {
        ConnectionContext::new(ServerVersion::parse("8.0.33"), 0, 0, Some(zone)).codec_context()
    }

    pub fn context_with_zero_date(option: ZeroDateOption) -> CodecContext {
        ConnectionContext::new(ServerVersion::parse("8.0.33"), 0, 0, Some(ZoneId::utc()))
            .with_codec_options(
                ZoneId::utc(),
                true,
                true,
                option,
                crate::protocol::charset::DEFAULT_CHARSET,
            )
            .codec_context()
    }

    pub fn column(field_type: FieldType, unsigned: bool) -> ColumnDef {
        ColumnDef {
            schema: "test".to_string(),
            table: "t".to_string(),
            name: "c".to_string(),
            org_name: "c".to_string(),
            charset: 33,
            column_length: 11,
            column_type: field_type,
            flags: if unsigned { column_flags::UNSIGNED } else { 0 },
            decimals: 0,
        }
    }

    pub fn binary_column(field_type: FieldType) -> ColumnDef {
        let mut col = column(field_type, false);
        col.charset = u16::from(crate::protocol::charset::BINARY);
        col
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{column, context};
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn registry_dispatch_is_deterministic() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Long, false);

        let value = codecs
            .decode(Some(b"42"), &col, TargetType::I32, false, &ctx)
            .unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn null_payload_decodes_to_null() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Long, false);

        let value = codecs
            .decode(None, &col, TargetType::I32, false, &ctx)
            .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn unsupported_conversion_is_an_error() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Date, false);

        let err = codecs
            .decode(Some(b"2021-05-03"), &col, TargetType::Bits, false, &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Type(TypeError {
                kind: TypeErrorKind::UnsupportedConversion,
                ..
            })
        ));
    }

    #[test]
    fn parameter_channels_are_single_use() {
        let param = Parameter::new(MySqlType::Int, vec![42, 0, 0, 0], "42".to_string());

        let mut writer = PacketWriter::new();
        param.write_binary(&mut writer).unwrap();
        assert_eq!(writer.as_bytes(), &[42, 0, 0, 0]);
        assert!(param.write_binary(&mut writer).is_err());

        let mut sql = String::new();
        param.write_text(&mut sql).unwrap();
        assert_eq!(sql, "42");
        assert!(param.write_text(&mut sql).is_err());

        // A clone starts with fresh channels.
        let clone = param.clone();
        let mut writer = PacketWriter::new();
        clone.write_binary(&mut writer).unwrap();
    }

    #[test]
    fn parameter_equality_by_type_and_bytes() {
        let a = Parameter::new(MySqlType::Int, vec![1, 0, 0, 0], "1".to_string());
        let b = Parameter::new(MySqlType::Int, vec![1, 0, 0, 0], "0x1".to_string());
        let c = Parameter::new(MySqlType::BigInt, vec![1, 0, 0, 0], "1".to_string());

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn encode_null() {
        let codecs = Codecs::default();
        let ctx = context();
        let param = codecs.encode(&Value::Null, &ctx).unwrap();
        assert!(param.is_null());
        assert_eq!(param.text_literal(), "NULL");
    }

    #[test]
    fn ascii_integer_parsing() {
        assert_eq!(parse_int_ascii(b"123").unwrap(), 123);
        assert_eq!(parse_int_ascii(b"-123").unwrap(), -123);
        assert_eq!(parse_int_ascii(b"+7").unwrap(), 7);
        assert!(parse_int_ascii(b"").is_err());
        assert!(parse_int_ascii(b"-").is_err());
        assert!(parse_int_ascii(b"12a").is_err());

        assert_eq!(parse_uint_ascii(b"18446744073709551615").unwrap(), u64::MAX);
        assert!(parse_uint_ascii(b"-1").is_err());
    }
}
