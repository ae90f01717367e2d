//! MySQL column type system.
//!
//! Two layers cooperate here:
//!
//! - [`FieldType`] is the raw wire byte from a column definition
//!   (the `MYSQL_TYPE_*` constants of the C API).
//! - [`MySqlType`] is the logical column tag the codec registry keys on;
//!   it folds in the UNSIGNED and BINARY flags and the charset, so
//!   `VARBINARY` and `VARCHAR` or `INT` and `INT UNSIGNED` are distinct.

#![allow(clippy::cast_possible_truncation)]

use crate::protocol::{PacketReader, charset};

/// MySQL field type codes as transmitted in column definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E,
    VarChar = 0x0F,
    Bit = 0x10,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl FieldType {
    /// Parse a field type from its wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0A => FieldType::Date,
            0x0B => FieldType::Time,
            0x0C => FieldType::DateTime,
            0x0D => FieldType::Year,
            0x0E => FieldType::NewDate,
            0x0F => FieldType::VarChar,
            0x10 => FieldType::Bit,
            0xF5 => FieldType::Json,
            0xF6 => FieldType::NewDecimal,
            0xF7 => FieldType::Enum,
            0xF8 => FieldType::Set,
            0xF9 => FieldType::TinyBlob,
            0xFA => FieldType::MediumBlob,
            0xFB => FieldType::LongBlob,
            0xFC => FieldType::Blob,
            0xFD => FieldType::VarString,
            0xFE => FieldType::String,
            0xFF => FieldType::Geometry,
            _ => FieldType::String, // Unknown types treated as string
        }
    }
}

/// Column flags in result set metadata.
#[allow(dead_code)]
pub mod column_flags {
    pub const NOT_NULL: u16 = 1;
    pub const PRIMARY_KEY: u16 = 2;
    pub const UNIQUE_KEY: u16 = 4;
    pub const MULTIPLE_KEY: u16 = 8;
    pub const BLOB: u16 = 16;
    pub const UNSIGNED: u16 = 32;
    pub const ZEROFILL: u16 = 64;
    pub const BINARY: u16 = 128;
    pub const ENUM: u16 = 256;
    pub const AUTO_INCREMENT: u16 = 512;
    pub const TIMESTAMP: u16 = 1024;
    pub const SET: u16 = 2048;
    pub const NO_DEFAULT_VALUE: u16 = 4096;
    pub const ON_UPDATE_NOW: u16 = 8192;
    pub const NUM: u16 = 32768;
}

/// The logical MySQL column type the codec registry dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySqlType {
    TinyInt,
    TinyIntUnsigned,
    SmallInt,
    SmallIntUnsigned,
    MediumInt,
    MediumIntUnsigned,
    Int,
    IntUnsigned,
    BigInt,
    BigIntUnsigned,
    Year,
    Float,
    Double,
    Decimal,
    Bit,
    Date,
    Time,
    DateTime,
    Timestamp,
    Char,
    VarChar,
    Binary,
    VarBinary,
    Text,
    Blob,
    Json,
    Enum,
    Set,
    Geometry,
    Null,
}

impl MySqlType {
    /// Derive the logical type from a column definition.
    #[must_use]
    pub fn of(field_type: FieldType, flags: u16, charset_id: u16) -> Self {
        let unsigned = flags & column_flags::UNSIGNED != 0;
        let binary_charset = charset_id == u16::from(charset::BINARY);

        match field_type {
            FieldType::Tiny => tag_signed(unsigned, MySqlType::TinyInt, MySqlType::TinyIntUnsigned),
            FieldType::Short => {
                tag_signed(unsigned, MySqlType::SmallInt, MySqlType::SmallIntUnsigned)
            }
            FieldType::Int24 => {
                tag_signed(unsigned, MySqlType::MediumInt, MySqlType::MediumIntUnsigned)
            }
            FieldType::Long => tag_signed(unsigned, MySqlType::Int, MySqlType::IntUnsigned),
            FieldType::LongLong => {
                tag_signed(unsigned, MySqlType::BigInt, MySqlType::BigIntUnsigned)
            }
            FieldType::Year => MySqlType::Year,
            FieldType::Float => MySqlType::Float,
            FieldType::Double => MySqlType::Double,
            FieldType::Decimal | FieldType::NewDecimal => MySqlType::Decimal,
            FieldType::Bit => MySqlType::Bit,
            FieldType::Date | FieldType::NewDate => MySqlType::Date,
            FieldType::Time => MySqlType::Time,
            FieldType::DateTime => MySqlType::DateTime,
            FieldType::Timestamp => MySqlType::Timestamp,
            FieldType::String => {
                if binary_charset {
                    MySqlType::Binary
                } else {
                    MySqlType::Char
                }
            }
            FieldType::VarChar | FieldType::VarString => {
                if binary_charset {
                    MySqlType::VarBinary
                } else {
                    MySqlType::VarChar
                }
            }
            FieldType::TinyBlob | FieldType::MediumBlob | FieldType::LongBlob | FieldType::Blob => {
                if binary_charset {
                    MySqlType::Blob
                } else {
                    MySqlType::Text
                }
            }
            FieldType::Json => MySqlType::Json,
            FieldType::Enum => MySqlType::Enum,
            FieldType::Set => MySqlType::Set,
            FieldType::Geometry => MySqlType::Geometry,
            FieldType::Null => MySqlType::Null,
        }
    }

    /// Check if this is an integer type (YEAR counts: it is a small integer
    /// on the wire).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            MySqlType::TinyInt
                | MySqlType::TinyIntUnsigned
                | MySqlType::SmallInt
                | MySqlType::SmallIntUnsigned
                | MySqlType::MediumInt
                | MySqlType::MediumIntUnsigned
                | MySqlType::Int
                | MySqlType::IntUnsigned
                | MySqlType::BigInt
                | MySqlType::BigIntUnsigned
                | MySqlType::Year
        )
    }

    /// Check if this is any numeric type (integers, floats, DECIMAL).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer()
            || matches!(
                self,
                MySqlType::Float | MySqlType::Double | MySqlType::Decimal
            )
    }

    /// Check if the column is unsigned.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            MySqlType::TinyIntUnsigned
                | MySqlType::SmallIntUnsigned
                | MySqlType::MediumIntUnsigned
                | MySqlType::IntUnsigned
                | MySqlType::BigIntUnsigned
                | MySqlType::Year
        )
    }

    /// Check if this is a date/time type.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            MySqlType::Date | MySqlType::Time | MySqlType::DateTime | MySqlType::Timestamp
        )
    }

    /// Check if this column carries raw bytes rather than characters.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            MySqlType::Binary | MySqlType::VarBinary | MySqlType::Blob | MySqlType::Geometry
        )
    }

    /// Check if this column carries character data.
    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            MySqlType::Char
                | MySqlType::VarChar
                | MySqlType::Text
                | MySqlType::Enum
                | MySqlType::Set
        )
    }

    /// Fixed binary-protocol wire size in bytes, if the type has one.
    #[must_use]
    pub const fn fixed_binary_size(self) -> Option<usize> {
        match self {
            MySqlType::TinyInt | MySqlType::TinyIntUnsigned => Some(1),
            MySqlType::SmallInt | MySqlType::SmallIntUnsigned | MySqlType::Year => Some(2),
            MySqlType::MediumInt
            | MySqlType::MediumIntUnsigned
            | MySqlType::Int
            | MySqlType::IntUnsigned
            | MySqlType::Float => Some(4),
            MySqlType::BigInt | MySqlType::BigIntUnsigned | MySqlType::Double => Some(8),
            _ => None,
        }
    }

    /// The field type byte used when this type tags a bound parameter.
    #[must_use]
    pub const fn parameter_field_type(self) -> FieldType {
        match self {
            MySqlType::TinyInt | MySqlType::TinyIntUnsigned => FieldType::Tiny,
            MySqlType::SmallInt | MySqlType::SmallIntUnsigned => FieldType::Short,
            MySqlType::MediumInt | MySqlType::MediumIntUnsigned => FieldType::Int24,
            MySqlType::Int | MySqlType::IntUnsigned => FieldType::Long,
            MySqlType::BigInt | MySqlType::BigIntUnsigned => FieldType::LongLong,
            MySqlType::Year => FieldType::Year,
            MySqlType::Float => FieldType::Float,
            MySqlType::Double => FieldType::Double,
            MySqlType::Decimal => FieldType::NewDecimal,
            MySqlType::Bit => FieldType::Bit,
            MySqlType::Date => FieldType::Date,
            MySqlType::Time => FieldType::Time,
            MySqlType::DateTime => FieldType::DateTime,
            MySqlType::Timestamp => FieldType::Timestamp,
            MySqlType::Char => FieldType::String,
            MySqlType::VarChar | MySqlType::VarBinary => FieldType::VarString,
            MySqlType::Binary => FieldType::String,
            MySqlType::Text | MySqlType::Blob => FieldType::Blob,
            MySqlType::Json => FieldType::Json,
            MySqlType::Enum => FieldType::Enum,
            MySqlType::Set => FieldType::Set,
            MySqlType::Geometry => FieldType::Geometry,
            MySqlType::Null => FieldType::Null,
        }
    }

    /// Get the type name as it would appear in DDL.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MySqlType::TinyInt => "TINYINT",
            MySqlType::TinyIntUnsigned => "TINYINT UNSIGNED",
            MySqlType::SmallInt => "SMALLINT",
            MySqlType::SmallIntUnsigned => "SMALLINT UNSIGNED",
            MySqlType::MediumInt => "MEDIUMINT",
            MySqlType::MediumIntUnsigned => "MEDIUMINT UNSIGNED",
            MySqlType::Int => "INT",
            MySqlType::IntUnsigned => "INT UNSIGNED",
            MySqlType::BigInt => "BIGINT",
            MySqlType::BigIntUnsigned => "BIGINT UNSIGNED",
            MySqlType::Year => "YEAR",
            MySqlType::Float => "FLOAT",
            MySqlType::Double => "DOUBLE",
            MySqlType::Decimal => "DECIMAL",
            MySqlType::Bit => "BIT",
            MySqlType::Date => "DATE",
            MySqlType::Time => "TIME",
            MySqlType::DateTime => "DATETIME",
            MySqlType::Timestamp => "TIMESTAMP",
            MySqlType::Char => "CHAR",
            MySqlType::VarChar => "VARCHAR",
            MySqlType::Binary => "BINARY",
            MySqlType::VarBinary => "VARBINARY",
            MySqlType::Text => "TEXT",
            MySqlType::Blob => "BLOB",
            MySqlType::Json => "JSON",
            MySqlType::Enum => "ENUM",
            MySqlType::Set => "SET",
            MySqlType::Geometry => "GEOMETRY",
            MySqlType::Null => "NULL",
        }
    }
}

const fn tag_signed(unsigned: bool, signed: MySqlType, not: MySqlType) -> MySqlType {
    if unsigned { not } else { signed }
}

/// Column definition from a result set.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Schema (database) name
    pub schema: String,
    /// Table name (or alias)
    pub table: String,
    /// Column name (or alias)
    pub name: String,
    /// Original column name
    pub org_name: String,
    /// Character set number
    pub charset: u16,
    /// Declared column length
    pub column_length: u32,
    /// Wire column type
    pub column_type: FieldType,
    /// Column flags
    pub flags: u16,
    /// Number of decimals
    pub decimals: u8,
}

impl ColumnDef {
    /// Parse a column definition packet (protocol 4.1 layout).
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let mut reader = PacketReader::new(payload);

        let _catalog = reader.read_lenenc_string()?;
        let schema = reader.read_lenenc_string()?;
        let table = reader.read_lenenc_string()?;
        let _org_table = reader.read_lenenc_string()?;
        let name = reader.read_lenenc_string()?;
        let org_name = reader.read_lenenc_string()?;

        // Length of the fixed fields, always 0x0C
        let _fixed_len = reader.read_lenenc_int()?;

        let charset = reader.read_u16_le()?;
        let column_length = reader.read_u32_le()?;
        let column_type = FieldType::from_u8(reader.read_u8()?);
        let flags = reader.read_u16_le()?;
        let decimals = reader.read_u8()?;

        Some(ColumnDef {
            schema,
            table,
            name,
            org_name,
            charset,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }

    /// The logical column type tag.
    #[must_use]
    pub fn mysql_type(&self) -> MySqlType {
        MySqlType::of(self.column_type, self.flags, self.charset)
    }

    /// Check if the column is NOT NULL.
    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }

    /// Check if the column is unsigned.
    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }

    /// Check if the column is binary.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.charset == u16::from(charset::BINARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(field_type: FieldType, flags: u16, charset_id: u16) -> ColumnDef {
        ColumnDef {
            schema: "test".to_string(),
            table: "t".to_string(),
            name: "c".to_string(),
            org_name: "c".to_string(),
            charset: charset_id,
            column_length: 11,
            column_type: field_type,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn field_type_from_u8() {
        assert_eq!(FieldType::from_u8(0x01), FieldType::Tiny);
        assert_eq!(FieldType::from_u8(0x03), FieldType::Long);
        assert_eq!(FieldType::from_u8(0x08), FieldType::LongLong);
        assert_eq!(FieldType::from_u8(0xFC), FieldType::Blob);
        assert_eq!(FieldType::from_u8(0xF5), FieldType::Json);
    }

    #[test]
    fn logical_type_signedness() {
        assert_eq!(column(FieldType::Long, 0, 33).mysql_type(), MySqlType::Int);
        assert_eq!(
            column(FieldType::Long, column_flags::UNSIGNED, 33).mysql_type(),
            MySqlType::IntUnsigned
        );
        assert_eq!(
            column(FieldType::Int24, 0, 33).mysql_type(),
            MySqlType::MediumInt
        );
    }

    #[test]
    fn logical_type_binary_vs_character() {
        let binary_charset = u16::from(charset::BINARY);
        assert_eq!(
            column(FieldType::VarString, 0, 33).mysql_type(),
            MySqlType::VarChar
        );
        assert_eq!(
            column(FieldType::VarString, 0, binary_charset).mysql_type(),
            MySqlType::VarBinary
        );
        assert_eq!(column(FieldType::Blob, 0, 33).mysql_type(), MySqlType::Text);
        assert_eq!(
            column(FieldType::Blob, 0, binary_charset).mysql_type(),
            MySqlType::Blob
        );
    }

    #[test]
    fn type_categories() {
        assert!(MySqlType::MediumIntUnsigned.is_integer());
        assert!(MySqlType::Year.is_integer());
        assert!(MySqlType::Decimal.is_numeric());
        assert!(!MySqlType::Decimal.is_integer());
        assert!(MySqlType::Timestamp.is_temporal());
        assert!(MySqlType::VarBinary.is_binary());
        assert!(MySqlType::Set.is_string());
        assert!(MySqlType::BigIntUnsigned.is_unsigned());
    }

    #[test]
    fn fixed_binary_sizes() {
        assert_eq!(MySqlType::TinyInt.fixed_binary_size(), Some(1));
        assert_eq!(MySqlType::Year.fixed_binary_size(), Some(2));
        assert_eq!(MySqlType::MediumInt.fixed_binary_size(), Some(4));
        assert_eq!(MySqlType::Double.fixed_binary_size(), Some(8));
        assert_eq!(MySqlType::DateTime.fixed_binary_size(), None);
        assert_eq!(MySqlType::VarChar.fixed_binary_size(), None);
    }

    #[test]
    fn column_def_decode() {
        // Handcrafted column definition: def.test.t.c, utf8, INT NOT NULL
        let mut payload = Vec::new();
        for s in ["def", "test", "t", "t", "c", "c"] {
            payload.push(s.len() as u8);
            payload.extend_from_slice(s.as_bytes());
        }
        payload.push(0x0C); // fixed length
        payload.extend_from_slice(&33u16.to_le_bytes()); // charset
        payload.extend_from_slice(&11u32.to_le_bytes()); // length
        payload.push(FieldType::Long as u8);
        payload.extend_from_slice(&column_flags::NOT_NULL.to_le_bytes());
        payload.push(0); // decimals

        let col = ColumnDef::decode(&payload).unwrap();
        assert_eq!(col.name, "c");
        assert_eq!(col.schema, "test");
        assert_eq!(col.column_type, FieldType::Long);
        assert!(col.is_not_null());
        assert_eq!(col.mysql_type(), MySqlType::Int);
    }
}
