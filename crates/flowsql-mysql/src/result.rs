//! Statement results with lazy column decoding.
//!
//! A result keeps the raw column payloads of every row and runs the codec
//! registry on demand, so one row can serve several target types without
//! re-reading the wire.

use crate::client::{RawRow, ServerMessage};
use crate::codec::{Codecs, TargetType};
use crate::context::CodecContext;
use crate::types::ColumnDef;
use flowsql_core::row::ColumnInfo;
use flowsql_core::{Result, Row, Value};
use std::sync::Arc;

/// The materialised outcome of one statement execution.
#[derive(Debug)]
pub struct MySqlResult {
    columns: Arc<Vec<ColumnDef>>,
    rows: Vec<RawRow>,
    affected_rows: u64,
    last_insert_id: u64,
    warnings: u16,
    codecs: Arc<Codecs>,
    ctx: CodecContext,
}

impl MySqlResult {
    pub(crate) fn from_messages(
        messages: Vec<ServerMessage>,
        codecs: Arc<Codecs>,
        ctx: CodecContext,
    ) -> Self {
        let mut columns = Arc::new(Vec::new());
        let mut rows = Vec::new();
        let mut affected_rows = 0;
        let mut last_insert_id = 0;
        let mut warnings = 0;

        for message in messages {
            match message {
                ServerMessage::Columns(c) => columns = c,
                ServerMessage::Row(row) => rows.push(row),
                ServerMessage::Ok(ok) => {
                    affected_rows = ok.affected_rows;
                    last_insert_id = ok.last_insert_id;
                    warnings = ok.warnings;
                }
                ServerMessage::Eof(eof) => warnings = eof.warnings,
                ServerMessage::PrepareOk(_) => {}
            }
        }

        Self {
            columns,
            rows,
            affected_rows,
            last_insert_id,
            warnings,
            codecs,
            ctx,
        }
    }

    /// The result set's column metadata.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Rows affected by a data-modifying statement.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The last generated AUTO_INCREMENT value.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// Warning count reported by the server.
    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    /// Number of rows in the result set.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over the rows with lazy decoding.
    pub fn rows(&self) -> impl Iterator<Item = MySqlRow<'_>> {
        self.rows.iter().map(move |raw| MySqlRow {
            columns: &self.columns,
            raw,
            codecs: &self.codecs,
            ctx: &self.ctx,
        })
    }

    /// Decode every cell through its default target into eager rows.
    #[allow(clippy::result_large_err)]
    pub fn into_rows(self) -> Result<Vec<Row>> {
        let info = Arc::new(ColumnInfo::new(
            self.columns.iter().map(|c| c.name.clone()).collect(),
        ));

        let mut rows = Vec::with_capacity(self.rows.len());
        for raw in &self.rows {
            let mut values = Vec::with_capacity(self.columns.len());
            for (column, field) in self.columns.iter().zip(&raw.fields) {
                values.push(self.codecs.decode_default(
                    field.as_deref(),
                    column,
                    raw.binary,
                    &self.ctx,
                )?);
            }
            rows.push(Row::with_columns(Arc::clone(&info), values));
        }
        Ok(rows)
    }
}

/// One row of a result, decoding columns on demand.
#[derive(Debug, Clone, Copy)]
pub struct MySqlRow<'a> {
    columns: &'a [ColumnDef],
    raw: &'a RawRow,
    codecs: &'a Codecs,
    ctx: &'a CodecContext,
}

impl MySqlRow<'_> {
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Decode a column into the requested target type.
    #[allow(clippy::result_large_err)]
    pub fn get(&self, index: usize, target: TargetType) -> Result<Value> {
        let (column, field) = self.cell(index)?;
        self.codecs
            .decode(field, column, target, self.raw.binary, self.ctx)
    }

    /// Decode a column into its natural target type.
    #[allow(clippy::result_large_err)]
    pub fn get_default(&self, index: usize) -> Result<Value> {
        let (column, field) = self.cell(index)?;
        self.codecs
            .decode_default(field, column, self.raw.binary, self.ctx)
    }

    /// Decode a column by name into the requested target type.
    #[allow(clippy::result_large_err)]
    pub fn get_by_name(&self, name: &str, target: TargetType) -> Result<Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                flowsql_core::Error::usage(format!("no column named '{}'", name))
            })?;
        self.get(index, target)
    }

    #[allow(clippy::result_large_err)]
    fn cell(&self, index: usize) -> Result<(&ColumnDef, Option<&[u8]>)> {
        let column = self.columns.get(index).ok_or_else(|| {
            flowsql_core::Error::usage(format!(
                "column index {} out of bounds ({} columns)",
                index,
                self.columns.len()
            ))
        })?;
        let field = self.raw.fields.get(index).and_then(|f| f.as_deref());
        Ok((column, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ConnectionContext, ZeroDateOption};
    use crate::protocol::OkPacket;
    use crate::types::FieldType;
    use crate::version::ServerVersion;
    use crate::zone::ZoneId;

    fn ctx() -> CodecContext {
        ConnectionContext::new(ServerVersion::parse("8.0.33"), 0, 0, Some(ZoneId::utc()))
            .with_codec_options(
                ZoneId::utc(),
                true,
                true,
                ZeroDateOption::UseNull,
                crate::protocol::charset::DEFAULT_CHARSET,
            )
            .codec_context()
    }

    fn column(name: &str, field_type: FieldType) -> ColumnDef {
        ColumnDef {
            schema: "test".to_string(),
            table: "t".to_string(),
            name: name.to_string(),
            org_name: name.to_string(),
            charset: 33,
            column_length: 11,
            column_type: field_type,
            flags: 0,
            decimals: 0,
        }
    }

    fn select_result() -> MySqlResult {
        let columns = Arc::new(vec![
            column("id", FieldType::Long),
            column("name", FieldType::VarString),
        ]);
        let messages = vec![
            ServerMessage::Columns(Arc::clone(&columns)),
            ServerMessage::Row(RawRow {
                fields: vec![Some(b"42".to_vec()), Some(b"Ada".to_vec())],
                binary: false,
            }),
            ServerMessage::Row(RawRow {
                fields: vec![Some(b"43".to_vec()), None],
                binary: false,
            }),
            ServerMessage::Ok(OkPacket {
                status_flags: 2,
                ..OkPacket::default()
            }),
        ];
        MySqlResult::from_messages(messages, Arc::new(Codecs::default()), ctx())
    }

    #[test]
    fn lazy_decode_serves_multiple_targets() {
        let result = select_result();
        assert_eq!(result.row_count(), 2);

        let row = result.rows().next().unwrap();
        assert_eq!(row.get(0, TargetType::I32).unwrap(), Value::Int(42));
        assert_eq!(row.get(0, TargetType::I64).unwrap(), Value::BigInt(42));
        assert!(row.get(0, TargetType::String).is_err());
        assert_eq!(
            row.get_by_name("name", TargetType::String).unwrap(),
            Value::Text("Ada".to_string())
        );
    }

    #[test]
    fn null_fields_decode_to_null() {
        let result = select_result();
        let row = result.rows().nth(1).unwrap();
        assert_eq!(row.get(1, TargetType::String).unwrap(), Value::Null);
    }

    #[test]
    fn into_rows_uses_default_targets() {
        let rows = select_result().into_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_named::<i32>("id").unwrap(), 42);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Ada");
        assert!(rows[1].get_named::<Option<String>>("name").unwrap().is_none());
    }

    #[test]
    fn update_result_carries_counters() {
        let messages = vec![ServerMessage::Ok(OkPacket {
            affected_rows: 3,
            last_insert_id: 99,
            warnings: 1,
            status_flags: 2,
            info: String::new(),
        })];
        let result = MySqlResult::from_messages(messages, Arc::new(Codecs::default()), ctx());
        assert_eq!(result.affected_rows(), 3);
        assert_eq!(result.last_insert_id(), 99);
        assert_eq!(result.warnings(), 1);
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn out_of_bounds_is_a_usage_error() {
        let result = select_result();
        let row = result.rows().next().unwrap();
        assert!(row.get(9, TargetType::I32).is_err());
    }
}
