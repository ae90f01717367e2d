//! The request/response exchange layer.
//!
//! MySQL has no multiplexing over a single connection: requests are
//! strictly serialised in submission order and each one is answered by a
//! complete response (OK, ERR, or a result set run to its terminator).
//! [`Client`] models exactly that exchange; [`TcpClient`] implements it
//! over an asupersync TCP stream that has already completed the login
//! handshake.
//!
//! Server-status flags ride on every completion frame and are published
//! through a shared atomic word so the connection sees them synchronously.

use crate::codec::Parameter;
use crate::protocol::{
    Command, EofPacket, ErrPacket, MAX_PACKET_SIZE, OkPacket, PacketHeader, PacketReader,
    PacketType, PacketWriter, StmtPrepareOk, capabilities,
};
use crate::types::ColumnDef;
use asupersync::io::{AsyncRead, AsyncWrite, ReadBuf};
use asupersync::net::TcpStream;
use asupersync::{Cx, Outcome};
use flowsql_core::error::{
    ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind,
};
use flowsql_core::Result;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// Propagate non-success outcomes, like `?` for [`Outcome`].
macro_rules! otry {
    ($expr:expr) => {
        match $expr {
            ::asupersync::Outcome::Ok(v) => v,
            ::asupersync::Outcome::Err(e) => return ::asupersync::Outcome::Err(e.into()),
            ::asupersync::Outcome::Cancelled(r) => return ::asupersync::Outcome::Cancelled(r),
            ::asupersync::Outcome::Panicked(p) => return ::asupersync::Outcome::Panicked(p),
        }
    };
}
pub(crate) use otry;

/// A request the connection can exchange with the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// COM_QUERY with the given SQL (possibly multi-statement).
    Query(String),
    /// COM_STMT_PREPARE with the given SQL.
    Prepare(String),
    /// COM_STMT_EXECUTE of a prepared statement.
    Execute {
        statement_id: u32,
        parameters: Vec<Parameter>,
    },
    /// COM_STMT_CLOSE; the server sends no response.
    CloseStatement(u32),
    /// COM_INIT_DB, switching the default database.
    InitDb(String),
    /// COM_PING.
    Ping,
}

/// One raw result row; fields are column payloads, `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub fields: Vec<Option<Vec<u8>>>,
    /// Whether the fields use the binary protocol encoding.
    pub binary: bool,
}

/// A server message emitted while answering one request.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// A completion frame (statement done, or result set terminator).
    Ok(OkPacket),
    /// A result set terminator from a server without DEPRECATE_EOF.
    Eof(EofPacket),
    /// The column metadata of a result set.
    Columns(Arc<Vec<ColumnDef>>),
    /// One result row.
    Row(RawRow),
    /// The header of a prepare response.
    PrepareOk(StmtPrepareOk),
}

/// The serialised exchange a connection drives its I/O through.
///
/// `exchange` suspends until the server's response is complete. Once the
/// request bytes are on the wire the response is always drained, even
/// when the caller is cancelled, so the connection stays usable.
pub trait Client: Send {
    /// Send one request and collect its complete response.
    fn exchange(
        &mut self,
        cx: &Cx,
        request: ClientMessage,
    ) -> impl Future<Output = Outcome<Vec<ServerMessage>, Error>> + Send;

    /// Whether the transport is still usable.
    fn is_connected(&self) -> bool;

    /// Send quit and tear the transport down.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// [`Client`] over a logged-in asupersync TCP stream.
pub struct TcpClient {
    stream: TcpStream,
    sequence_id: u8,
    connected: bool,
    capabilities: u32,
    status: Arc<AtomicU16>,
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("connected", &self.connected)
            .field("capabilities", &format_args!("{:#x}", self.capabilities))
            .finish_non_exhaustive()
    }
}

impl TcpClient {
    /// Wrap a stream on which the authentication handshake has finished.
    ///
    /// `status` is the connection's shared server-status word.
    pub fn new(stream: TcpStream, capabilities: u32, status: Arc<AtomicU16>) -> Self {
        stream.set_nodelay(true).ok();
        Self {
            stream,
            sequence_id: 0,
            connected: true,
            capabilities,
            status,
        }
    }

    fn publish_status(&self, status_flags: u16) {
        self.status.store(status_flags, Ordering::Release);
    }

    fn fatal(&mut self, message: String, source: std::io::Error) -> Error {
        self.connected = false;
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message,
            source: Some(Box::new(source)),
        })
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Outcome<(), Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let mut read_buf = ReadBuf::new(&mut buf[filled..]);
            let stream = &mut self.stream;
            let result =
                poll_fn(|cx| Pin::new(&mut *stream).poll_read(cx, &mut read_buf)).await;
            match result {
                Ok(()) => {
                    let n = read_buf.filled().len();
                    if n == 0 {
                        return Outcome::Err(self.fatal(
                            "connection closed mid-frame".to_string(),
                            std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
                        ));
                    }
                    filled += n;
                }
                Err(e) => {
                    return Outcome::Err(
                        self.fatal(format!("failed to read frame: {}", e), e),
                    );
                }
            }
        }
        Outcome::Ok(())
    }

    /// Read one complete packet, reassembling 16 MiB continuations.
    async fn read_packet(&mut self) -> Outcome<Vec<u8>, Error> {
        let mut payload = Vec::new();
        loop {
            let mut header_buf = [0u8; 4];
            otry!(self.read_exact(&mut header_buf).await);
            let header = PacketHeader::from_bytes(&header_buf);
            self.sequence_id = header.sequence_id.wrapping_add(1);

            let chunk_len = header.payload_length as usize;
            let start = payload.len();
            payload.resize(start + chunk_len, 0);
            otry!(self.read_exact(&mut payload[start..]).await);

            if chunk_len < MAX_PACKET_SIZE {
                return Outcome::Ok(payload);
            }
        }
    }

    async fn write_packet(&mut self, payload: &[u8]) -> Outcome<(), Error> {
        let writer = PacketWriter::new();
        let packet = writer.build_packet_from_payload(payload, self.sequence_id);
        self.sequence_id = self.sequence_id.wrapping_add(1);

        let mut written = 0;
        while written < packet.len() {
            let stream = &mut self.stream;
            let result =
                poll_fn(|cx| Pin::new(&mut *stream).poll_write(cx, &packet[written..])).await;
            match result {
                Ok(0) => {
                    return Outcome::Err(self.fatal(
                        "connection closed mid-write".to_string(),
                        std::io::Error::from(std::io::ErrorKind::WriteZero),
                    ));
                }
                Ok(n) => written += n,
                Err(e) => {
                    return Outcome::Err(
                        self.fatal(format!("failed to write frame: {}", e), e),
                    );
                }
            }
        }

        let stream = &mut self.stream;
        match poll_fn(|cx| Pin::new(&mut *stream).poll_flush(cx)).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => Outcome::Err(self.fatal(format!("failed to flush frame: {}", e), e)),
        }
    }

    /// Read a statement response: a sequence of completion frames and
    /// result sets, until the last one carries no more-results flag.
    async fn read_response(&mut self, binary_rows: bool) -> Outcome<Vec<ServerMessage>, Error> {
        use crate::protocol::server_status::SERVER_MORE_RESULTS_EXISTS;

        let mut messages = Vec::new();
        loop {
            let payload = otry!(self.read_packet().await);
            if payload.is_empty() {
                return Outcome::Err(Error::protocol("empty response frame"));
            }

            match PacketType::from_first_byte(payload[0], payload.len() as u32) {
                PacketType::Ok => {
                    let mut reader = PacketReader::new(&payload);
                    let Some(ok) = reader.parse_ok_packet() else {
                        return Outcome::Err(Error::protocol("malformed OK frame"));
                    };
                    self.publish_status(ok.status_flags);
                    let more = ok.status_flags & SERVER_MORE_RESULTS_EXISTS != 0;
                    messages.push(ServerMessage::Ok(ok));
                    if !more {
                        return Outcome::Ok(messages);
                    }
                }
                PacketType::Error => {
                    let mut reader = PacketReader::new(&payload);
                    let Some(err) = reader.parse_err_packet() else {
                        return Outcome::Err(Error::protocol("malformed ERR frame"));
                    };
                    return Outcome::Err(server_error(&err));
                }
                PacketType::Eof => {
                    return Outcome::Err(Error::protocol("unexpected EOF frame"));
                }
                PacketType::LocalInfile => {
                    return Outcome::Err(Error::protocol("LOCAL INFILE is not supported"));
                }
                PacketType::Data => {
                    let more = otry!(self.read_result_set(&payload, binary_rows, &mut messages).await);
                    if !more {
                        return Outcome::Ok(messages);
                    }
                }
            }
        }
    }

    /// Read one result set (columns, rows, terminator) into `messages`.
    ///
    /// Returns whether another result set follows.
    async fn read_result_set(
        &mut self,
        first_packet: &[u8],
        binary_rows: bool,
        messages: &mut Vec<ServerMessage>,
    ) -> Outcome<bool, Error> {
        use crate::protocol::server_status::SERVER_MORE_RESULTS_EXISTS;

        let mut reader = PacketReader::new(first_packet);
        let Some(column_count) = reader.read_lenenc_int() else {
            return Outcome::Err(Error::protocol("malformed column count"));
        };

        let columns = otry!(self.read_columns(column_count as usize).await);
        let columns = Arc::new(columns);
        messages.push(ServerMessage::Columns(Arc::clone(&columns)));

        loop {
            let payload = otry!(self.read_packet().await);
            if payload.is_empty() {
                return Outcome::Err(Error::protocol("empty row frame"));
            }

            match PacketType::from_first_byte(payload[0], payload.len() as u32) {
                PacketType::Error => {
                    let mut reader = PacketReader::new(&payload);
                    let Some(err) = reader.parse_err_packet() else {
                        return Outcome::Err(Error::protocol("malformed ERR frame"));
                    };
                    return Outcome::Err(server_error(&err));
                }
                // The terminator is always 0xFE-headed: an EOF frame, or an
                // OK frame wearing the EOF header on DEPRECATE_EOF servers.
                // A 0x00-headed packet here is a data row (empty first field).
                PacketType::Eof | PacketType::Ok if payload[0] == 0xFE => {
                    let status_flags;
                    if self.capabilities & capabilities::CLIENT_DEPRECATE_EOF != 0 {
                        let Some(ok) = parse_ok_after_eof_header(&payload) else {
                            return Outcome::Err(Error::protocol("malformed terminator"));
                        };
                        status_flags = ok.status_flags;
                        messages.push(ServerMessage::Ok(ok));
                    } else {
                        let mut reader = PacketReader::new(&payload);
                        let Some(eof) = reader.parse_eof_packet() else {
                            return Outcome::Err(Error::protocol("malformed terminator"));
                        };
                        status_flags = eof.status_flags;
                        messages.push(ServerMessage::Eof(eof));
                    }
                    self.publish_status(status_flags);
                    return Outcome::Ok(status_flags & SERVER_MORE_RESULTS_EXISTS != 0);
                }
                _ => {
                    let row = if binary_rows {
                        parse_binary_row(&payload, &columns)
                    } else {
                        parse_text_row(&payload, columns.len())
                    };
                    match row {
                        Ok(row) => messages.push(ServerMessage::Row(row)),
                        Err(e) => return Outcome::Err(e),
                    }
                }
            }
        }
    }

    async fn read_columns(&mut self, count: usize) -> Outcome<Vec<ColumnDef>, Error> {
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let payload = otry!(self.read_packet().await);
            let Some(column) = ColumnDef::decode(&payload) else {
                return Outcome::Err(Error::protocol("malformed column definition"));
            };
            columns.push(column);
        }

        // Servers without DEPRECATE_EOF delimit the metadata with EOF.
        if count > 0 && self.capabilities & capabilities::CLIENT_DEPRECATE_EOF == 0 {
            let payload = otry!(self.read_packet().await);
            if payload.first() != Some(&0xFE) {
                return Outcome::Err(Error::protocol("missing column metadata terminator"));
            }
        }

        Outcome::Ok(columns)
    }

    async fn read_prepare_response(&mut self) -> Outcome<Vec<ServerMessage>, Error> {
        let payload = otry!(self.read_packet().await);
        if payload.first() == Some(&0xFF) {
            let mut reader = PacketReader::new(&payload);
            let Some(err) = reader.parse_err_packet() else {
                return Outcome::Err(Error::protocol("malformed ERR frame"));
            };
            return Outcome::Err(server_error(&err));
        }

        let Some(ok) = StmtPrepareOk::parse(&payload) else {
            return Outcome::Err(Error::protocol("malformed prepare response"));
        };

        // Parameter definitions are read and dropped; the binding layer
        // types parameters from the values instead.
        otry!(self.read_columns(ok.num_params as usize).await);
        let columns = otry!(self.read_columns(ok.num_columns as usize).await);

        Outcome::Ok(vec![
            ServerMessage::PrepareOk(ok),
            ServerMessage::Columns(Arc::new(columns)),
        ])
    }
}

impl Client for TcpClient {
    fn exchange(
        &mut self,
        cx: &Cx,
        request: ClientMessage,
    ) -> impl Future<Output = Outcome<Vec<ServerMessage>, Error>> + Send {
        async move {
            if !self.connected {
                return Outcome::Err(Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Closed,
                    message: "connection is closed".to_string(),
                    source: None,
                }));
            }

            // Before the first byte is written, cancellation aborts with
            // no side effect. Afterwards the response is always drained.
            if cx.is_cancel_requested() {
                return Outcome::Cancelled(cx.cancel_reason().unwrap_or_default());
            }

            self.sequence_id = 0;
            let binary_rows = matches!(request, ClientMessage::Execute { .. });

            let payload = match encode_request(&request) {
                Ok(payload) => payload,
                Err(e) => return Outcome::Err(e),
            };
            otry!(self.write_packet(&payload).await);

            match request {
                ClientMessage::CloseStatement(_) => Outcome::Ok(Vec::new()),
                ClientMessage::Prepare(_) => self.read_prepare_response().await,
                _ => self.read_response(binary_rows).await,
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            if !self.connected {
                return Outcome::Ok(());
            }
            self.sequence_id = 0;

            // Quit is best effort; the server may drop the link first.
            let mut writer = PacketWriter::new();
            writer.write_u8(Command::Quit as u8);
            let payload = writer.into_bytes();
            let _ = self.write_packet(&payload).await;

            self.connected = false;
            Outcome::Ok(())
        }
    }
}

/// Serialise a request into a command payload.
#[allow(clippy::result_large_err)]
fn encode_request(request: &ClientMessage) -> Result<Vec<u8>> {
    let mut writer = PacketWriter::new();
    match request {
        ClientMessage::Query(sql) => {
            writer.write_u8(Command::Query as u8);
            writer.write_bytes(sql.as_bytes());
        }
        ClientMessage::Prepare(sql) => {
            writer.write_u8(Command::StmtPrepare as u8);
            writer.write_bytes(sql.as_bytes());
        }
        ClientMessage::Execute {
            statement_id,
            parameters,
        } => {
            write_stmt_execute(&mut writer, *statement_id, parameters)?;
        }
        ClientMessage::CloseStatement(statement_id) => {
            writer.write_u8(Command::StmtClose as u8);
            writer.write_u32_le(*statement_id);
        }
        ClientMessage::InitDb(database) => {
            writer.write_u8(Command::InitDb as u8);
            writer.write_bytes(database.as_bytes());
        }
        ClientMessage::Ping => {
            writer.write_u8(Command::Ping as u8);
        }
    }
    Ok(writer.into_bytes())
}

/// Write a COM_STMT_EXECUTE body: statement id, cursor flags, iteration
/// count, NULL bitmap, parameter type tags and the bound values.
#[allow(clippy::result_large_err)]
fn write_stmt_execute(
    writer: &mut PacketWriter,
    statement_id: u32,
    parameters: &[Parameter],
) -> Result<()> {
    writer.write_u8(Command::StmtExecute as u8);
    writer.write_u32_le(statement_id);
    writer.write_u8(0x00); // CURSOR_TYPE_NO_CURSOR
    writer.write_u32_le(1); // iteration count

    if parameters.is_empty() {
        return Ok(());
    }

    let mut null_bitmap = vec![0u8; parameters.len().div_ceil(8)];
    for (i, parameter) in parameters.iter().enumerate() {
        if parameter.is_null() {
            null_bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    writer.write_bytes(&null_bitmap);

    writer.write_u8(1); // new-params-bound
    for parameter in parameters {
        let ty = parameter.mysql_type();
        writer.write_u8(ty.parameter_field_type() as u8);
        writer.write_u8(if ty.is_unsigned() { 0x80 } else { 0x00 });
    }

    for parameter in parameters {
        if !parameter.is_null() {
            parameter.write_binary(writer)?;
        }
    }
    Ok(())
}

/// Parse the OK frame that replaces EOF on DEPRECATE_EOF servers.
///
/// The 0xFE header must be skipped by hand: an affected-row count of zero
/// is itself a 0x00 byte and would be mistaken for an OK marker.
fn parse_ok_after_eof_header(payload: &[u8]) -> Option<OkPacket> {
    let mut reader = PacketReader::new(payload);
    reader.skip(1);
    let affected_rows = reader.read_lenenc_int()?;
    let last_insert_id = reader.read_lenenc_int()?;
    let status_flags = reader.read_u16_le()?;
    let warnings = reader.read_u16_le()?;
    Some(OkPacket {
        affected_rows,
        last_insert_id,
        status_flags,
        warnings,
        info: reader.read_rest_string(),
    })
}

/// Map an ERR frame to the domain error taxonomy.
pub(crate) fn server_error(err: &ErrPacket) -> Error {
    let kind = match err.error_code {
        1062 | 1451 | 1452 | 1586 => QueryErrorKind::Constraint,
        1213 => QueryErrorKind::Deadlock,
        1205 => QueryErrorKind::LockWaitTimeout,
        1044 | 1045 | 1142 | 1143 => QueryErrorKind::Permission,
        1046 | 1049 | 1054 | 1146 => QueryErrorKind::NotFound,
        1064 | 1149 => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    };

    Error::Query(QueryError {
        kind,
        code: err.error_code,
        sqlstate: if err.sql_state.is_empty() {
            None
        } else {
            Some(err.sql_state.clone())
        },
        message: err.error_message.clone(),
        sql: None,
    })
}

/// Parse a text-protocol row: one length-encoded payload per column,
/// `0xFB` marking NULL.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_text_row(payload: &[u8], column_count: usize) -> Result<RawRow> {
    let mut reader = PacketReader::new(payload);
    let mut fields = Vec::with_capacity(column_count);

    for _ in 0..column_count {
        if reader.peek() == Some(0xFB) {
            reader.skip(1);
            fields.push(None);
        } else {
            match reader.read_lenenc_bytes() {
                Some(bytes) => fields.push(Some(bytes)),
                None => return Err(Error::protocol("truncated text row")),
            }
        }
    }

    Ok(RawRow {
        fields,
        binary: false,
    })
}

/// Parse a binary-protocol row: header byte, NULL bitmap at offset 2,
/// then fixed-width or length-prefixed payloads per column type.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_binary_row(payload: &[u8], columns: &[ColumnDef]) -> Result<RawRow> {
    let mut reader = PacketReader::new(payload);
    if reader.read_u8() != Some(0x00) {
        return Err(Error::protocol("malformed binary row header"));
    }

    let bitmap_len = (columns.len() + 7 + 2) / 8;
    let bitmap = reader
        .read_bytes(bitmap_len)
        .ok_or_else(|| Error::protocol("truncated binary row bitmap"))?
        .to_vec();

    let mut fields = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let bit = i + 2;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            fields.push(None);
            continue;
        }

        let ty = column.mysql_type();
        let field = if let Some(size) = ty.fixed_binary_size() {
            reader.read_bytes(size).map(<[u8]>::to_vec)
        } else if ty.is_temporal() {
            // Temporal payloads carry their own one-byte length.
            reader
                .read_u8()
                .and_then(|len| reader.read_bytes(len as usize).map(<[u8]>::to_vec))
        } else {
            reader.read_lenenc_bytes()
        };

        match field {
            Some(bytes) => fields.push(Some(bytes)),
            None => return Err(Error::protocol("truncated binary row field")),
        }
    }

    Ok(RawRow {
        fields,
        binary: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldType, MySqlType};

    fn column(field_type: FieldType, flags: u16) -> ColumnDef {
        ColumnDef {
            schema: "test".to_string(),
            table: "t".to_string(),
            name: "c".to_string(),
            org_name: "c".to_string(),
            charset: 33,
            column_length: 11,
            column_type: field_type,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn text_row_parsing() {
        // "42", NULL, "x"
        let payload = [0x02, b'4', b'2', 0xFB, 0x01, b'x'];
        let row = parse_text_row(&payload, 3).unwrap();
        assert_eq!(row.fields[0].as_deref(), Some(&b"42"[..]));
        assert_eq!(row.fields[1], None);
        assert_eq!(row.fields[2].as_deref(), Some(&b"x"[..]));
        assert!(!row.binary);

        assert!(parse_text_row(&payload, 4).is_err());
    }

    #[test]
    fn binary_row_parsing() {
        let columns = vec![
            column(FieldType::Long, 0),
            column(FieldType::VarString, 0),
            column(FieldType::Long, 0),
        ];

        // Header, bitmap (column 2 NULL -> bit 4), INT 7, "ab"
        let payload = [
            0x00,
            0b0001_0000,
            0x07, 0x00, 0x00, 0x00,
            0x02, b'a', b'b',
        ];
        let row = parse_binary_row(&payload, &columns).unwrap();
        assert_eq!(row.fields[0].as_deref(), Some(&[0x07, 0x00, 0x00, 0x00][..]));
        assert_eq!(row.fields[1].as_deref(), Some(&b"ab"[..]));
        assert_eq!(row.fields[2], None);
        assert!(row.binary);
    }

    #[test]
    fn binary_row_temporal_fields_are_length_prefixed() {
        let columns = vec![column(FieldType::DateTime, 0)];

        // Header, bitmap, 4-byte date body
        let payload = [0x00, 0x00, 0x04, 0xE5, 0x07, 0x05, 0x03];
        let row = parse_binary_row(&payload, &columns).unwrap();
        assert_eq!(row.fields[0].as_deref(), Some(&[0xE5, 0x07, 0x05, 0x03][..]));
    }

    #[test]
    fn execute_payload_layout() {
        let parameters = vec![
            Parameter::new(MySqlType::Int, vec![42, 0, 0, 0], "42".to_string()),
            Parameter::null(),
            Parameter::new(MySqlType::VarChar, vec![0x01, b'x'], "'x'".to_string()),
        ];
        let payload = encode_request(&ClientMessage::Execute {
            statement_id: 7,
            parameters,
        })
        .unwrap();

        assert_eq!(payload[0], Command::StmtExecute as u8);
        assert_eq!(&payload[1..5], &7u32.to_le_bytes());
        assert_eq!(payload[5], 0x00); // no cursor
        assert_eq!(&payload[6..10], &1u32.to_le_bytes());
        assert_eq!(payload[10], 0b0000_0010); // NULL bitmap: parameter 1
        assert_eq!(payload[11], 1); // new-params-bound

        // Type tags: INT, NULL, VAR_STRING.
        assert_eq!(payload[12], FieldType::Long as u8);
        assert_eq!(payload[13], 0x00);
        assert_eq!(payload[14], FieldType::Null as u8);
        assert_eq!(payload[16], FieldType::VarString as u8);

        // Values: only the non-NULL parameters.
        assert_eq!(&payload[18..22], &[42, 0, 0, 0]);
        assert_eq!(&payload[22..], &[0x01, b'x']);
    }

    #[test]
    fn execute_payload_marks_unsigned_types() {
        let parameters = vec![Parameter::new(
            MySqlType::SmallIntUnsigned,
            vec![0x40, 0x9C],
            "40000".to_string(),
        )];
        let payload = encode_request(&ClientMessage::Execute {
            statement_id: 1,
            parameters,
        })
        .unwrap();

        assert_eq!(payload[12], FieldType::Short as u8);
        assert_eq!(payload[13], 0x80);
    }

    #[test]
    fn server_error_mapping() {
        let err = server_error(&ErrPacket {
            error_code: 1062,
            sql_state: "23000".to_string(),
            error_message: "Duplicate entry".to_string(),
        });
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert_eq!(q.code, 1062);
                assert_eq!(q.sqlstate.as_deref(), Some("23000"));
            }
            other => panic!("expected query error, got {other:?}"),
        }

        let err = server_error(&ErrPacket {
            error_code: 1213,
            sql_state: "40001".to_string(),
            error_message: "Deadlock found".to_string(),
        });
        assert!(err.is_retryable());
    }
}
