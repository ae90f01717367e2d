//! Reactive MySQL driver core for flowsql.
//!
//! This crate implements the two halves that turn a logged-in MySQL
//! stream into a typed, non-blocking session:
//!
//! - the **connection state machine**: init discovery (isolation level,
//!   lock wait timeout, server time zone), transaction and savepoint
//!   flows, statement dispatch with prepared-statement caching, ping
//!   validation and graceful close;
//! - the **codec registry**: per-type encoders and decoders covering the
//!   MySQL column types over both the text and the binary wire encoding,
//!   driven by the declared column type and the requested target type.
//!
//! # MySQL protocol overview
//!
//! MySQL uses a packet-based protocol with a 3-byte payload length plus a
//! 1-byte sequence number per frame; payloads over 16MB - 1 are split.
//! Requests on a connection are strictly serialised; every request is
//! answered by a complete response (OK, ERR, or a result set run to its
//! terminator), and completion frames carry the server-status bits the
//! session state derives from.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowsql_mysql::{MySqlConfig, MySqlConnection, TcpClient};
//!
//! let config = MySqlConfig::new().database("app");
//! let context = Arc::new(config.build_context(version, capabilities, status));
//! let client = TcpClient::new(stream, capabilities, context.status_word());
//!
//! let mut conn = MySqlConnection::init(
//!     &cx,
//!     client,
//!     Arc::new(Codecs::default()),
//!     context,
//!     config.database_or_empty(),
//!     config.build_query_cache(),
//!     config.build_prepare_cache(),
//!     config.prefer_prepare.clone(),
//! )
//! .await?;
//!
//! let rows = conn.create_statement("SELECT 1")?.execute(&cx).await?;
//! ```

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod context;
pub mod protocol;
pub mod query;
pub mod result;
pub mod statement;
pub mod types;
pub mod version;
pub mod zone;

pub use cache::{PrepareCache, PreparedStatement, QueryCache};
pub use client::{Client, ClientMessage, RawRow, ServerMessage, TcpClient};
pub use codec::{Codecs, Parameter, TargetType};
pub use config::MySqlConfig;
pub use connection::{
    ConnectionMetadata, MySqlConnection, PreparePredicate, quote_identifier, unquote_identifier,
};
pub use context::{CodecContext, ConnectionContext, ZeroDateOption};
pub use query::Query;
pub use result::{MySqlResult, MySqlRow};
pub use statement::{Binding, MySqlStatement};
pub use types::{ColumnDef, FieldType, MySqlType};
pub use version::ServerVersion;
pub use zone::ZoneId;
