//! Error types for flowsql operations.

use std::fmt;

/// The primary error type for all flowsql operations.
#[derive(Debug)]
pub enum Error {
    /// Transport-level errors (connect, disconnect, teardown)
    Connection(ConnectionError),
    /// Server-reported errors (ERR frames)
    Query(QueryError),
    /// Value decode/encode errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Wire-level protocol errors (unexpected frames, under-runs)
    Protocol(ProtocolError),
    /// Bad arguments rejected before any wire traffic
    Usage(UsageError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(std::io::Error),
    /// Operation timed out
    Timeout,
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
    /// Connection has been closed and cannot be used
    Closed,
    /// Connection refused
    Refused,
}

/// A server-reported error, carrying the MySQL error code and SQLSTATE.
#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// Vendor error code (e.g. 1062 for ER_DUP_ENTRY)
    pub code: u16,
    /// Five-character SQLSTATE, when the server sent one
    pub sqlstate: Option<String>,
    pub message: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Deadlock detected
    Deadlock,
    /// Lock wait timeout exceeded
    LockWaitTimeout,
    /// Other database error
    Database,
}

/// A decode or encode failure for a single value.
#[derive(Debug)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    /// The (column type, target type) pair has no registered conversion
    UnsupportedConversion,
    /// Text payload failed to parse as the target type
    ParseSyntax,
    /// Widened value does not fit the requested narrower target
    Overflow,
    /// No codec claims the runtime type of an encoded value
    NoCodec,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub enum TransactionErrorKind {
    /// No transaction is active
    NotInTransaction,
    /// Savepoint not found
    SavepointNotFound,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// A caller mistake caught before anything is written to the wire.
#[derive(Debug)]
pub struct UsageError {
    pub message: String,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Build a usage error from a message.
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(UsageError {
            message: message.into(),
        })
    }

    /// Build a protocol error from a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: None,
            source: None,
        })
    }

    /// Is this error fatal for the connection (transport or protocol corruption)?
    ///
    /// Server errors and per-value decode errors leave the connection usable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Protocol(_) | Error::Io(_)
        )
    }

    /// Is this a retryable error (deadlock, lock wait timeout)?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Query(q) => matches!(
                q.kind,
                QueryErrorKind::Deadlock | QueryErrorKind::LockWaitTimeout
            ),
            Error::Timeout => true,
            _ => false,
        }
    }

    /// Get the SQLSTATE if available (e.g., "23000" for integrity violation).
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the vendor error code if available.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Query(q) => Some(q.code),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a unique constraint violation?
    pub fn is_duplicate_key(&self) -> bool {
        self.code == 1062
    }

    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.code == 1451 || self.code == 1452
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => match &e.sqlstate {
                Some(sqlstate) => write!(
                    f,
                    "Server error {} (SQLSTATE {}): {}",
                    e.code, sqlstate, e.message
                ),
                None => write!(f, "Server error {}: {}", e.code, e.message),
            },
            Error::Type(e) => match &e.column {
                Some(col) => write!(
                    f,
                    "Type error in column '{}': expected {}, found {}",
                    col, e.expected, e.actual
                ),
                None => write!(f, "Type error: expected {}, found {}", e.expected, e.actual),
            },
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Usage(e) => write!(f, "Usage error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sqlstate {
            Some(sqlstate) => write!(
                f,
                "{} (code {}, SQLSTATE {})",
                self.message, self.code, sqlstate
            ),
            None => write!(f, "{} (code {})", self.message, self.code),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.actual)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<UsageError> for Error {
    fn from(err: UsageError) -> Self {
        Error::Usage(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for flowsql operations.
pub type Result<T> = std::result::Result<T, Error>;
