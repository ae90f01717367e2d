//! Database connection abstractions.
//!
//! This module defines the session-level vocabulary shared by flowsql
//! drivers:
//!
//! - [`IsolationLevel`] - SQL transaction isolation levels
//! - [`ValidationDepth`] - how far a liveness check should go
//! - [`TransactionDefinition`] - attributes applied when starting a transaction
//! - [`Connection`] - the driver-facing session trait
//!
//! All suspending operations integrate with asupersync's structured
//! concurrency via a `Cx` context and return `Outcome` for proper
//! cancellation handling. Suspending operations take `&mut self`: a
//! session serialises its requests, and exclusive access is how the type
//! system enforces that.

use crate::error::Error;
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::time::Duration;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Transactions can see uncommitted changes from others.
    ReadUncommitted,

    /// Transactions only see committed changes from others.
    ReadCommitted,

    /// Transactions see a consistent snapshot of the database.
    /// This is the MySQL session default.
    #[default]
    RepeatableRead,

    /// Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// How far [`Connection::validate`] should go to check liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDepth {
    /// Check only the client-side transport state.
    Local,
    /// Round-trip a ping to the server.
    Remote,
}

/// Attributes applied when starting a transaction.
///
/// An empty definition starts a plain transaction with session defaults.
///
/// # Example
///
/// ```rust,ignore
/// let def = TransactionDefinition::new()
///     .isolation(IsolationLevel::Serializable)
///     .read_only(true)
///     .consistent_snapshot(true);
/// conn.begin_transaction_with(&cx, def).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionDefinition {
    /// Isolation level for this transaction only.
    pub isolation: Option<IsolationLevel>,
    /// READ ONLY / READ WRITE access mode.
    pub read_only: Option<bool>,
    /// Whether to start with a consistent snapshot.
    pub consistent_snapshot: bool,
    /// Lock wait timeout for this transaction only.
    pub lock_wait_timeout: Option<Duration>,
}

impl TransactionDefinition {
    /// Create an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the definition carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.isolation.is_none()
            && self.read_only.is_none()
            && !self.consistent_snapshot
            && self.lock_wait_timeout.is_none()
    }

    /// Set the isolation level for this transaction.
    #[must_use]
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set the access mode for this transaction.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Start the transaction with a consistent snapshot.
    #[must_use]
    pub fn consistent_snapshot(mut self, enabled: bool) -> Self {
        self.consistent_snapshot = enabled;
        self
    }

    /// Set the lock wait timeout for this transaction.
    #[must_use]
    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = Some(timeout);
        self
    }
}

/// A non-blocking database session.
///
/// Requests on one connection are strictly serialised in submission order;
/// there is no multiplexing. All operations take a `Cx` context for
/// cancellation support and commit their in-memory side effects only on
/// confirmed server success.
pub trait Connection: Send {
    /// The statement type produced by [`Connection::create_statement`].
    type Statement<'conn>
    where
        Self: 'conn;

    /// Create a statement for the given SQL.
    #[allow(clippy::result_large_err)]
    fn create_statement<'conn>(
        &'conn mut self,
        sql: &str,
    ) -> Result<Self::Statement<'conn>, Error>;

    /// Begin a transaction with session defaults.
    fn begin_transaction(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.begin_transaction_with(cx, TransactionDefinition::default())
    }

    /// Begin a transaction with the given definition.
    fn begin_transaction_with(
        &mut self,
        cx: &Cx,
        definition: TransactionDefinition,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the current transaction.
    fn commit_transaction(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the current transaction.
    fn rollback_transaction(&mut self, cx: &Cx)
    -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Create a savepoint in the current transaction.
    fn create_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Release a savepoint in the current transaction.
    fn release_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back to a savepoint in the current transaction.
    fn rollback_to_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Whether a transaction is active on this session.
    fn is_in_transaction(&self) -> bool;

    /// Whether the session is in auto-commit mode.
    ///
    /// Effective auto-commit is false whenever a transaction is active.
    fn is_auto_commit(&self) -> bool;

    /// Enable or disable auto-commit.
    fn set_auto_commit(
        &mut self,
        cx: &Cx,
        auto_commit: bool,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Get the isolation level inferred for the current transaction.
    fn transaction_isolation_level(&self) -> IsolationLevel;

    /// Set the session isolation level.
    fn set_transaction_isolation_level(
        &mut self,
        cx: &Cx,
        level: IsolationLevel,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Set the session lock wait timeout.
    fn set_lock_wait_timeout(
        &mut self,
        cx: &Cx,
        timeout: Duration,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Set the statement timeout.
    ///
    /// Drivers without server support treat this as a no-op extension point.
    fn set_statement_timeout(
        &mut self,
        cx: &Cx,
        timeout: Duration,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Check connection liveness.
    ///
    /// `Remote` validation round-trips a ping and reports `false` on any
    /// failure; it never returns an error.
    fn validate(
        &mut self,
        cx: &Cx,
        depth: ValidationDepth,
    ) -> impl Future<Output = bool> + Send;

    /// Close the connection gracefully.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}
