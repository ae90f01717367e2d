//! The MySQL connection state machine.
//!
//! A connection is initialised from a logged-in client by one discovery
//! query (session isolation level, lock wait timeout, server product and,
//! when requested, the server time zone), then serves statements until it
//! is closed. Transaction state is inferred client-side: MySQL exposes no
//! query for the current transaction's isolation level, so the connection
//! tracks what it has set and reverts on commit or rollback. The
//! in-transaction and auto-commit facts come from the server-status bits
//! carried on every completion frame.

use crate::cache::{PrepareCache, PreparedStatement, QueryCache};
use crate::client::{Client, ClientMessage, ServerMessage, otry};
use crate::codec::{Codecs, TargetType};
use crate::context::{CodecContext, ConnectionContext};
use crate::protocol::server_status::{SERVER_STATUS_AUTOCOMMIT, SERVER_STATUS_IN_TRANS};
use crate::result::MySqlResult;
use crate::statement::{MySqlStatement, StatementKind};
use crate::version::ServerVersion;
use crate::zone;
use asupersync::{Cx, Outcome};
use flowsql_core::connection::{
    Connection, IsolationLevel, TransactionDefinition, ValidationDepth,
};
use flowsql_core::error::Error;
use flowsql_core::{Result, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// User hook deciding whether a simple query should be server-prepared.
pub type PreparePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

const DEFAULT_LOCK_WAIT_TIMEOUT: u64 = 50;

/// Static facts about the connected server.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    server_version: String,
    product: Option<String>,
}

impl ConnectionMetadata {
    /// The server version string from the handshake.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// The `@@version_comment` product string, when the server sent one.
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }
}

/// A session on one MySQL connection.
pub struct MySqlConnection<C: Client> {
    client: C,
    codecs: Arc<Codecs>,
    context: Arc<ConnectionContext>,
    metadata: ConnectionMetadata,
    query_cache: Arc<QueryCache>,
    prepare_cache: Arc<PrepareCache>,
    prepare: Option<PreparePredicate>,
    batch_supported: bool,
    /// Isolation level set at session scope.
    session_level: IsolationLevel,
    /// Isolation level inferred for the current transaction; reverts to
    /// the session level when a transaction ends.
    current_level: IsolationLevel,
    /// Session lock wait timeout, seconds.
    lock_wait_timeout: u64,
    /// Lock wait timeout of the current transaction, seconds.
    current_lock_wait_timeout: u64,
}

impl<C: Client> std::fmt::Debug for MySqlConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("server_version", &self.metadata.server_version)
            .field("session_level", &self.session_level)
            .field("current_level", &self.current_level)
            .field("lock_wait_timeout", &self.lock_wait_timeout)
            .field("batch_supported", &self.batch_supported)
            .finish_non_exhaustive()
    }
}

impl<C: Client> MySqlConnection<C> {
    /// Initialise a connection after login.
    ///
    /// Issues the discovery query, adopts the resolved server zone, and
    /// selects the initial database when `database` is non-empty (creating
    /// it when it does not exist yet).
    #[allow(clippy::too_many_arguments)]
    pub async fn init(
        cx: &Cx,
        mut client: C,
        codecs: Arc<Codecs>,
        context: Arc<ConnectionContext>,
        database: &str,
        query_cache: Arc<QueryCache>,
        prepare_cache: Arc<PrepareCache>,
        prepare: Option<PreparePredicate>,
    ) -> Outcome<Self, Error> {
        let mut query = String::with_capacity(128);
        query.push_str("SELECT ");
        query.push_str(transaction_isolation_column(&context));
        query.push_str(",@@innodb_lock_wait_timeout AS l,@@version_comment AS v");
        let discover_zone = context.should_discover_zone();
        if discover_zone {
            query.push_str(",@@system_time_zone AS s,@@time_zone AS t");
        }

        let messages = otry!(client.exchange(cx, ClientMessage::Query(query)).await);
        let result =
            MySqlResult::from_messages(messages, Arc::clone(&codecs), context.codec_context());

        let (level, lock_wait_timeout, product) = {
            let Some(row) = result.rows().next() else {
                return Outcome::Err(Error::protocol("init query returned no rows"));
            };

            let level = convert_isolation_level(string_field(&row, 0));
            let lock_wait_timeout = match int_field(&row, 1) {
                Some(timeout) if timeout >= 0 => timeout.unsigned_abs(),
                _ => {
                    warn!(
                        "lock wait timeout missing in session, falling back to {} seconds",
                        DEFAULT_LOCK_WAIT_TIMEOUT
                    );
                    DEFAULT_LOCK_WAIT_TIMEOUT
                }
            };
            let product = string_field(&row, 2);

            if discover_zone {
                let system_time_zone = string_field(&row, 3);
                let time_zone = string_field(&row, 4);
                let resolved = zone::resolve_server_zone(
                    system_time_zone.as_deref(),
                    time_zone.as_deref(),
                );
                debug!(zone = %resolved, "server time zone resolved by init query");
                context.set_server_zone(resolved);
            }

            (level, lock_wait_timeout, product)
        };

        let batch_supported = context.is_multi_statements_allowed();
        if batch_supported {
            debug!("batch is supported by the server");
        } else {
            debug!("multi-statement batch unavailable, statements run one by one");
        }

        let metadata = ConnectionMetadata {
            server_version: context.server_version().to_string(),
            product,
        };

        let mut conn = Self {
            client,
            codecs,
            context,
            metadata,
            query_cache,
            prepare_cache,
            prepare,
            batch_supported,
            session_level: level,
            current_level: level,
            lock_wait_timeout,
            current_lock_wait_timeout: lock_wait_timeout,
        };

        if !database.is_empty() {
            otry!(conn.select_database(cx, database).await);
        }

        Outcome::Ok(conn)
    }

    /// Switch to `database`, creating it when the first attempt fails.
    async fn select_database(&mut self, cx: &Cx, database: &str) -> Outcome<(), Error> {
        let request = ClientMessage::InitDb(database.to_string());
        match self.client.exchange(cx, request.clone()).await {
            Outcome::Ok(_) => return Outcome::Ok(()),
            Outcome::Err(Error::Query(e)) => {
                debug!(
                    code = e.code,
                    "use database failed, creating {}: {}", database, e.message
                );
            }
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        let create = format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_identifier(database)
        );
        otry!(self.exec_void(cx, create).await);

        // A second failure here is fatal.
        otry!(self.client.exchange(cx, request).await);
        Outcome::Ok(())
    }

    /// Static facts about the connected server.
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// The session isolation level currently in effect.
    pub fn session_isolation_level(&self) -> IsolationLevel {
        self.session_level
    }

    /// The session lock wait timeout in seconds.
    pub fn session_lock_wait_timeout(&self) -> u64 {
        self.lock_wait_timeout
    }

    /// The lock wait timeout of the current transaction in seconds.
    pub fn current_lock_wait_timeout(&self) -> u64 {
        self.current_lock_wait_timeout
    }

    /// Pool hook: called after the connection is handed out. No work.
    pub fn post_allocate(&mut self) -> Outcome<(), Error> {
        Outcome::Ok(())
    }

    /// Pool hook: roll back before the connection returns to the pool.
    pub async fn pre_release(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.is_in_transaction() {
            otry!(self.done_transaction(cx, false).await);
        }
        Outcome::Ok(())
    }

    pub(crate) fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    pub(crate) fn codec_context(&self) -> CodecContext {
        self.context.codec_context()
    }

    pub(crate) async fn exchange(
        &mut self,
        cx: &Cx,
        request: ClientMessage,
    ) -> Outcome<Vec<ServerMessage>, Error> {
        self.client.exchange(cx, request).await
    }

    pub(crate) fn build_result(&self, messages: Vec<ServerMessage>) -> MySqlResult {
        MySqlResult::from_messages(messages, Arc::clone(&self.codecs), self.codec_context())
    }

    /// Borrow the server handle for `sql`, preparing on a cache miss.
    pub(crate) async fn prepared_handle(
        &mut self,
        cx: &Cx,
        sql: &str,
    ) -> Outcome<PreparedStatement, Error> {
        if let Some(handle) = self.prepare_cache.borrow(sql) {
            return Outcome::Ok(handle);
        }

        let messages = otry!(
            self.client
                .exchange(cx, ClientMessage::Prepare(sql.to_string()))
                .await
        );

        let mut prepare_ok = None;
        let mut columns = Arc::new(Vec::new());
        for message in messages {
            match message {
                ServerMessage::PrepareOk(ok) => prepare_ok = Some(ok),
                ServerMessage::Columns(c) => columns = c,
                _ => {}
            }
        }
        let Some(ok) = prepare_ok else {
            return Outcome::Err(Error::protocol("prepare returned no header"));
        };

        let handle = PreparedStatement {
            statement_id: ok.statement_id,
            parameter_count: ok.num_params,
            columns,
        };

        for evicted in self.prepare_cache.put_and_borrow(sql, handle.clone()) {
            self.close_statement_quietly(cx, evicted).await;
        }
        Outcome::Ok(handle)
    }

    /// Release a handle borrow, closing it when eviction was deferred.
    pub(crate) async fn release_handle(&mut self, cx: &Cx, sql: &str) -> Outcome<(), Error> {
        if let Some(evicted) = self.prepare_cache.release(sql) {
            self.close_statement_quietly(cx, evicted).await;
        }
        Outcome::Ok(())
    }

    /// Close an evicted server statement; failures are logged, never
    /// propagated.
    async fn close_statement_quietly(&mut self, cx: &Cx, statement_id: u32) {
        match self
            .client
            .exchange(cx, ClientMessage::CloseStatement(statement_id))
            .await
        {
            Outcome::Ok(_) => debug!(statement_id, "closed evicted server statement"),
            Outcome::Err(e) => {
                warn!(statement_id, "failed to close evicted statement: {}", e);
            }
            Outcome::Cancelled(_) | Outcome::Panicked(_) => {}
        }
    }

    async fn exec_void(&mut self, cx: &Cx, sql: String) -> Outcome<(), Error> {
        otry!(self.client.exchange(cx, ClientMessage::Query(sql)).await);
        Outcome::Ok(())
    }

    /// Run a statement sequence, batched into one exchange when the server
    /// accepts multi-statements.
    async fn run_statements(&mut self, cx: &Cx, statements: Vec<String>) -> Outcome<(), Error> {
        if statements.len() > 1 && self.batch_supported {
            return self.exec_void(cx, statements.join("; ")).await;
        }
        for sql in statements {
            otry!(self.exec_void(cx, sql).await);
        }
        Outcome::Ok(())
    }

    /// Finish a transaction and restore session-scoped settings.
    async fn done_transaction(&mut self, cx: &Cx, commit: bool) -> Outcome<(), Error> {
        let mut statements = Vec::with_capacity(2);
        statements.push(if commit { "COMMIT" } else { "ROLLBACK" }.to_string());
        if self.current_lock_wait_timeout != self.lock_wait_timeout {
            statements.push(format!(
                "SET innodb_lock_wait_timeout={}",
                self.lock_wait_timeout
            ));
        }

        otry!(self.run_statements(cx, statements).await);
        self.current_level = self.session_level;
        self.current_lock_wait_timeout = self.lock_wait_timeout;
        Outcome::Ok(())
    }

    fn is_session_auto_commit(&self) -> bool {
        self.context.server_statuses() & SERVER_STATUS_AUTOCOMMIT != 0
    }

    fn statement_kind(&self, sql: &str) -> StatementKind {
        let query = self.query_cache.get(sql);

        if query.is_simple() {
            return match &self.prepare {
                Some(predicate) if predicate(sql) => {
                    debug!("create a simple statement via prepare query");
                    StatementKind::PrepareSimple
                }
                _ => {
                    debug!("create a simple statement via text query");
                    StatementKind::TextSimple
                }
            };
        }

        if self.prepare.is_none() {
            debug!("create a parametrized statement via text query");
            StatementKind::TextParametrized(query)
        } else {
            debug!("create a parametrized statement via prepare query");
            StatementKind::PrepareParametrized(query)
        }
    }
}

impl<C: Client> Connection for MySqlConnection<C> {
    type Statement<'conn>
        = MySqlStatement<'conn, C>
    where
        Self: 'conn;

    fn create_statement<'conn>(
        &'conn mut self,
        sql: &str,
    ) -> Result<MySqlStatement<'conn, C>> {
        let kind = self.statement_kind(sql);
        Ok(MySqlStatement::new(self, sql.to_string(), kind))
    }

    fn begin_transaction_with(
        &mut self,
        cx: &Cx,
        definition: TransactionDefinition,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            let mut statements = Vec::with_capacity(3);
            if let Some(timeout) = definition.lock_wait_timeout {
                statements.push(format!(
                    "SET innodb_lock_wait_timeout={}",
                    timeout.as_secs()
                ));
            }
            if let Some(level) = definition.isolation {
                statements.push(format!(
                    "SET TRANSACTION ISOLATION LEVEL {}",
                    level.as_sql()
                ));
            }
            statements.push(begin_statement(&definition));

            otry!(self.run_statements(cx, statements).await);

            if let Some(level) = definition.isolation {
                self.current_level = level;
            }
            if let Some(timeout) = definition.lock_wait_timeout {
                self.current_lock_wait_timeout = timeout.as_secs();
            }
            Outcome::Ok(())
        }
    }

    fn commit_transaction(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.done_transaction(cx, true)
    }

    fn rollback_transaction(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.done_transaction(cx, false)
    }

    fn create_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let sql = savepoint_sql("SAVEPOINT", name);
        async move {
            match sql {
                Ok(sql) => self.exec_void(cx, sql).await,
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn release_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let sql = savepoint_sql("RELEASE SAVEPOINT", name);
        async move {
            match sql {
                Ok(sql) => self.exec_void(cx, sql).await,
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn rollback_to_savepoint(
        &mut self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let sql = savepoint_sql("ROLLBACK TO SAVEPOINT", name);
        async move {
            match sql {
                Ok(sql) => self.exec_void(cx, sql).await,
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn is_in_transaction(&self) -> bool {
        self.context.server_statuses() & SERVER_STATUS_IN_TRANS != 0
    }

    fn is_auto_commit(&self) -> bool {
        // Within a transaction auto-commit stays suspended until COMMIT
        // or ROLLBACK, whatever the session flag says.
        !self.is_in_transaction() && self.is_session_auto_commit()
    }

    fn set_auto_commit(
        &mut self,
        cx: &Cx,
        auto_commit: bool,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            if auto_commit == self.is_session_auto_commit() {
                return Outcome::Ok(());
            }
            self.exec_void(cx, format!("SET autocommit={}", u8::from(auto_commit)))
                .await
        }
    }

    fn transaction_isolation_level(&self) -> IsolationLevel {
        // Advisory: inferred from this session's own statements; changes
        // made by external SQL on the same connection are not observable.
        self.current_level
    }

    fn set_transaction_isolation_level(
        &mut self,
        cx: &Cx,
        level: IsolationLevel,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            let sql = format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            otry!(self.exec_void(cx, sql).await);

            if self.is_in_transaction() {
                // Mid-transaction the override applies to this transaction
                // only; the session level is restored on commit/rollback.
                self.current_level = level;
            } else {
                self.session_level = level;
                self.current_level = level;
            }
            Outcome::Ok(())
        }
    }

    fn set_lock_wait_timeout(
        &mut self,
        cx: &Cx,
        timeout: Duration,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            let seconds = timeout.as_secs();
            otry!(
                self.exec_void(cx, format!("SET innodb_lock_wait_timeout={}", seconds))
                    .await
            );
            self.lock_wait_timeout = seconds;
            self.current_lock_wait_timeout = seconds;
            Outcome::Ok(())
        }
    }

    fn set_statement_timeout(
        &mut self,
        _cx: &Cx,
        _timeout: Duration,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        // Extension point: MySQL has no session statement timeout the
        // driver can set here yet.
        async { Outcome::Ok(()) }
    }

    fn validate(
        &mut self,
        cx: &Cx,
        depth: ValidationDepth,
    ) -> impl Future<Output = bool> + Send {
        async move {
            if !self.client.is_connected() {
                return false;
            }
            if depth == ValidationDepth::Local {
                return true;
            }

            match self.client.exchange(cx, ClientMessage::Ping).await {
                Outcome::Ok(_) => true,
                Outcome::Err(e) => {
                    debug!("remote validation failed: {}", e);
                    false
                }
                Outcome::Cancelled(_) | Outcome::Panicked(_) => false,
            }
        }
    }

    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            debug!("connection closing");
            self.prepare_cache.drain();
            self.client.close(cx).await
        }
    }
}

/// Quote an identifier: wrap in backticks, doubling any inner backtick.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for ch in name.chars() {
        if ch == '`' {
            quoted.push('`');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}

/// Undo [`quote_identifier`].
#[must_use]
pub fn unquote_identifier(quoted: &str) -> String {
    let inner = quoted
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(quoted);
    inner.replace("``", "`")
}

#[allow(clippy::result_large_err)]
fn savepoint_sql(command: &str, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::usage("savepoint name must not be empty"));
    }
    Ok(format!("{} {}", command, quote_identifier(name)))
}

fn begin_statement(definition: &TransactionDefinition) -> String {
    if definition.read_only.is_none() && !definition.consistent_snapshot {
        return "BEGIN".to_string();
    }

    let mut modifiers = Vec::with_capacity(2);
    match definition.read_only {
        Some(true) => modifiers.push("READ ONLY"),
        Some(false) => modifiers.push("READ WRITE"),
        None => {}
    }
    if definition.consistent_snapshot {
        modifiers.push("WITH CONSISTENT SNAPSHOT");
    }
    format!("START TRANSACTION {}", modifiers.join(", "))
}

/// Pick the isolation variable for the discovery query.
///
/// `@@tx_isolation` is deprecated: MariaDB renames it from 11.1.1, MySQL
/// from 8.0.3 and in the [5.7.20, 8.0.0) window.
fn transaction_isolation_column(context: &ConnectionContext) -> &'static str {
    let version = context.server_version();

    if version.is_mariadb() {
        return if version.is_at_least(&ServerVersion::new(11, 1, 1)) {
            "@@transaction_isolation AS i"
        } else {
            "@@tx_isolation AS i"
        };
    }

    if version.is_at_least(&ServerVersion::new(8, 0, 3))
        || (version.is_at_least(&ServerVersion::new(5, 7, 20))
            && version.is_before(&ServerVersion::new(8, 0, 0)))
    {
        "@@transaction_isolation AS i"
    } else {
        "@@tx_isolation AS i"
    }
}

fn convert_isolation_level(name: Option<String>) -> IsolationLevel {
    match name.as_deref() {
        Some("READ-UNCOMMITTED") => IsolationLevel::ReadUncommitted,
        Some("READ-COMMITTED") => IsolationLevel::ReadCommitted,
        Some("REPEATABLE-READ") => IsolationLevel::RepeatableRead,
        Some("SERIALIZABLE") => IsolationLevel::Serializable,
        Some(other) => {
            warn!(
                level = other,
                "unknown isolation level in session, falling back to repeatable read"
            );
            IsolationLevel::RepeatableRead
        }
        None => {
            warn!("isolation level missing in session, falling back to repeatable read");
            IsolationLevel::RepeatableRead
        }
    }
}

fn string_field(row: &crate::result::MySqlRow<'_>, index: usize) -> Option<String> {
    match row.get(index, TargetType::String) {
        Ok(Value::Text(text)) => Some(text),
        _ => None,
    }
}

fn int_field(row: &crate::result::MySqlRow<'_>, index: usize) -> Option<i64> {
    match row.get(index, TargetType::I64) {
        Ok(value) => value.as_i64(),
        _ => None,
    }
}
