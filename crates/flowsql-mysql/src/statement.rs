//! Statement types and the binding layer.
//!
//! The connection's factory picks one of four execution strategies per
//! statement: a simple query goes over the text protocol unless the
//! configured prepare predicate asks for a server prepare, and a
//! parametrized query goes over the text protocol with substituted
//! literals unless a predicate is configured at all, in which case it is
//! always server-prepared.

use crate::client::{Client, ClientMessage, otry};
use crate::codec::Parameter;
use crate::connection::MySqlConnection;
use crate::query::Query;
use crate::result::MySqlResult;
use asupersync::{Cx, Outcome};
use flowsql_core::error::Error;
use flowsql_core::{Result, Value};
use std::sync::Arc;
use tracing::debug;

const QUERY_LOG_TARGET: &str = "flowsql_mysql::query";

/// An ordered set of parameters, one per marker, used once per execute.
#[derive(Debug, Default)]
pub struct Binding {
    slots: Vec<Option<Parameter>>,
}

impl Binding {
    pub(crate) fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    /// Number of parameter slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the binding has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[allow(clippy::result_large_err)]
    pub(crate) fn set(&mut self, index: usize, parameter: Parameter) -> Result<()> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(parameter);
                Ok(())
            }
            None => Err(Error::usage(format!(
                "bind index {} out of bounds ({} parameters)",
                index,
                self.slots.len()
            ))),
        }
    }

    /// Take all parameters, requiring every slot to be bound.
    #[allow(clippy::result_large_err)]
    pub(crate) fn take(&mut self) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot.take() {
                Some(parameter) => parameters.push(parameter),
                None => {
                    return Err(Error::usage(format!(
                        "parameter {} is not bound",
                        index
                    )));
                }
            }
        }
        Ok(parameters)
    }
}

/// How a statement reaches the server.
#[derive(Debug, Clone)]
pub(crate) enum StatementKind {
    /// Direct text query, no markers.
    TextSimple,
    /// Server-prepared query without markers, requested by the predicate.
    PrepareSimple,
    /// Markers substituted as text literals.
    TextParametrized(Arc<Query>),
    /// Server-prepared with binary parameter binding.
    PrepareParametrized(Arc<Query>),
}

/// A statement bound to its connection.
#[derive(Debug)]
pub struct MySqlStatement<'conn, C: Client> {
    conn: &'conn mut MySqlConnection<C>,
    sql: String,
    kind: StatementKind,
    binding: Binding,
    fetch_size: u32,
}

impl<'conn, C: Client> MySqlStatement<'conn, C> {
    pub(crate) fn new(
        conn: &'conn mut MySqlConnection<C>,
        sql: String,
        kind: StatementKind,
    ) -> Self {
        let parameters = match &kind {
            StatementKind::TextParametrized(query)
            | StatementKind::PrepareParametrized(query) => query.parameter_count(),
            _ => 0,
        };
        Self {
            conn,
            sql,
            kind,
            binding: Binding::new(parameters),
            fetch_size: 0,
        }
    }

    /// Encode and bind a value to a parameter marker.
    #[allow(clippy::result_large_err)]
    pub fn bind(&mut self, index: usize, value: &Value) -> Result<&mut Self> {
        let ctx = self.conn.codec_context();
        let parameter = self.conn.codecs().encode(value, &ctx)?;
        self.binding.set(index, parameter)?;
        Ok(self)
    }

    /// Bind SQL NULL to a parameter marker.
    #[allow(clippy::result_large_err)]
    pub fn bind_null(&mut self, index: usize) -> Result<&mut Self> {
        self.binding.set(index, Parameter::null())?;
        Ok(self)
    }

    /// Hint how many rows to fetch per server round trip.
    ///
    /// Zero keeps the default of fetching the whole result; server-side
    /// cursors beyond the hint are out of scope.
    pub fn fetch_size(&mut self, rows: u32) -> &mut Self {
        self.fetch_size = rows;
        self
    }

    /// Execute the statement, consuming its binding.
    pub async fn execute(mut self, cx: &Cx) -> Outcome<MySqlResult, Error> {
        match self.kind.clone() {
            StatementKind::TextSimple => {
                debug!(target: QUERY_LOG_TARGET, "executing direct query: {}", self.sql);
                let messages =
                    otry!(self.conn.exchange(cx, ClientMessage::Query(self.sql.clone())).await);
                Outcome::Ok(self.conn.build_result(messages))
            }
            StatementKind::PrepareSimple => {
                debug!(
                    target: QUERY_LOG_TARGET,
                    "executing simple statement via prepare: {}", self.sql
                );
                self.execute_prepared(cx, Vec::new()).await
            }
            StatementKind::TextParametrized(query) => {
                let parameters = match self.binding.take() {
                    Ok(parameters) => parameters,
                    Err(e) => return Outcome::Err(e),
                };
                let sql = match format_query(&query, parameters) {
                    Ok(sql) => sql,
                    Err(e) => return Outcome::Err(e),
                };
                debug!(target: QUERY_LOG_TARGET, "executing format query: {}", sql);
                let messages = otry!(self.conn.exchange(cx, ClientMessage::Query(sql)).await);
                Outcome::Ok(self.conn.build_result(messages))
            }
            StatementKind::PrepareParametrized(_) => {
                let parameters = match self.binding.take() {
                    Ok(parameters) => parameters,
                    Err(e) => return Outcome::Err(e),
                };
                debug!(
                    target: QUERY_LOG_TARGET,
                    "executing parametrized statement via prepare: {}", self.sql
                );
                self.execute_prepared(cx, parameters).await
            }
        }
    }

    async fn execute_prepared(
        &mut self,
        cx: &Cx,
        parameters: Vec<Parameter>,
    ) -> Outcome<MySqlResult, Error> {
        if self.fetch_size > 0 {
            // Advisory only; cursor fetch is not used for result delivery.
            debug!(target: QUERY_LOG_TARGET, "fetch size hint: {}", self.fetch_size);
        }

        let handle = otry!(self.conn.prepared_handle(cx, &self.sql).await);

        if usize::from(handle.parameter_count) != parameters.len() {
            otry!(self.conn.release_handle(cx, &self.sql).await);
            return Outcome::Err(Error::usage(format!(
                "statement expects {} parameters, {} bound",
                handle.parameter_count,
                parameters.len()
            )));
        }

        let exchange = self
            .conn
            .exchange(
                cx,
                ClientMessage::Execute {
                    statement_id: handle.statement_id,
                    parameters,
                },
            )
            .await;

        // The borrow must be released on every path, or eviction of this
        // handle would stall forever.
        let release = self.conn.release_handle(cx, &self.sql).await;
        let messages = otry!(exchange);
        otry!(release);

        Outcome::Ok(self.conn.build_result(messages))
    }
}

/// Interleave the query's literal parts with the parameters' text forms.
#[allow(clippy::result_large_err)]
fn format_query(query: &Query, parameters: Vec<Parameter>) -> Result<String> {
    let parts = query.parts();
    let mut sql = String::with_capacity(query.sql().len() + parameters.len() * 8);

    for (part, parameter) in parts.iter().zip(&parameters) {
        sql.push_str(part);
        parameter.write_text(&mut sql)?;
    }
    if let Some(tail) = parts.last() {
        sql.push_str(tail);
    }
    Ok(sql)
}
