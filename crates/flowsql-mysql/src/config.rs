//! Driver configuration.

use crate::cache::{PrepareCache, QueryCache};
use crate::connection::PreparePredicate;
use crate::context::{ConnectionContext, ZeroDateOption};
use crate::protocol::charset;
use crate::version::ServerVersion;
use crate::zone::ZoneId;
use std::sync::Arc;

/// Session-level configuration for a MySQL connection.
///
/// The transport and login handshake run before the driver core sees the
/// connection, so the knobs here govern session init and value decoding.
#[derive(Clone, Default)]
pub struct MySqlConfig {
    /// Database selected after init; empty selects none.
    pub database: Option<String>,
    /// Server zone override; unset requests discovery from the init query.
    pub server_zone: Option<ZoneId>,
    /// Client-side zone; defaults to the process zone.
    pub client_zone: Option<ZoneId>,
    /// Whether zoned values keep their instant through the server zone.
    pub preserve_instants: bool,
    /// Whether TINYINT(1) decodes to a boolean.
    pub tiny_int_as_boolean: bool,
    /// Zero-date handling policy.
    pub zero_date: ZeroDateOption,
    /// Default charset for encoded strings.
    pub default_charset: Option<u8>,
    /// Bound of the shared query cache.
    pub query_cache_capacity: Option<usize>,
    /// Bound of the per-connection prepare cache.
    pub prepare_cache_capacity: Option<usize>,
    /// Judge whether a simple query should be server-prepared.
    pub prefer_prepare: Option<PreparePredicate>,
}

impl std::fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("database", &self.database)
            .field("server_zone", &self.server_zone)
            .field("preserve_instants", &self.preserve_instants)
            .field("tiny_int_as_boolean", &self.tiny_int_as_boolean)
            .field("zero_date", &self.zero_date)
            .field("prefer_prepare", &self.prefer_prepare.is_some())
            .finish_non_exhaustive()
    }
}

impl MySqlConfig {
    /// Create a configuration with default values: discover the server
    /// zone, preserve instants, TINYINT(1) as boolean, zero dates as NULL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            preserve_instants: true,
            tiny_int_as_boolean: true,
            ..Self::default()
        }
    }

    /// Set the database to select after init.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Force a server zone instead of discovering one.
    #[must_use]
    pub fn server_zone(mut self, zone: ZoneId) -> Self {
        self.server_zone = Some(zone);
        self
    }

    /// Set the client-side zone.
    #[must_use]
    pub fn client_zone(mut self, zone: ZoneId) -> Self {
        self.client_zone = Some(zone);
        self
    }

    /// Choose whether zoned values keep their instant through the server
    /// zone (default) or the client zone.
    #[must_use]
    pub fn preserve_instants(mut self, preserve: bool) -> Self {
        self.preserve_instants = preserve;
        self
    }

    /// Choose whether TINYINT(1) columns decode to booleans.
    #[must_use]
    pub fn tiny_int_as_boolean(mut self, enabled: bool) -> Self {
        self.tiny_int_as_boolean = enabled;
        self
    }

    /// Set the zero-date policy.
    #[must_use]
    pub fn zero_date(mut self, option: ZeroDateOption) -> Self {
        self.zero_date = option;
        self
    }

    /// Set the default charset for encoded strings.
    #[must_use]
    pub fn default_charset(mut self, charset: u8) -> Self {
        self.default_charset = Some(charset);
        self
    }

    /// Bound the shared query cache.
    #[must_use]
    pub fn query_cache_capacity(mut self, capacity: usize) -> Self {
        self.query_cache_capacity = Some(capacity);
        self
    }

    /// Bound the prepare cache.
    #[must_use]
    pub fn prepare_cache_capacity(mut self, capacity: usize) -> Self {
        self.prepare_cache_capacity = Some(capacity);
        self
    }

    /// Install the prefer-prepare predicate.
    #[must_use]
    pub fn prefer_prepare(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.prefer_prepare = Some(Arc::new(predicate));
        self
    }

    /// The database to select, empty when none was configured.
    #[must_use]
    pub fn database_or_empty(&self) -> &str {
        self.database.as_deref().unwrap_or("")
    }

    /// Build the connection context for a logged-in session.
    #[must_use]
    pub fn build_context(
        &self,
        server_version: ServerVersion,
        capabilities: u32,
        initial_status: u16,
    ) -> ConnectionContext {
        ConnectionContext::new(server_version, capabilities, initial_status, self.server_zone)
            .with_codec_options(
                self.client_zone.unwrap_or_else(ZoneId::system_default),
                self.preserve_instants,
                self.tiny_int_as_boolean,
                self.zero_date,
                self.default_charset.unwrap_or(charset::DEFAULT_CHARSET),
            )
    }

    /// Build the query cache this configuration asks for.
    #[must_use]
    pub fn build_query_cache(&self) -> Arc<QueryCache> {
        Arc::new(
            self.query_cache_capacity
                .map_or_else(QueryCache::default, QueryCache::new),
        )
    }

    /// Build the prepare cache this configuration asks for.
    #[must_use]
    pub fn build_prepare_cache(&self) -> Arc<PrepareCache> {
        Arc::new(
            self.prepare_cache_capacity
                .map_or_else(PrepareCache::default, PrepareCache::new),
        )
    }
}
