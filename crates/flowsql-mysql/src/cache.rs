//! Bounded caches for parsed queries and server-prepared statements.
//!
//! Both caches evict by least-recent use, keyed on the SQL text. The
//! prepare cache additionally tracks in-flight borrows: a handle that is
//! being executed cannot be closed out from under the execute, so eviction
//! marks it closing and the last release performs the server-side close.

use crate::query::Query;
use crate::types::ColumnDef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A server-side prepared statement handle.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Server-assigned statement ID
    pub statement_id: u32,
    /// Number of parameter slots
    pub parameter_count: u16,
    /// Result column definitions from the prepare response
    pub columns: Arc<Vec<ColumnDef>>,
}

/// Bounded `SQL -> Query` cache, shareable across connections.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<HashMap<String, QueryEntry>>,
    capacity: usize,
}

#[derive(Debug)]
struct QueryEntry {
    query: Arc<Query>,
    last_used: Instant,
}

impl QueryCache {
    /// Create a cache bounded to `capacity` parsed queries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    /// Get the parsed form of `sql`, parsing on miss.
    pub fn get(&self, sql: &str) -> Arc<Query> {
        let mut cache = self.inner.lock().expect("query cache lock poisoned");

        if let Some(entry) = cache.get_mut(sql) {
            entry.last_used = Instant::now();
            return Arc::clone(&entry.query);
        }

        if cache.len() >= self.capacity {
            if let Some(lru) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(sql, _)| sql.clone())
            {
                cache.remove(&lru);
            }
        }

        let query = Arc::new(Query::parse(sql));
        cache.insert(
            sql.to_string(),
            QueryEntry {
                query: Arc::clone(&query),
                last_used: Instant::now(),
            },
        );
        query
    }

    /// Number of cached queries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("query cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Bounded `SQL -> prepared statement handle` cache.
#[derive(Debug)]
pub struct PrepareCache {
    inner: Mutex<HashMap<String, PrepareEntry>>,
    capacity: usize,
}

#[derive(Debug)]
struct PrepareEntry {
    statement: PreparedStatement,
    last_used: Instant,
    borrows: usize,
    closing: bool,
}

impl PrepareCache {
    /// Create a cache bounded to `capacity` server handles.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    /// Borrow the cached handle for `sql`, if present.
    ///
    /// The caller must pair this with [`PrepareCache::release`].
    pub fn borrow(&self, sql: &str) -> Option<PreparedStatement> {
        let mut cache = self.inner.lock().expect("prepare cache lock poisoned");
        let entry = cache.get_mut(sql)?;
        if entry.closing {
            return None;
        }
        entry.last_used = Instant::now();
        entry.borrows += 1;
        Some(entry.statement.clone())
    }

    /// Insert a freshly prepared handle and borrow it.
    ///
    /// Returns the statement IDs whose server-side close is now due
    /// because they were evicted while unborrowed.
    pub fn put_and_borrow(&self, sql: &str, statement: PreparedStatement) -> Vec<u32> {
        let mut cache = self.inner.lock().expect("prepare cache lock poisoned");
        let mut closeable = Vec::new();

        if !cache.contains_key(sql) && cache.len() >= self.capacity {
            if let Some(lru) = cache
                .iter()
                .filter(|(_, entry)| !entry.closing)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(sql, _)| sql.clone())
            {
                let entry = cache.get_mut(&lru).expect("entry just found");
                if entry.borrows == 0 {
                    closeable.push(entry.statement.statement_id);
                    cache.remove(&lru);
                } else {
                    // Borrowed handles close after the last release.
                    entry.closing = true;
                }
            }
        }

        cache.insert(
            sql.to_string(),
            PrepareEntry {
                statement,
                last_used: Instant::now(),
                borrows: 1,
                closing: false,
            },
        );
        closeable
    }

    /// Release a borrow taken by `borrow` or `put_and_borrow`.
    ///
    /// Returns the statement ID to close when this was the last borrow of
    /// an evicted handle.
    pub fn release(&self, sql: &str) -> Option<u32> {
        let mut cache = self.inner.lock().expect("prepare cache lock poisoned");
        let entry = cache.get_mut(sql)?;
        entry.borrows = entry.borrows.saturating_sub(1);

        if entry.closing && entry.borrows == 0 {
            let id = entry.statement.statement_id;
            cache.remove(sql);
            return Some(id);
        }
        None
    }

    /// Drain every cached handle, for connection close.
    pub fn drain(&self) -> Vec<u32> {
        let mut cache = self.inner.lock().expect("prepare cache lock poisoned");
        cache
            .drain()
            .map(|(_, entry)| entry.statement.statement_id)
            .collect()
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("prepare cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PrepareCache {
    fn default() -> Self {
        Self::new(256)
    }
}
