//! Cache of prepared query handles, keyed by query text.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::config::MapperConfig;
use crate::error::DbError;
use crate::store::PreparedStatement;

/// Bounded, concurrent cache of prepared statements.
///
/// Entries are evicted least-recently-used once `capacity` is reached and
/// expire `lifetime` after insertion; either bound is disabled by 0.
/// Lookups return private copies, so callers can bind variables without
/// touching the cached handle.
pub struct PreparedQueryCache {
    entries: Cache<String, PreparedStatement>,
}

impl PreparedQueryCache {
    /// Creates a cache.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries (0 = unbounded)
    /// * `lifetime` - Time to live of an entry (zero = no expiry)
    pub fn new(capacity: u64, lifetime: Duration) -> Self {
        let mut builder = Cache::builder().eviction_policy(EvictionPolicy::lru());
        if capacity > 0 {
            builder = builder.max_capacity(capacity);
        }
        if !lifetime.is_zero() {
            builder = builder.time_to_live(lifetime);
        }
        Self {
            entries: builder.build(),
        }
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        Self::new(
            config.query_cache_capacity,
            Duration::from_millis(config.query_cache_lifetime_ms),
        )
    }

    /// Returns a copy of the cached handle for `text`, preparing and caching
    /// it on a miss.
    ///
    /// # Arguments
    /// * `text` - Query text, also the cache key
    /// * `prepare` - Compiles `text` on a miss
    ///
    /// # Returns
    /// A handle sharing the cached compiled form, with empty bindings.
    pub fn get_or_prepare<F>(&self, text: &str, prepare: F) -> Result<PreparedStatement, DbError>
    where
        F: FnOnce(&str) -> Result<PreparedStatement, DbError>,
    {
        if let Some(cached) = self.entries.get(text) {
            return Ok(cached.fresh_copy());
        }

        tracing::debug!("Prepared query cache miss: {}", text);
        let prepared = prepare(text)?.fresh_copy();
        self.entries.insert(text.to_string(), prepared.clone());
        Ok(prepared)
    }

    /// Removes the handle for `text`.
    pub fn invalidate(&self, text: &str) {
        self.entries.invalidate(text);
    }

    /// Removes every handle; called after DDL changes a table.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        tracing::debug!("Prepared query cache cleared");
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    /// Number of cached handles after pending evictions are applied.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies pending evictions.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl std::fmt::Debug for PreparedQueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQueryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
