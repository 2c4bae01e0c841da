//! Mapper configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::mapping::{CapacityMode, Consistency, Durability};

/// Mapper configuration.
///
/// Every field has a default, so a JSON file only needs to name the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Maximum prepared queries kept in the cache (0 = unbounded)
    pub query_cache_capacity: u64,
    /// Lifetime of a cached prepared query in milliseconds (0 = no expiry)
    pub query_cache_lifetime_ms: u64,
    /// Store request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Consistency for entities that do not declare one
    pub consistency: Consistency,
    /// Durability for entities that do not declare one
    pub durability: Durability,
    /// Table limits for entities that do not declare a capacity mode
    pub default_capacity: CapacityMode,
    /// Create missing tables on first use, unless the entity says otherwise
    pub auto_create_tables: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: 1000,
            query_cache_lifetime_ms: 600_000, // 10 minutes
            request_timeout_ms: 5000,         // 5 seconds
            consistency: Consistency::default(),
            durability: Durability::default(),
            default_capacity: CapacityMode::default(),
            auto_create_tables: true,
        }
    }
}

impl MapperConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, DbError> {
        serde_json::from_str(json).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path of the JSON file
    ///
    /// # Returns
    /// The parsed configuration, or `DbError::Config` if the file cannot be
    /// read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
