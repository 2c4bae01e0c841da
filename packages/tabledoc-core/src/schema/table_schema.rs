//! Table descriptions as reported by the store.

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::mapping::Ttl;

/// Discovered schema of an existing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Default row TTL, e.g. `"10 DAYS"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    /// Shard key column names, in key order
    pub shard_key: Vec<String>,
    /// Primary key column names, shard key first
    pub primary_key: Vec<String>,
    /// Every column of the table
    pub fields: Vec<ColumnSchema>,
    /// Identity column, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySchema>,
}

/// One column of a discovered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    /// String column holding UUIDs
    #[serde(default)]
    pub as_uuid: bool,
    /// Value generated by the store when absent
    #[serde(default)]
    pub generated: bool,
}

/// Identity column of a discovered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySchema {
    pub name: String,
    #[serde(default)]
    pub always: bool,
    #[serde(default)]
    pub no_cycle: bool,
}

impl TableSchema {
    /// Parses the store's JSON table description.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        serde_json::from_str(json)
            .map_err(|e| DbError::Config(format!("invalid table description: {}", e)))
    }

    /// Looks up a column, ignoring case.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.fields.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Primary key columns that are not part of the shard key.
    pub fn non_shard_key(&self) -> &[String] {
        self.primary_key
            .get(self.shard_key.len()..)
            .unwrap_or_default()
    }

    /// Columns outside the primary key.
    pub fn other_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.fields.iter().filter(|c| {
            !self
                .primary_key
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&c.name))
        })
    }

    /// Parses the TTL, if any.
    pub fn parsed_ttl(&self) -> Result<Option<Ttl>, DbError> {
        self.ttl.as_deref().map(str::parse).transpose()
    }
}
