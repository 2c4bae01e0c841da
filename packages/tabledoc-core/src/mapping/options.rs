//! Table-level options carried by entity metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Provisioning of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    /// Fixed read/write throughput
    Provisioned {
        read_units: u32,
        write_units: u32,
        storage_gb: u32,
    },
    /// Throughput billed per request
    OnDemand { storage_gb: u32 },
}

impl Default for CapacityMode {
    fn default() -> Self {
        CapacityMode::Provisioned {
            read_units: 50,
            write_units: 50,
            storage_gb: 25,
        }
    }
}

/// Read consistency requested from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    #[default]
    Eventual,
    Absolute,
}

/// Write durability requested from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    CommitSync,
    #[default]
    CommitNoSync,
    CommitWriteNoSync,
}

/// Unit of a row time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlUnit {
    Hours,
    Days,
}

/// Row time-to-live, rendered as `<value> DAYS|HOURS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ttl {
    pub value: u32,
    pub unit: TtlUnit,
}

impl Ttl {
    pub fn days(value: u32) -> Self {
        Self {
            value,
            unit: TtlUnit::Days,
        }
    }

    pub fn hours(value: u32) -> Self {
        Self {
            value,
            unit: TtlUnit::Hours,
        }
    }

    /// Total length in hours, used to compare TTLs declared in different units.
    pub fn as_hours(&self) -> u64 {
        match self.unit {
            TtlUnit::Hours => u64::from(self.value),
            TtlUnit::Days => u64::from(self.value) * 24,
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TtlUnit::Hours => "HOURS",
            TtlUnit::Days => "DAYS",
        };
        write!(f, "{} {}", self.value, unit)
    }
}

impl FromStr for Ttl {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DbError::Config(format!("invalid TTL '{}'", s)));
        };
        let value = value
            .parse::<u32>()
            .map_err(|_| DbError::Config(format!("invalid TTL value in '{}'", s)))?;
        let unit = match unit.to_ascii_uppercase().as_str() {
            "HOUR" | "HOURS" => TtlUnit::Hours,
            "DAY" | "DAYS" => TtlUnit::Days,
            _ => return Err(DbError::Config(format!("invalid TTL unit in '{}'", s))),
        };
        Ok(Self { value, unit })
    }
}

/// Options declared on an entity type. Unset options fall back to the
/// [`MapperConfig`](crate::config::MapperConfig) defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Table name (defaults to the registered type name)
    pub table_name: Option<String>,
    pub capacity: Option<CapacityMode>,
    pub ttl: Option<Ttl>,
    pub consistency: Option<Consistency>,
    pub durability: Option<Durability>,
    /// Request timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Create the table on first use
    pub auto_create: Option<bool>,
}

impl TableOptions {
    pub fn named(table_name: impl Into<String>) -> Self {
        Self {
            table_name: Some(table_name.into()),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_capacity(mut self, capacity: CapacityMode) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = Some(auto_create);
        self
    }
}
