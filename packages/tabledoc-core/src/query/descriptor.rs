//! Query descriptors: what to select, in which order, how much.

use serde::{Deserialize, Serialize};

use super::criteria::Criteria;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub path: String,
    pub direction: Direction,
}

/// Ordered sort keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort(Vec<Order>);

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(path: impl Into<String>, direction: Direction) -> Self {
        Self::unsorted().then(path, direction)
    }

    /// Appends a sort key.
    pub fn then(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.0.push(Order {
            path: path.into(),
            direction,
        });
        self
    }

    /// Appends every key of `other`.
    pub fn and(mut self, other: &Sort) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A page request: zero-based page number, page size and sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
    #[serde(default)]
    pub sort: Sort,
}

impl Pageable {
    pub fn of(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Number of rows before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            size: self.size,
            sort: self.sort.clone(),
        }
    }
}

/// What a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryMode {
    #[default]
    Select,
    Count,
    Exists,
    /// Selects the matching rows, which are then deleted one by one
    Delete,
}

/// Everything the compiler needs besides the entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Filter; `None` matches every row
    pub criteria: Option<Criteria>,
    pub sort: Sort,
    /// Maximum number of rows
    pub limit: Option<u64>,
    pub pageable: Option<Pageable>,
    pub distinct: bool,
    pub mode: QueryMode,
    /// Registered name of the type to project results into
    pub projection: Option<String>,
}

impl QueryDescriptor {
    /// Selects every row matching `criteria`.
    pub fn select(criteria: Criteria) -> Self {
        Self {
            criteria: Some(criteria),
            ..Self::default()
        }
    }

    /// Selects every row.
    pub fn select_all() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }

    pub fn with_projection(mut self, type_name: impl Into<String>) -> Self {
        self.projection = Some(type_name.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Sort keys of the descriptor followed by those of the page request.
    pub fn effective_sort(&self) -> Sort {
        match &self.pageable {
            Some(pageable) => self.sort.clone().and(&pageable.sort),
            None => self.sort.clone(),
        }
    }

    /// Counting variant of this query: same filter, no sort or paging.
    pub fn to_count(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            distinct: self.distinct,
            mode: QueryMode::Count,
            ..Self::default()
        }
    }
}
