//! Predicate trees.

use std::fmt;

use crate::types::ObjectValue;

/// Comparison applied by a leaf criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Equal,
    NotEqual,
    Before,
    After,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    StartingWith,
    EndingWith,
    Containing,
    NotContaining,
    Regex,
    Like,
    NotLike,
    Between,
    Exists,
    /// Within a radius in meters of a center point
    Near,
    /// Inside a polygon
    Within,
    True,
    False,
    /// Matches every row
    All,
}

impl OperatorKind {
    /// Number of values the operator binds.
    pub fn arity(self) -> usize {
        match self {
            OperatorKind::IsNull
            | OperatorKind::IsNotNull
            | OperatorKind::Exists
            | OperatorKind::True
            | OperatorKind::False
            | OperatorKind::All => 0,
            OperatorKind::Between | OperatorKind::Near => 2,
            _ => 1,
        }
    }

    /// Returns `true` for operators that compare ordered values.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            OperatorKind::Equal
                | OperatorKind::NotEqual
                | OperatorKind::Before
                | OperatorKind::After
                | OperatorKind::LessThan
                | OperatorKind::LessThanEqual
                | OperatorKind::GreaterThan
                | OperatorKind::GreaterThanEqual
                | OperatorKind::Between
        )
    }
}

/// Logical connective of a composite criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Junction {
    And,
    Or,
}

impl fmt::Display for Junction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Junction::And => f.write_str("AND"),
            Junction::Or => f.write_str("OR"),
        }
    }
}

/// A single condition on a property path.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub kind: OperatorKind,
    /// Dotted property path
    pub path: String,
    pub values: Vec<ObjectValue>,
    pub ignore_case: bool,
}

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Leaf(Criterion),
    Composite {
        junction: Junction,
        left: Box<Criteria>,
        right: Box<Criteria>,
    },
}

impl Criteria {
    /// Creates a leaf criterion.
    pub fn leaf(kind: OperatorKind, path: impl Into<String>, values: Vec<ObjectValue>) -> Self {
        Criteria::Leaf(Criterion {
            kind,
            path: path.into(),
            values,
            ignore_case: false,
        })
    }

    pub fn equal(path: impl Into<String>, value: impl Into<ObjectValue>) -> Self {
        Self::leaf(OperatorKind::Equal, path, vec![value.into()])
    }

    pub fn is_null(path: impl Into<String>) -> Self {
        Self::leaf(OperatorKind::IsNull, path, Vec::new())
    }

    pub fn between(
        path: impl Into<String>,
        low: impl Into<ObjectValue>,
        high: impl Into<ObjectValue>,
    ) -> Self {
        Self::leaf(OperatorKind::Between, path, vec![low.into(), high.into()])
    }

    pub fn in_list<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ObjectValue>,
    {
        Self::leaf(OperatorKind::In, path, vec![ObjectValue::list(values)])
    }

    /// The criterion matching every row.
    pub fn all() -> Self {
        Self::leaf(OperatorKind::All, "", Vec::new())
    }

    /// Marks a leaf as case-insensitive; composites are left unchanged.
    pub fn ignoring_case(mut self) -> Self {
        if let Criteria::Leaf(leaf) = &mut self {
            leaf.ignore_case = true;
        }
        self
    }

    pub fn and(self, other: Criteria) -> Self {
        Self::combine(Junction::And, self, other)
    }

    pub fn or(self, other: Criteria) -> Self {
        Self::combine(Junction::Or, self, other)
    }

    fn combine(junction: Junction, left: Criteria, right: Criteria) -> Self {
        Criteria::Composite {
            junction,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visits every leaf, left to right.
    pub fn leaves(&self) -> Vec<&Criterion> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Criterion>) {
        match self {
            Criteria::Leaf(leaf) => leaves.push(leaf),
            Criteria::Composite { left, right, .. } => {
                left.collect_leaves(leaves);
                right.collect_leaves(leaves);
            }
        }
    }
}
