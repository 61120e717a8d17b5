//! Filter nodes of a criteria query.
//!
//! Filters form a tree: leaves compare a field against a value, `Not` and
//! `Multi` combine child filters under a boolean operator. The tree is owned,
//! so it cannot contain cycles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean operator used by `Not` and `Multi` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
    #[serde(rename = "XOR", alias = "xor")]
    Xor,
}

impl Operator {
    /// Folds already-evaluated child results under this operator.
    ///
    /// An empty `AND` is true, an empty `OR`/`XOR` is false. `XOR` is true
    /// when an odd number of children match.
    pub fn combine(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            Operator::And => results.all(|r| r),
            Operator::Or => results.any(|r| r),
            Operator::Xor => results.filter(|r| *r).count() % 2 == 1,
        }
    }
}

impl std::str::FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            "XOR" => Ok(Operator::Xor),
            other => Err(format!("unknown operator: {other}")),
        }
    }
}

/// Bounds of a range filter. Unset bounds are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl RangeBounds {
    /// Inclusive range `[gte, lte]`.
    pub fn between(gte: impl Into<Value>, lte: impl Into<Value>) -> Self {
        Self {
            gte: Some(gte.into()),
            lte: Some(lte.into()),
            ..Default::default()
        }
    }

    /// Lower bound only, inclusive.
    pub fn at_least(gte: impl Into<Value>) -> Self {
        Self {
            gte: Some(gte.into()),
            ..Default::default()
        }
    }

    /// Upper bound only, inclusive.
    pub fn at_most(lte: impl Into<Value>) -> Self {
        Self {
            lte: Some(lte.into()),
            ..Default::default()
        }
    }

    /// True if no bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }
}

/// A single node of the filter tree.
///
/// The JSON representation matches the admin API: `{"type": "equals",
/// "field": "name", "value": "foo"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Filter {
    Equals {
        field: String,
        value: Value,
    },
    EqualsAny {
        field: String,
        value: Vec<Value>,
    },
    Contains {
        field: String,
        value: Value,
    },
    Prefix {
        field: String,
        value: Value,
    },
    Suffix {
        field: String,
        value: Value,
    },
    Range {
        field: String,
        parameters: RangeBounds,
    },
    /// Negation of the children combined under `operator`.
    Not {
        operator: Operator,
        queries: Vec<Filter>,
    },
    /// Children combined under `operator`.
    Multi {
        operator: Operator,
        queries: Vec<Filter>,
    },
}

impl Filter {
    /// The wire `type` tag of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Filter::Equals { .. } => "equals",
            Filter::EqualsAny { .. } => "equalsAny",
            Filter::Contains { .. } => "contains",
            Filter::Prefix { .. } => "prefix",
            Filter::Suffix { .. } => "suffix",
            Filter::Range { .. } => "range",
            Filter::Not { .. } => "not",
            Filter::Multi { .. } => "multi",
        }
    }

    /// The field a leaf filter targets. `None` for combinators.
    pub fn field(&self) -> Option<&str> {
        match self {
            Filter::Equals { field, .. }
            | Filter::EqualsAny { field, .. }
            | Filter::Contains { field, .. }
            | Filter::Prefix { field, .. }
            | Filter::Suffix { field, .. }
            | Filter::Range { field, .. } => Some(field),
            Filter::Not { .. } | Filter::Multi { .. } => None,
        }
    }

    /// Child filters of a combinator. Empty for leaves.
    pub fn children(&self) -> &[Filter] {
        match self {
            Filter::Not { queries, .. } | Filter::Multi { queries, .. } => queries,
            _ => &[],
        }
    }

    /// Number of nested levels below and including this node.
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(Filter::depth).max().unwrap_or(0)
    }

    /// Every field referenced anywhere in the tree, in visit order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self.field() {
            Some(field) => out.push(field),
            None => self.children().iter().for_each(|c| c.collect_fields(out)),
        }
    }
}
