use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Comparison carried by a leaf predicate.
///
/// The serialized names (`eq`, `gt`, ...) are also the keys used inside a
/// compiled `range` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Ne => "ne",
        }
    }

    /// Ordering comparisons force a `range` leaf.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }
}

/// Accepts both the symbolic form (`>=`) and the named form (`gte`).
impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" | "eq" => Ok(Operator::Eq),
            ">" | "gt" => Ok(Operator::Gt),
            ">=" | "gte" => Ok(Operator::Gte),
            "<" | "lt" => Ok(Operator::Lt),
            "<=" | "lte" => Ok(Operator::Lte),
            "!=" | "<>" | "ne" => Ok(Operator::Ne),
            other => Err(QueryError::Validation(format!("unknown operator: {other}"))),
        }
    }
}
