use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leaf::LeafType;
use crate::operator::Operator;
use crate::state::QueryState;

/// Separator marking a nested-document path inside a column name:
/// `comments@author` addresses `author` inside the `comments` nested objects.
pub const NESTED_PATH_SEPARATOR: char = '@';

/// How a predicate joins the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

/// A single filter on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub leaf: LeafType,
    pub operator: Option<Operator>,
    pub value: Value,
    pub logical: LogicalOp,
}

impl Condition {
    /// Splits a nested column into `(path, dotted_field)`.
    ///
    /// `comments@author` yields `("comments", "comments.author")`; columns
    /// without the separator yield `None`.
    pub fn nested_path(&self) -> Option<(&str, String)> {
        let (path, _) = self.column.split_once(NESTED_PATH_SEPARATOR)?;
        Some((path, self.column.replace(NESTED_PATH_SEPARATOR, ".")))
    }

    pub fn is_negated(&self) -> bool {
        self.operator == Some(Operator::Ne)
    }
}

/// A sub-query whose predicates were collected on their own child state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub query: QueryState,
    pub logical: LogicalOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Leaf(Condition),
    Group(Group),
}

impl Predicate {
    pub fn logical(&self) -> LogicalOp {
        match self {
            Predicate::Leaf(c) => c.logical,
            Predicate::Group(g) => g.logical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(column: &str) -> Condition {
        Condition {
            column: column.into(),
            leaf: LeafType::Term,
            operator: Some(Operator::Eq),
            value: json!("x"),
            logical: LogicalOp::And,
        }
    }

    #[test]
    fn plain_column_has_no_nested_path() {
        assert!(condition("status").nested_path().is_none());
    }

    #[test]
    fn nested_column_splits_into_path_and_dotted_field() {
        let c = condition("comments@author");
        assert_eq!(
            c.nested_path(),
            Some(("comments", "comments.author".to_string()))
        );
    }

    #[test]
    fn deeper_nested_column_joins_every_segment() {
        let c = condition("comments@author@name");
        assert_eq!(
            c.nested_path(),
            Some(("comments", "comments.author.name".to_string()))
        );
    }
}
