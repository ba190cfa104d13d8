use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Match semantics applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafType {
    Term,
    Match,
    Terms,
    MatchPhrase,
    Range,
    MultiMatch,
    Wildcard,
    Exists,
}

impl LeafType {
    pub fn as_str(self) -> &'static str {
        match self {
            LeafType::Term => "term",
            LeafType::Match => "match",
            LeafType::Terms => "terms",
            LeafType::MatchPhrase => "match_phrase",
            LeafType::Range => "range",
            LeafType::MultiMatch => "multi_match",
            LeafType::Wildcard => "wildcard",
            LeafType::Exists => "exists",
        }
    }
}

impl FromStr for LeafType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "term" => Ok(LeafType::Term),
            "match" => Ok(LeafType::Match),
            "terms" => Ok(LeafType::Terms),
            "match_phrase" => Ok(LeafType::MatchPhrase),
            "range" => Ok(LeafType::Range),
            "multi_match" => Ok(LeafType::MultiMatch),
            "wildcard" => Ok(LeafType::Wildcard),
            "exists" => Ok(LeafType::Exists),
            other => Err(QueryError::UnsupportedLeafType(other.to_string())),
        }
    }
}
