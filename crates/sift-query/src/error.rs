use std::fmt;

/// Rejections raised while building or compiling a query. Neither variant
/// ever results in a request reaching the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Malformed predicate input, e.g. a range array that is not a pair.
    Validation(String),
    /// A leaf type the grammar has no rendering for.
    UnsupportedLeafType(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Validation(msg) => write!(f, "invalid query: {msg}"),
            QueryError::UnsupportedLeafType(leaf) => write!(f, "unsupported leaf type: {leaf}"),
        }
    }
}

impl std::error::Error for QueryError {}
