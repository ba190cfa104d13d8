use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sift_query::CompiledRequest;

use crate::client::ClientError;

/// Backend endpoint a compiled request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Search,
    Count,
    Create,
    Update,
    Delete,
    Scroll,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Scroll => "scroll",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes compiled requests against a search backend.
///
/// Implementations own connection handling, retries and authentication.
/// The returned document is the raw backend response; callers only inspect
/// `hits`, `count`, `_scroll_id` and `result`.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        operation: Operation,
        request: &CompiledRequest,
    ) -> Result<Value, ClientError>;
}
