use sift_client::{ClientError, Operation};
use sift_query::{CompiledRequest, QueryError};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Rejected before anything was sent.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Passed through from the transport untouched.
    #[error("transport error: {0}")]
    Transport(#[from] ClientError),

    /// The backend answered a write without the expected acknowledgement.
    #[error(
        "{operation} failed: expected result `{expected}`, got `{}`",
        .actual.as_deref().unwrap_or("none")
    )]
    MutationFailed {
        operation: Operation,
        expected: &'static str,
        actual: Option<String>,
        request: Box<CompiledRequest>,
    },

    #[error("resource not found by id: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
