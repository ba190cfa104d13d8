mod builder;
mod config;
mod error;
mod log;
mod mapper;

pub use builder::{Builder, Chunk, DEFAULT_CHUNK_SIZE, DEFAULT_SCROLL_LIFETIME};
pub use config::SearchConfig;
pub use error::SearchError;
pub use log::QueryLog;
pub use mapper::{Page, Record, map_hit, map_hits, total_hits};

pub use sift_client::{ClientError, HttpClient, Operation, Transport};
pub use sift_query::{
    CompiledRequest, LeafType, LogicalOp, Operator, QueryError, QueryState, SortDirection,
};
