mod aggregation;
mod error;
pub mod grammar;
mod leaf;
mod operator;
mod predicate;
mod request;
mod sort;
mod state;

pub use aggregation::Aggregation;
pub use error::QueryError;
pub use grammar::{
    compile_count, compile_create, compile_delete, compile_scroll, compile_select,
    compile_update,
};
pub use leaf::LeafType;
pub use operator::Operator;
pub use predicate::{Condition, Group, LogicalOp, NESTED_PATH_SEPARATOR, Predicate};
pub use request::CompiledRequest;
pub use sort::{Sort, SortDirection, SortOrder};
pub use state::QueryState;
