use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use sift_client::{HttpClient, Operation, Transport};
use sift_query::{
    CompiledRequest, LeafType, LogicalOp, Operator, QueryError, QueryState, SortDirection,
    compile_count, compile_create, compile_delete, compile_scroll, compile_select,
    compile_update,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::log::QueryLog;
use crate::mapper::{Page, Record, map_hits, total_hits};

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_SCROLL_LIFETIME: &str = "10m";

/// Returned by a [`Builder::chunk`] callback to keep scrolling or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    Continue,
    Stop,
}

/// Generates `&mut Self` wrappers around the `QueryState` method of the same
/// name.
macro_rules! forward {
    ($($(#[$meta:meta])* fn $name:ident($($arg:ident: $ty:ty),* $(,)?);)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, $($arg: $ty),*) -> &mut Self {
                self.state.$name($($arg),*);
                self
            }
        )*
    };
}

/// Fluent query chain bound to a transport.
///
/// Chain methods accumulate into a [`QueryState`]; terminal methods compile
/// it, send it and start a fresh chain, whether or not the call succeeded.
/// Forks made with [`Builder::new_query`] share the transport, config and
/// query log but never the chain.
pub struct Builder<T: Transport> {
    transport: Arc<T>,
    config: Arc<SearchConfig>,
    log: Arc<Mutex<QueryLog>>,
    state: QueryState,
}

impl Builder<HttpClient> {
    /// HTTP transport to the first configured host.
    pub fn connect(config: SearchConfig) -> Self {
        let client = HttpClient::with_timeout(config.primary_host(), config.timeout());
        Self::new(client, config)
    }
}

impl<T: Transport> Builder<T> {
    pub fn new(transport: T, config: SearchConfig) -> Self {
        Self::with_shared(Arc::new(transport), config)
    }

    pub fn with_shared(transport: Arc<T>, config: SearchConfig) -> Self {
        let log = QueryLog::new(config.query_log);
        Self {
            transport,
            config: Arc::new(config),
            log: Arc::new(Mutex::new(log)),
            state: QueryState::new(),
        }
    }

    /// An independent chain on the same transport, config and query log.
    pub fn new_query(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            log: Arc::clone(&self.log),
            state: self.state.new_query(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Discards the current chain.
    pub fn reset_query(&mut self) -> &mut Self {
        self.state = self.state.new_query();
        self
    }

    // ── Chain ───────────────────────────────────────────────────

    forward! {
        fn index(name: impl Into<String>);
        fn indices(names: impl IntoIterator<Item = impl Into<String>>);
        fn doc_type(name: impl Into<String>);
        fn limit(value: usize);
        fn take(value: usize);
        fn offset(value: usize);
        fn skip(value: usize);
        fn scroll(lifetime: impl Into<String>);
        fn select(columns: impl IntoIterator<Item = impl Into<String>>);
        fn order_by(field: impl Into<String>, direction: SortDirection);
        fn order_by_raw(field: impl Into<String>, order: Value);
        fn agg_by(field: impl Into<String>, agg_type: impl Into<String>);
        fn agg_raw(aggregation: Value);

        fn where_with(
            column: impl Into<String>,
            operator: Option<Operator>,
            value: impl Into<Value>,
            leaf: LeafType,
            logical: LogicalOp,
        );
        fn where_raw(
            column: impl Into<String>,
            operator: Option<&str>,
            value: impl Into<Value>,
            leaf: &str,
            logical: LogicalOp,
        );
        fn where_eq(column: impl Into<String>, value: impl Into<Value>);
        fn or_where_eq(column: impl Into<String>, value: impl Into<Value>);
        fn where_op(column: impl Into<String>, operator: Operator, value: impl Into<Value>);
        fn or_where_op(column: impl Into<String>, operator: Operator, value: impl Into<Value>);
        fn where_term(column: impl Into<String>, value: impl Into<Value>);
        fn or_where_term(column: impl Into<String>, value: impl Into<Value>);
        fn where_terms(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn or_where_terms(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn where_match(column: impl Into<String>, value: impl Into<Value>);
        fn or_where_match(column: impl Into<String>, value: impl Into<Value>);
        fn where_match_phrase(column: impl Into<String>, value: impl Into<Value>);
        fn or_where_match_phrase(column: impl Into<String>, value: impl Into<Value>);
        fn where_multi_match(fields: impl IntoIterator<Item = impl Into<String>>, query: impl Into<Value>);
        fn or_where_multi_match(fields: impl IntoIterator<Item = impl Into<String>>, query: impl Into<Value>);
        fn where_wildcard(column: impl Into<String>, value: impl Into<Value>);
        fn or_where_wildcard(column: impl Into<String>, value: impl Into<Value>);
        fn where_range(column: impl Into<String>, operator: Operator, value: impl Into<Value>);
        fn or_where_range(column: impl Into<String>, operator: Operator, value: impl Into<Value>);
        fn where_between(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn or_where_between(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn where_not_between(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn or_where_not_between(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn where_exists(column: impl Into<String>);
        fn or_where_exists(column: impl Into<String>);
        fn where_not_exists(column: impl Into<String>);
        fn or_where_not_exists(column: impl Into<String>);
        fn where_in(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        fn or_where_in(column: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>);
        /// The closure fills a fresh child chain that is added as one group.
        fn where_nested(build: impl FnOnce(&mut QueryState));
        fn or_where_nested(build: impl FnOnce(&mut QueryState));
    }

    // ── Reads ───────────────────────────────────────────────────

    /// The search request the current chain would send. The chain is left
    /// as it is.
    pub fn to_request(&self) -> Result<CompiledRequest, SearchError> {
        let state = self.with_defaults(self.state.clone());
        Ok(compile_select(&state)?)
    }

    /// Runs the search and returns the raw backend response.
    pub fn get_raw(&mut self) -> Result<Value, SearchError> {
        let state = self.take_state();
        let request = compile_select(&state)?;
        self.run(Operation::Search, &request)
    }

    pub fn get(&mut self) -> Result<Vec<Record>, SearchError> {
        let response = self.get_raw()?;
        map_hits(&response)
    }

    pub fn first(&mut self) -> Result<Option<Record>, SearchError> {
        self.state.limit(1);
        Ok(self.get()?.into_iter().next())
    }

    pub fn by_id(&mut self, id: &str) -> Result<Option<Record>, SearchError> {
        // an `_id` term appended after an `or` would only join the last group
        if self.state.predicates.iter().any(|p| p.logical() == LogicalOp::Or) {
            let predicates = std::mem::take(&mut self.state.predicates);
            self.state.where_nested(|q| q.predicates = predicates);
        }
        self.state.where_term("_id", id);
        self.first()
    }

    pub fn by_id_or_fail(&mut self, id: &str) -> Result<Record, SearchError> {
        self.by_id(id)?
            .ok_or_else(|| SearchError::NotFound(id.to_string()))
    }

    pub fn count(&mut self) -> Result<u64, SearchError> {
        let state = self.take_state();
        let request = compile_count(&state)?;
        let response = self.run(Operation::Count, &request)?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::UnexpectedResponse("missing count".into()))
    }

    /// One page of results; `page` is 1-based. An explicit offset or limit on
    /// the chain wins over the computed one.
    pub fn paginate(&mut self, page: usize, per_page: usize) -> Result<Page, SearchError> {
        let mut state = self.take_state();
        if per_page == 0 {
            return Err(QueryError::Validation("per_page must be greater than zero".into()).into());
        }
        let page = page.max(1);
        let Some(from) = (page - 1).checked_mul(per_page) else {
            return Err(QueryError::Validation(format!(
                "page {page} of {per_page} overflows the result window"
            ))
            .into());
        };
        if state.offset.is_none() {
            state.offset(from);
        }
        if state.limit.is_none() {
            state.limit(per_page);
        }

        let request = compile_select(&state)?;
        let response = self.run(Operation::Search, &request)?;
        let total = total_hits(&response)?;
        Ok(Page::new(page, per_page, total, map_hits(&response)?))
    }

    /// [`chunk_with`](Self::chunk_with) using 2000-hit pages and a `10m`
    /// scroll lifetime.
    pub fn chunk<F>(&mut self, callback: F) -> Result<Chunk, SearchError>
    where
        F: FnMut(Vec<Record>) -> Chunk,
    {
        self.chunk_with(DEFAULT_CHUNK_SIZE, DEFAULT_SCROLL_LIFETIME, callback)
    }

    /// Scrolls through the whole result set, handing each page to `callback`
    /// until it returns [`Chunk::Stop`] or the pages run out. Returns
    /// `Chunk::Stop` when the callback stopped early.
    ///
    /// At most `total / size` pages are fetched after the first one. An
    /// empty page ends the scroll without calling `callback`.
    pub fn chunk_with<F>(
        &mut self,
        size: usize,
        lifetime: &str,
        mut callback: F,
    ) -> Result<Chunk, SearchError>
    where
        F: FnMut(Vec<Record>) -> Chunk,
    {
        let mut state = self.take_state();
        let size = *state.limit.get_or_insert(size);
        if size == 0 {
            return Err(QueryError::Validation("chunk size must be greater than zero".into()).into());
        }
        let lifetime = state
            .scroll
            .get_or_insert_with(|| lifetime.to_string())
            .clone();

        let request = compile_select(&state)?;
        let mut response = self.run(Operation::Search, &request)?;
        let total = total_hits(&response)?;
        if total == 0 {
            return Ok(Chunk::Continue);
        }

        let mut remaining = total / size as u64;
        loop {
            let records = map_hits(&response)?;
            if records.is_empty() {
                break;
            }
            if callback(records) == Chunk::Stop {
                debug!(remaining, "chunk stopped by callback");
                return Ok(Chunk::Stop);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;

            let scroll_id = response
                .get("_scroll_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::UnexpectedResponse("missing _scroll_id".into()))?;
            let request = compile_scroll(scroll_id, &lifetime);
            response = self.run(Operation::Scroll, &request)?;
        }

        Ok(Chunk::Continue)
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Stores `data` under `id`, else under its own `"id"` field, else under
    /// a new time-ordered UUID. Returns the document with `_id` added.
    pub fn create(&mut self, data: Value, id: Option<&str>) -> Result<Record, SearchError> {
        let state = self.take_state();
        let Value::Object(mut fields) = data else {
            return Err(QueryError::Validation("document must be a JSON object".into()).into());
        };

        let id = match (id, fields.get("id")) {
            (Some(id), _) => id.to_string(),
            (None, Some(Value::String(id))) => id.clone(),
            (None, Some(Value::Number(id))) => id.to_string(),
            _ => Uuid::now_v7().to_string(),
        };

        let request = compile_create(&state, &id, Value::Object(fields.clone()));
        self.mutate(Operation::Create, "created", request)?;

        fields.insert("_id".into(), Value::String(id));
        Ok(Record::from(fields))
    }

    /// Partial update: only the fields in `data` change.
    pub fn update(&mut self, id: &str, data: Value) -> Result<(), SearchError> {
        let state = self.take_state();
        let request = compile_update(&state, id, data);
        self.mutate(Operation::Update, "updated", request)?;
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<(), SearchError> {
        let state = self.take_state();
        let request = compile_delete(&state, id);
        self.mutate(Operation::Delete, "deleted", request)?;
        Ok(())
    }

    // ── Query log ───────────────────────────────────────────────

    pub fn enable_query_log(&self) {
        self.log().set_enabled(true);
    }

    pub fn disable_query_log(&self) {
        self.log().set_enabled(false);
    }

    pub fn query_log(&self) -> Vec<CompiledRequest> {
        self.log().entries().to_vec()
    }

    pub fn last_query(&self) -> Option<CompiledRequest> {
        self.log().last().cloned()
    }

    pub fn clear_query_log(&self) {
        self.log().clear();
    }

    // ── Internals ───────────────────────────────────────────────

    /// Takes the chain, leaving a fresh one behind, and fills in the
    /// configured index and type where the chain has none.
    fn take_state(&mut self) -> QueryState {
        let fresh = self.state.new_query();
        let state = std::mem::replace(&mut self.state, fresh);
        self.with_defaults(state)
    }

    fn with_defaults(&self, mut state: QueryState) -> QueryState {
        if state.index.is_empty() {
            if let Some(index) = &self.config.index {
                state.index(index.as_str());
            }
        }
        if state.doc_type.is_none() {
            if let Some(doc_type) = &self.config.doc_type {
                state.doc_type(doc_type.as_str());
            }
        }
        state
    }

    fn log(&self) -> MutexGuard<'_, QueryLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, operation: Operation, request: &CompiledRequest) -> Result<Value, SearchError> {
        self.log().record(request);
        debug!(%operation, index = ?request.index, "executing request");
        Ok(self.transport.execute(operation, request)?)
    }

    /// Sends a write and checks the backend's `result` acknowledgement.
    fn mutate(
        &self,
        operation: Operation,
        expected: &'static str,
        request: CompiledRequest,
    ) -> Result<Value, SearchError> {
        let response = self.run(operation, &request)?;
        let actual = response
            .get("result")
            .and_then(Value::as_str)
            .map(String::from);
        if actual.as_deref() == Some(expected) {
            return Ok(response);
        }

        warn!(%operation, expected, actual = ?actual, id = ?request.id, "write not acknowledged");
        Err(SearchError::MutationFailed {
            operation,
            expected,
            actual,
            request: Box::new(request),
        })
    }
}
