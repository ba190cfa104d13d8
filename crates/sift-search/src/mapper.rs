use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SearchError;

/// One hit: the stored `_source` fields plus `_id` and `_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn id(&self) -> Option<&str> {
        self.0.get("_id").and_then(Value::as_str)
    }

    pub fn score(&self) -> Option<f64> {
        self.0.get("_score").and_then(Value::as_f64)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record(fields)
    }
}

/// Merges `_source` with the hit's `_id` and `_score`; metadata wins over a
/// stored field of the same name.
pub fn map_hit(hit: &Value) -> Record {
    let mut fields = match hit.get("_source") {
        Some(Value::Object(source)) => source.clone(),
        _ => Map::new(),
    };
    fields.insert(
        "_id".into(),
        hit.get("_id").cloned().unwrap_or(Value::Null),
    );
    fields.insert(
        "_score".into(),
        hit.get("_score").cloned().unwrap_or(Value::Null),
    );
    Record(fields)
}

/// Maps `hits.hits[]` in backend order.
pub fn map_hits(response: &Value) -> Result<Vec<Record>, SearchError> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::UnexpectedResponse("missing hits.hits".into()))?;
    Ok(hits.iter().map(map_hit).collect())
}

/// `hits.total`, either a bare integer or `{"value": n}`.
pub fn total_hits(response: &Value) -> Result<u64, SearchError> {
    let total = response
        .pointer("/hits/total")
        .ok_or_else(|| SearchError::UnexpectedResponse("missing hits.total".into()))?;
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
        .ok_or_else(|| SearchError::UnexpectedResponse(format!("invalid hits.total: {total}")))
}

/// One page of results with its position in the whole result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub total: u64,
    pub per_page: usize,
    pub current_page: usize,
    pub next_page: usize,
    pub total_pages: usize,
    pub from: usize,
    pub to: usize,
    pub data: Vec<Record>,
}

impl Page {
    /// `page` is 1-based. Positions saturate at `usize::MAX`.
    pub fn new(page: usize, per_page: usize, total: u64, data: Vec<Record>) -> Self {
        let total_pages = total.div_ceil(per_page.max(1) as u64);
        let total_pages = usize::try_from(total_pages).unwrap_or(usize::MAX);
        let from = page.saturating_sub(1).saturating_mul(per_page);
        Self {
            total,
            per_page,
            current_page: page,
            next_page: page.saturating_add(1).min(total_pages),
            total_pages,
            from,
            to: from.saturating_add(per_page),
            data,
        }
    }
}
