//! Compiles a [`QueryState`] into backend request documents.
//!
//! Predicates are partitioned into priority groups: every `or` predicate
//! opens a new group. One group compiles to `bool.must`; several groups to
//! `bool.should` with each group ANDed internally. `ne` predicates go to
//! `must_not`. Under `should` a group's negations stay inside that group's
//! own branch and are never hoisted into a shared `must_not`.

use serde_json::{Map, Value};

use crate::aggregation::Aggregation;
use crate::error::QueryError;
use crate::leaf::LeafType;
use crate::predicate::{Condition, LogicalOp, Predicate};
use crate::request::CompiledRequest;
use crate::sort::SortOrder;
use crate::state::QueryState;

/// Search request. Body keys, when present, in this order:
/// `_source`, `query`, `aggs`, `sort`, `size`, `from`.
pub fn compile_select(state: &QueryState) -> Result<CompiledRequest, QueryError> {
    check(state)?;

    let mut body = Map::new();
    if !state.columns.is_empty() {
        body.insert("_source".into(), Value::from(state.columns.clone()));
    }
    if let Some(query) = compile_query(&state.predicates)? {
        body.insert("query".into(), query);
    }
    if !state.aggregations.is_empty() {
        body.insert("aggs".into(), compile_aggs(&state.aggregations));
    }
    if !state.sort.is_empty() {
        body.insert("sort".into(), compile_sort(state));
    }
    if let Some(limit) = state.limit {
        body.insert("size".into(), Value::from(limit));
    }
    if let Some(offset) = state.offset {
        body.insert("from".into(), Value::from(offset));
    }

    Ok(CompiledRequest {
        body: Some(Value::Object(body)),
        index: compile_index(state),
        doc_type: state.doc_type.clone(),
        scroll: state.scroll.clone(),
        ..Default::default()
    })
}

/// Count request: only the `query` clause survives, count endpoints reject
/// projection, sort and paging keys.
pub fn compile_count(state: &QueryState) -> Result<CompiledRequest, QueryError> {
    check(state)?;

    let mut body = Map::new();
    if let Some(query) = compile_query(&state.predicates)? {
        body.insert("query".into(), query);
    }

    Ok(CompiledRequest {
        body: Some(Value::Object(body)),
        index: compile_index(state),
        doc_type: state.doc_type.clone(),
        ..Default::default()
    })
}

pub fn compile_create(state: &QueryState, id: &str, data: Value) -> CompiledRequest {
    mutation(state, id, Some(data))
}

pub fn compile_update(state: &QueryState, id: &str, data: Value) -> CompiledRequest {
    let mut doc = Map::new();
    doc.insert("doc".into(), data);
    mutation(state, id, Some(Value::Object(doc)))
}

pub fn compile_delete(state: &QueryState, id: &str) -> CompiledRequest {
    mutation(state, id, None)
}

/// Continuation of an open scroll cursor.
pub fn compile_scroll(scroll_id: &str, lifetime: &str) -> CompiledRequest {
    CompiledRequest {
        scroll_id: Some(scroll_id.to_string()),
        scroll: Some(lifetime.to_string()),
        ..Default::default()
    }
}

/// Predicates, projection, sort and aggregations do not apply to single
/// document writes; only the target is carried.
fn mutation(state: &QueryState, id: &str, body: Option<Value>) -> CompiledRequest {
    CompiledRequest {
        id: Some(id.to_string()),
        body,
        index: compile_index(state),
        doc_type: state.doc_type.clone(),
        ..Default::default()
    }
}

fn check(state: &QueryState) -> Result<(), QueryError> {
    match state.rejection() {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

fn compile_index(state: &QueryState) -> Option<String> {
    if state.index.is_empty() {
        None
    } else {
        Some(state.index.join(","))
    }
}

fn compile_sort(state: &QueryState) -> Value {
    let entries = state
        .sort
        .iter()
        .map(|sort| {
            let order = match &sort.order {
                SortOrder::Direction(d) => object([("order", Value::from(d.as_str()))]),
                SortOrder::Raw(v) => v.clone(),
            };
            object([(sort.field.as_str(), order)])
        })
        .collect();
    Value::Array(entries)
}

fn compile_aggs(aggregations: &[Aggregation]) -> Value {
    let mut aggs = Map::new();
    for agg in aggregations {
        match agg {
            Aggregation::Field { field, agg_type } => {
                let body = object([(
                    agg_type.as_str(),
                    object([("field", Value::from(field.as_str()))]),
                )]);
                aggs.insert(Aggregation::name(field, agg_type), body);
            }
            Aggregation::Raw(doc) => {
                aggs.extend(doc.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
    Value::Object(aggs)
}

/// The `query` clause for a predicate list, `None` when there is nothing
/// to filter on.
pub fn compile_query(predicates: &[Predicate]) -> Result<Option<Value>, QueryError> {
    if predicates.is_empty() {
        return Ok(None);
    }
    compile_bool(predicates).map(Some)
}

/// Splits at every `or` predicate; the `or` predicate opens the next group.
/// A leading `or` does not produce an empty first group.
pub fn priority_groups(predicates: &[Predicate]) -> Vec<&[Predicate]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, predicate) in predicates.iter().enumerate() {
        if predicate.logical() == LogicalOp::Or && i > start {
            groups.push(&predicates[start..i]);
            start = i;
        }
    }
    if start < predicates.len() {
        groups.push(&predicates[start..]);
    }
    groups
}

fn compile_bool(predicates: &[Predicate]) -> Result<Value, QueryError> {
    let groups = priority_groups(predicates);

    if groups.len() == 1 {
        let (must, must_not) = compile_group(groups[0])?;
        return Ok(bool_clause(must, must_not));
    }

    let mut should = Vec::with_capacity(groups.len());
    for group in groups {
        let (mut must, must_not) = compile_group(group)?;
        // a lone positive member needs no wrapping
        if must_not.is_empty() && must.len() == 1 {
            should.extend(must.pop());
        } else {
            should.push(bool_clause(must, must_not));
        }
    }

    Ok(object([("bool", object([("should", Value::Array(should))]))]))
}

fn compile_group(group: &[Predicate]) -> Result<(Vec<Value>, Vec<Value>), QueryError> {
    let mut must = Vec::new();
    let mut must_not = Vec::new();
    for predicate in group {
        match predicate {
            Predicate::Group(g) if g.query.predicates.is_empty() => {}
            Predicate::Group(g) => must.push(compile_bool(&g.query.predicates)?),
            Predicate::Leaf(c) if c.is_negated() => must_not.push(compile_leaf(c)?),
            Predicate::Leaf(c) => must.push(compile_leaf(c)?),
        }
    }
    Ok((must, must_not))
}

fn bool_clause(must: Vec<Value>, must_not: Vec<Value>) -> Value {
    let mut clause = Map::new();
    if !must.is_empty() {
        clause.insert("must".into(), Value::Array(must));
    }
    if !must_not.is_empty() {
        clause.insert("must_not".into(), Value::Array(must_not));
    }
    object([("bool", Value::Object(clause))])
}

/// A single leaf clause. Columns carrying a nested path are compiled on the
/// dotted field name and then wrapped in a `nested` query.
pub fn compile_leaf(condition: &Condition) -> Result<Value, QueryError> {
    match condition.nested_path() {
        Some((path, field)) => {
            let inner = render_leaf(condition, &field)?;
            let query = bool_clause(vec![inner], Vec::new());
            Ok(object([(
                "nested",
                object([("path", Value::from(path)), ("query", query)]),
            )]))
        }
        None => render_leaf(condition, &condition.column),
    }
}

fn render_leaf(condition: &Condition, column: &str) -> Result<Value, QueryError> {
    let value = &condition.value;
    let clause = match condition.leaf {
        LeafType::Term | LeafType::Match | LeafType::Terms | LeafType::MatchPhrase => object([(
            condition.leaf.as_str(),
            object([(column, value.clone())]),
        )]),
        LeafType::Range => object([("range", object([(column, range_bounds(condition)?)]))]),
        LeafType::MultiMatch => {
            let fields: Vec<Value> = column
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(Value::from)
                .collect();
            object([(
                "multi_match",
                object([
                    ("query", value.clone()),
                    ("fields", Value::Array(fields)),
                    ("type", Value::from("phrase")),
                ]),
            )])
        }
        LeafType::Wildcard => {
            let pattern = match value {
                Value::String(s) => format!("*{s}*"),
                other => format!("*{other}*"),
            };
            object([("wildcard", object([(column, Value::from(pattern))]))])
        }
        LeafType::Exists => object([("exists", object([("field", Value::from(column))]))]),
    };
    Ok(clause)
}

fn range_bounds(condition: &Condition) -> Result<Value, QueryError> {
    match (&condition.value, condition.operator) {
        (Value::Object(_), _) => Ok(condition.value.clone()),
        (Value::Array(items), _) => Err(QueryError::Validation(format!(
            "range on `{}` expects [low, high], got {} values",
            condition.column,
            items.len()
        ))),
        (value, Some(op)) if op.is_ordering() => Ok(object([(op.as_str(), value.clone())])),
        (_, op) => Err(QueryError::Validation(format!(
            "range on `{}` needs an ordering operator, got {}",
            condition.column,
            op.map_or("none", |o| o.as_str())
        ))),
    }
}

fn object<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}
