use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::aggregation::Aggregation;
use crate::error::QueryError;
use crate::leaf::LeafType;
use crate::operator::Operator;
use crate::predicate::{Condition, Group, LogicalOp, Predicate};
use crate::sort::{Sort, SortDirection, SortOrder};

/// Accumulates one query chain: predicates in insertion order, projection,
/// sort, aggregations, target and paging.
///
/// Every fluent method returns `&mut Self`. Input that cannot be compiled is
/// not appended; the first such rejection is kept and returned by the next
/// compile, so a malformed chain never reaches the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub sort: Vec<Sort>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    #[serde(default)]
    pub index: Vec<String>,
    pub doc_type: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub scroll: Option<String>,
    #[serde(skip)]
    rejected: Option<QueryError>,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty state. Used for nested groups and after every
    /// terminal call.
    pub fn new_query(&self) -> Self {
        Self::default()
    }

    /// The first input rejected by this chain, if any.
    pub fn rejection(&self) -> Option<&QueryError> {
        self.rejected.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    fn reject(&mut self, err: QueryError) {
        if self.rejected.is_none() {
            self.rejected = Some(err);
        }
    }

    // ── Target / shaping ────────────────────────────────────────

    pub fn index(&mut self, name: impl Into<String>) -> &mut Self {
        self.index = vec![name.into()];
        self
    }

    pub fn indices<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn doc_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.doc_type = Some(name.into());
        self
    }

    pub fn limit(&mut self, value: usize) -> &mut Self {
        self.limit = Some(value);
        self
    }

    pub fn take(&mut self, value: usize) -> &mut Self {
        self.limit(value)
    }

    pub fn offset(&mut self, value: usize) -> &mut Self {
        self.offset = Some(value);
        self
    }

    pub fn skip(&mut self, value: usize) -> &mut Self {
        self.offset(value)
    }

    /// Scroll lifetime such as `"10m"`. Only meaningful together with a limit.
    pub fn scroll(&mut self, lifetime: impl Into<String>) -> &mut Self {
        self.scroll = Some(lifetime.into());
        self
    }

    /// Replaces the projection. Duplicate names are kept once.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.clear();
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self
    }

    /// Sorting the same field again replaces its order in place.
    pub fn order_by(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.push_sort(field.into(), SortOrder::Direction(direction))
    }

    pub fn order_by_raw(&mut self, field: impl Into<String>, order: Value) -> &mut Self {
        self.push_sort(field.into(), SortOrder::Raw(order))
    }

    fn push_sort(&mut self, field: String, order: SortOrder) -> &mut Self {
        match self.sort.iter_mut().find(|s| s.field == field) {
            Some(existing) => existing.order = order,
            None => self.sort.push(Sort { field, order }),
        }
        self
    }

    pub fn agg_by(&mut self, field: impl Into<String>, agg_type: impl Into<String>) -> &mut Self {
        self.aggregations.push(Aggregation::Field {
            field: field.into(),
            agg_type: agg_type.into(),
        });
        self
    }

    /// Appends a pre-built aggregation document such as
    /// `{"by_tag": {"terms": {"field": "tag"}}}`.
    pub fn agg_raw(&mut self, aggregation: Value) -> &mut Self {
        match aggregation {
            Value::Object(map) => self.aggregations.push(Aggregation::Raw(map)),
            other => self.reject(QueryError::Validation(format!(
                "aggregation document must be an object, got {other}"
            ))),
        }
        self
    }

    // ── Predicates ──────────────────────────────────────────────

    /// General form behind every `where_*` method.
    ///
    /// An ordering operator forces a `range` leaf. A two-element array on a
    /// `range` leaf becomes `{"gte": low, "lte": high}`; arrays of any other
    /// length are rejected.
    pub fn where_with(
        &mut self,
        column: impl Into<String>,
        operator: Option<Operator>,
        value: impl Into<Value>,
        leaf: LeafType,
        logical: LogicalOp,
    ) -> &mut Self {
        let column = column.into();
        let mut value = value.into();

        let leaf = if operator.is_some_and(Operator::is_ordering) {
            LeafType::Range
        } else {
            leaf
        };

        if leaf == LeafType::Range {
            if let Value::Array(items) = &value {
                match items.as_slice() {
                    [low, high] => value = json!({ "gte": low, "lte": high }),
                    _ => {
                        let len = items.len();
                        self.reject(QueryError::Validation(format!(
                            "range on `{column}` expects [low, high], got {len} values"
                        )));
                        return self;
                    }
                }
            }
        }

        self.predicates.push(Predicate::Leaf(Condition {
            column,
            leaf,
            operator,
            value,
            logical,
        }));
        self
    }

    /// String-typed form: `operator` is a symbol (`>=`) or name (`gte`),
    /// `leaf` a leaf name (`match_phrase`).
    pub fn where_raw(
        &mut self,
        column: impl Into<String>,
        operator: Option<&str>,
        value: impl Into<Value>,
        leaf: &str,
        logical: LogicalOp,
    ) -> &mut Self {
        let operator = match operator.map(str::parse::<Operator>).transpose() {
            Ok(op) => op,
            Err(e) => {
                self.reject(e);
                return self;
            }
        };
        match leaf.parse::<LeafType>() {
            Ok(leaf) => self.where_with(column, operator, value, leaf, logical),
            Err(e) => {
                self.reject(e);
                self
            }
        }
    }

    /// `column == value` as a `term` leaf.
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Term, LogicalOp::And)
    }

    pub fn or_where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Term, LogicalOp::Or)
    }

    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(operator), value, LeafType::Term, LogicalOp::And)
    }

    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(operator), value, LeafType::Term, LogicalOp::Or)
    }

    pub fn where_term(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_eq(column, value)
    }

    pub fn or_where_term(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.or_where_eq(column, value)
    }

    pub fn where_terms<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_with(column, Some(Operator::Eq), values, LeafType::Terms, LogicalOp::And)
    }

    pub fn or_where_terms<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_with(column, Some(Operator::Eq), values, LeafType::Terms, LogicalOp::Or)
    }

    pub fn where_match(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Match, LogicalOp::And)
    }

    pub fn or_where_match(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Match, LogicalOp::Or)
    }

    pub fn where_match_phrase(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(
            column,
            Some(Operator::Eq),
            value,
            LeafType::MatchPhrase,
            LogicalOp::And,
        )
    }

    pub fn or_where_match_phrase(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(
            column,
            Some(Operator::Eq),
            value,
            LeafType::MatchPhrase,
            LogicalOp::Or,
        )
    }

    /// Phrase query over several fields; they are stored comma-joined.
    pub fn where_multi_match<I, S>(&mut self, fields: I, query: impl Into<Value>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let column = join_fields(fields);
        self.where_with(
            column,
            Some(Operator::Eq),
            query,
            LeafType::MultiMatch,
            LogicalOp::And,
        )
    }

    pub fn or_where_multi_match<I, S>(&mut self, fields: I, query: impl Into<Value>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let column = join_fields(fields);
        self.where_with(
            column,
            Some(Operator::Eq),
            query,
            LeafType::MultiMatch,
            LogicalOp::Or,
        )
    }

    /// Substring match; the value is wrapped as `*value*` at compile time.
    pub fn where_wildcard(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Wildcard, LogicalOp::And)
    }

    pub fn or_where_wildcard(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), value, LeafType::Wildcard, LogicalOp::Or)
    }

    pub fn where_range(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(operator), value, LeafType::Range, LogicalOp::And)
    }

    pub fn or_where_range(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.where_with(column, Some(operator), value, LeafType::Range, LogicalOp::Or)
    }

    /// Inclusive range; `values` must hold exactly `[low, high]`.
    pub fn where_between<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.between(column.into(), values, None, LogicalOp::And)
    }

    pub fn or_where_between<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.between(column.into(), values, None, LogicalOp::Or)
    }

    pub fn where_not_between<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.between(column.into(), values, Some(Operator::Ne), LogicalOp::And)
    }

    pub fn or_where_not_between<I, V>(
        &mut self,
        column: impl Into<String>,
        values: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.between(column.into(), values, Some(Operator::Ne), LogicalOp::Or)
    }

    fn between<I, V>(
        &mut self,
        column: String,
        values: I,
        operator: Option<Operator>,
        logical: LogicalOp,
    ) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_with(column, operator, values, LeafType::Range, logical)
    }

    pub fn where_exists(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), Value::Null, LeafType::Exists, LogicalOp::And)
    }

    pub fn or_where_exists(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_with(column, Some(Operator::Eq), Value::Null, LeafType::Exists, LogicalOp::Or)
    }

    pub fn where_not_exists(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_with(column, Some(Operator::Ne), Value::Null, LeafType::Exists, LogicalOp::And)
    }

    pub fn or_where_not_exists(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_with(column, Some(Operator::Ne), Value::Null, LeafType::Exists, LogicalOp::Or)
    }

    /// "any of `values`": a nested OR-group with one `term` per value. An
    /// empty list is a validation error.
    pub fn where_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.any_of(column.into(), values, LogicalOp::And)
    }

    pub fn or_where_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.any_of(column.into(), values, LogicalOp::Or)
    }

    fn any_of<I, V>(&mut self, column: String, values: I, logical: LogicalOp) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.reject(QueryError::Validation(format!(
                "where_in on `{column}` needs at least one value"
            )));
            return self;
        }
        self.nested(logical, |q| {
            for value in values {
                q.or_where_term(column.as_str(), value);
            }
        })
    }

    /// Collects the closure's predicates on a child state and appends them
    /// as one group. A group that ends up empty is dropped.
    pub fn where_nested(&mut self, build: impl FnOnce(&mut QueryState)) -> &mut Self {
        self.nested(LogicalOp::And, build)
    }

    pub fn or_where_nested(&mut self, build: impl FnOnce(&mut QueryState)) -> &mut Self {
        self.nested(LogicalOp::Or, build)
    }

    fn nested(&mut self, logical: LogicalOp, build: impl FnOnce(&mut QueryState)) -> &mut Self {
        let mut child = self.new_query();
        build(&mut child);

        if let Some(err) = child.rejected.take() {
            self.reject(err);
            return self;
        }
        if !child.predicates.is_empty() {
            self.predicates.push(Predicate::Group(Group {
                query: child,
                logical,
            }));
        }
        self
    }
}

fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields
        .into_iter()
        .map(Into::into)
        .collect::<Vec<String>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_condition(state: &QueryState) -> &Condition {
        assert_eq!(state.predicates.len(), 1);
        match &state.predicates[0] {
            Predicate::Leaf(c) => c,
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn where_eq_defaults_to_equality_term() {
        let mut q = QueryState::new();
        q.where_eq("status", "active");

        let c = only_condition(&q);
        assert_eq!(c.column, "status");
        assert_eq!(c.operator, Some(Operator::Eq));
        assert_eq!(c.leaf, LeafType::Term);
        assert_eq!(c.logical, LogicalOp::And);
        assert_eq!(c.value, json!("active"));
    }

    #[test]
    fn ordering_operator_forces_range_leaf() {
        let mut q = QueryState::new();
        q.where_with("age", Some(Operator::Gt), 21, LeafType::Match, LogicalOp::And);

        assert_eq!(only_condition(&q).leaf, LeafType::Range);
    }

    #[test]
    fn ne_does_not_force_range() {
        let mut q = QueryState::new();
        q.where_op("status", Operator::Ne, "closed");

        assert_eq!(only_condition(&q).leaf, LeafType::Term);
    }

    #[test]
    fn range_pair_is_rewritten_to_bounds() {
        let mut q = QueryState::new();
        q.where_between("age", [18, 30]);

        let c = only_condition(&q);
        assert_eq!(c.operator, None);
        assert_eq!(c.value, json!({ "gte": 18, "lte": 30 }));
    }

    #[test]
    fn range_with_wrong_arity_is_rejected_and_not_appended() {
        let mut q = QueryState::new();
        q.where_between("age", [1, 2, 3]);

        assert!(q.predicates.is_empty());
        assert!(matches!(q.rejection(), Some(QueryError::Validation(_))));
    }

    #[test]
    fn first_rejection_wins() {
        let mut q = QueryState::new();
        q.where_raw("a", Some("="), 1, "fuzzy", LogicalOp::And)
            .where_between("b", [1]);

        assert_eq!(
            q.rejection(),
            Some(&QueryError::UnsupportedLeafType("fuzzy".into()))
        );
    }

    #[test]
    fn where_raw_parses_symbols_and_leaf_names() {
        let mut q = QueryState::new();
        q.where_raw("title", Some("="), "rust", "match_phrase", LogicalOp::Or);

        let c = only_condition(&q);
        assert_eq!(c.leaf, LeafType::MatchPhrase);
        assert_eq!(c.logical, LogicalOp::Or);
        assert!(q.rejection().is_none());
    }

    #[test]
    fn where_in_opens_a_group_of_or_terms() {
        let mut q = QueryState::new();
        q.where_in("value", [1, 3, 5]);

        assert_eq!(q.predicates.len(), 1);
        let Predicate::Group(group) = &q.predicates[0] else {
            panic!("expected group");
        };
        assert_eq!(group.logical, LogicalOp::And);
        assert_eq!(group.query.predicates.len(), 3);
        assert!(
            group
                .query
                .predicates
                .iter()
                .all(|p| p.logical() == LogicalOp::Or)
        );
    }

    #[test]
    fn empty_nested_group_is_dropped() {
        let mut q = QueryState::new();
        q.where_nested(|_| {});

        assert!(q.predicates.is_empty());
        assert!(q.rejection().is_none());
    }

    #[test]
    fn where_in_without_values_is_rejected() {
        let mut q = QueryState::new();
        q.where_term("status", "draft");
        q.or_where_in("value", Vec::<i32>::new());

        assert_eq!(q.predicates.len(), 1);
        assert!(matches!(q.rejection(), Some(QueryError::Validation(_))));
    }

    #[test]
    fn nested_rejection_propagates_to_parent() {
        let mut q = QueryState::new();
        q.where_nested(|child| {
            child.where_between("age", [1]);
        });

        assert!(q.predicates.is_empty());
        assert!(q.rejection().is_some());
    }

    #[test]
    fn order_by_same_field_replaces_in_place() {
        let mut q = QueryState::new();
        q.order_by("created_at", SortDirection::Desc)
            .order_by("name", SortDirection::Asc)
            .order_by("created_at", SortDirection::Asc);

        assert_eq!(q.sort.len(), 2);
        assert_eq!(q.sort[0].field, "created_at");
        assert_eq!(q.sort[0].order, SortOrder::Direction(SortDirection::Asc));
    }

    #[test]
    fn select_deduplicates_columns() {
        let mut q = QueryState::new();
        q.select(["name", "status", "name"]);
        assert_eq!(q.columns, vec!["name", "status"]);
    }

    #[test]
    fn agg_raw_requires_an_object() {
        let mut q = QueryState::new();
        q.agg_raw(json!("terms"));
        assert!(q.aggregations.is_empty());
        assert!(q.rejection().is_some());
    }

    #[test]
    fn new_query_starts_empty() {
        let mut q = QueryState::new();
        q.index("posts").where_eq("a", 1).limit(10);

        let fresh = q.new_query();
        assert_eq!(fresh, QueryState::default());
    }
}
