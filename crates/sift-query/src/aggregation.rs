use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the `aggs` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Synthesized as `"<field>_<agg_type>": {"<agg_type>": {"field": "<field>"}}`.
    Field { field: String, agg_type: String },
    /// A pre-built aggregation document, merged into `aggs` key by key.
    Raw(Map<String, Value>),
}

impl Aggregation {
    pub fn name(field: &str, agg_type: &str) -> String {
        format!("{field}_{agg_type}")
    }
}
