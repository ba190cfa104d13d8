use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request document ready for the transport. Built fresh by the grammar
/// for every terminal call and never mutated afterwards.
///
/// `index`, `doc_type` and `scroll` are transport parameters; `body` is the
/// document sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
}

impl CompiledRequest {
    /// The body as an object, or an empty one when the request has no body.
    pub fn body_object(&self) -> Map<String, Value> {
        match &self.body {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Flat document form: `{id?, body?, index?, type?, scroll?, scroll_id?}`.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                doc.insert(key.to_string(), v);
            }
        };
        put("id", self.id.clone().map(Value::String));
        put("body", self.body.clone());
        put("index", self.index.clone().map(Value::String));
        put("type", self.doc_type.clone().map(Value::String));
        put("scroll", self.scroll.clone().map(Value::String));
        put("scroll_id", self.scroll_id.clone().map(Value::String));
        Value::Object(doc)
    }
}
