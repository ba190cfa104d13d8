#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use sift_search::{Builder, ClientError, CompiledRequest, Operation, SearchConfig, Transport};

pub const INDEX: &str = "posts";

/// Answers requests from a script, in order, and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, ClientError>>>,
    calls: Mutex<Vec<(Operation, CompiledRequest)>>,
}

impl ScriptedTransport {
    pub fn push(&self, response: Value) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_err(&self, err: ClientError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<(Operation, CompiledRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call(&self, n: usize) -> (Operation, CompiledRequest) {
        self.calls()[n].clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        operation: Operation,
        request: &CompiledRequest,
    ) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, request.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted response".into())))
    }
}

pub fn builder(responses: Vec<Value>) -> (Builder<ScriptedTransport>, Arc<ScriptedTransport>) {
    builder_with(SearchConfig::default(), responses)
}

pub fn builder_with(
    config: SearchConfig,
    responses: Vec<Value>,
) -> (Builder<ScriptedTransport>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::default());
    for response in responses {
        transport.push(response);
    }
    (Builder::with_shared(Arc::clone(&transport), config), transport)
}

/// A search response with `total` hits overall and one hit per id on this page.
pub fn hits(total: u64, ids: &[&str]) -> Value {
    let hits: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "_id": id, "_score": 1.0, "_source": { "title": format!("post {id}") } }))
        .collect();
    json!({ "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits } })
}

pub fn scroll_page(scroll_id: &str, total: u64, ids: &[&str]) -> Value {
    let mut page = hits(total, ids);
    page["_scroll_id"] = json!(scroll_id);
    page
}

pub fn body(request: &CompiledRequest) -> Value {
    request.body.clone().unwrap_or(Value::Null)
}
