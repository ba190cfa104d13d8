use std::time::Duration;

use serde_json::{Value, json};
use sift_query::CompiledRequest;
use tracing::debug;

use crate::transport::{Operation, Transport};

#[derive(Debug)]
pub enum ClientError {
    /// Connection, timeout or protocol failure.
    Transport(String),
    /// The backend answered with a non-success status.
    Server { status: u16, body: String },
    Serialization(String),
    /// The compiled request lacks what the endpoint needs (e.g. an index).
    Request(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            ClientError::Server { status, body } => write!(f, "server error ({status}): {body}"),
            ClientError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ClientError::Request(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Post,
    Put,
    Delete,
}

/// Blocking JSON-over-HTTP transport for one backend node.
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpClient {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        let mut base_url = base_url.into();
        if !base_url.contains("://") {
            base_url.insert_str(0, "http://");
        }
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { agent, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = ?method, url = %url, "sending request");

        let empty = json!({});
        let payload = body.unwrap_or(&empty);
        let mut response = match method {
            Method::Delete => self.agent.delete(&url).call()?,
            Method::Post => self.agent.post(&url).send_json(payload)?,
            Method::Put => self.agent.put(&url).send_json(payload)?,
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(ClientError::Server { status, body });
        }

        Ok(response.body_mut().read_json::<Value>()?)
    }
}

impl Transport for HttpClient {
    fn execute(
        &self,
        operation: Operation,
        request: &CompiledRequest,
    ) -> Result<Value, ClientError> {
        let (method, path, body) = endpoint(operation, request)?;
        self.send(method, &path, body.as_ref())
    }
}

/// Maps an operation onto the backend's REST surface. A document type, when
/// set, uses the typed (pre-7.x) path layout.
fn endpoint(
    operation: Operation,
    request: &CompiledRequest,
) -> Result<(Method, String, Option<Value>), ClientError> {
    let index = request.index.as_deref().map(encode);
    let doc_type = request.doc_type.as_deref().map(encode);

    match operation {
        Operation::Search | Operation::Count => {
            let mut path = String::new();
            if let Some(index) = &index {
                path.push('/');
                path.push_str(index);
                if let Some(doc_type) = &doc_type {
                    path.push('/');
                    path.push_str(doc_type);
                }
            }
            path.push_str(if operation == Operation::Search {
                "/_search"
            } else {
                "/_count"
            });
            if operation == Operation::Search {
                if let Some(scroll) = &request.scroll {
                    path.push_str("?scroll=");
                    path.push_str(&encode(scroll));
                }
            }
            let body = request.body.clone().unwrap_or_else(|| json!({}));
            Ok((Method::Post, path, Some(body)))
        }
        Operation::Scroll => {
            let scroll_id = request
                .scroll_id
                .as_deref()
                .ok_or_else(|| ClientError::Request("scroll requires a scroll_id".into()))?;
            let mut body = json!({ "scroll_id": scroll_id });
            if let Some(scroll) = &request.scroll {
                body["scroll"] = Value::String(scroll.clone());
            }
            Ok((Method::Post, "/_search/scroll".into(), Some(body)))
        }
        Operation::Create | Operation::Update | Operation::Delete => {
            let index = index.ok_or_else(|| {
                ClientError::Request(format!("{operation} requires an index"))
            })?;
            let id = request
                .id
                .as_deref()
                .map(encode)
                .ok_or_else(|| ClientError::Request(format!("{operation} requires an id")))?;

            let (method, path) = match (operation, &doc_type) {
                (Operation::Create, None) => (Method::Put, format!("/{index}/_create/{id}")),
                (Operation::Create, Some(t)) => (Method::Put, format!("/{index}/{t}/{id}/_create")),
                (Operation::Update, None) => (Method::Post, format!("/{index}/_update/{id}")),
                (Operation::Update, Some(t)) => (Method::Post, format!("/{index}/{t}/{id}/_update")),
                (_, None) => (Method::Delete, format!("/{index}/_doc/{id}")),
                (_, Some(t)) => (Method::Delete, format!("/{index}/{t}/{id}")),
            };
            Ok((method, path, request.body.clone()))
        }
    }
}

/// Percent-encodes a path segment. Commas stay literal so multi-index
/// targets (`a,b`) keep working.
fn encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(index: Option<&str>, doc_type: Option<&str>, id: Option<&str>) -> CompiledRequest {
        CompiledRequest {
            index: index.map(String::from),
            doc_type: doc_type.map(String::from),
            id: id.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn search_path_with_and_without_type() {
        let (m, path, _) = endpoint(Operation::Search, &request(Some("posts"), None, None)).unwrap();
        assert_eq!(m, Method::Post);
        assert_eq!(path, "/posts/_search");

        let (_, path, _) =
            endpoint(Operation::Count, &request(Some("posts"), Some("doc"), None)).unwrap();
        assert_eq!(path, "/posts/doc/_count");

        let (_, path, _) = endpoint(Operation::Search, &request(None, None, None)).unwrap();
        assert_eq!(path, "/_search");
    }

    #[test]
    fn scroll_parameter_only_on_search() {
        let mut req = request(Some("posts"), None, None);
        req.scroll = Some("10m".into());

        let (_, path, _) = endpoint(Operation::Search, &req).unwrap();
        assert_eq!(path, "/posts/_search?scroll=10m");

        let (_, path, _) = endpoint(Operation::Count, &req).unwrap();
        assert_eq!(path, "/posts/_count");
    }

    #[test]
    fn mutation_paths() {
        let untyped = request(Some("posts"), None, Some("a b"));
        let typed = request(Some("posts"), Some("doc"), Some("7"));

        let cases = [
            (Operation::Create, &untyped, Method::Put, "/posts/_create/a%20b"),
            (Operation::Update, &untyped, Method::Post, "/posts/_update/a%20b"),
            (Operation::Delete, &untyped, Method::Delete, "/posts/_doc/a%20b"),
            (Operation::Create, &typed, Method::Put, "/posts/doc/7/_create"),
            (Operation::Update, &typed, Method::Post, "/posts/doc/7/_update"),
            (Operation::Delete, &typed, Method::Delete, "/posts/doc/7"),
        ];
        for (op, req, method, path) in cases {
            let (m, p, _) = endpoint(op, req).unwrap();
            assert_eq!((m, p.as_str()), (method, path), "{op}");
        }
    }

    #[test]
    fn mutation_without_index_or_id_is_rejected() {
        assert!(matches!(
            endpoint(Operation::Create, &request(None, None, Some("1"))),
            Err(ClientError::Request(_))
        ));
        assert!(matches!(
            endpoint(Operation::Delete, &request(Some("posts"), None, None)),
            Err(ClientError::Request(_))
        ));
    }

    #[test]
    fn scroll_body_carries_cursor_and_lifetime() {
        let req = sift_query::compile_scroll("abc", "1m");
        let (m, path, body) = endpoint(Operation::Scroll, &req).unwrap();
        assert_eq!(m, Method::Post);
        assert_eq!(path, "/_search/scroll");
        assert_eq!(body, Some(json!({ "scroll_id": "abc", "scroll": "1m" })));
    }

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(HttpClient::new("localhost:9200/").base_url(), "http://localhost:9200");
        assert_eq!(
            HttpClient::new("https://search.internal").base_url(),
            "https://search.internal"
        );
    }
}
