use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_HOST: &str = "http://localhost:9200";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection and default-target settings handed to a [`Builder`](crate::Builder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    /// Index used when a chain names none.
    #[serde(default)]
    pub index: Option<String>,
    /// Document type used when a chain names none.
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    /// Start with query logging switched on.
    #[serde(default)]
    pub query_log: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_hosts() -> Vec<String> {
    vec![DEFAULT_HOST.to_string()]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            index: None,
            doc_type: None,
            query_log: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SearchConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Reads `SIFT_HOSTS` (comma separated), `SIFT_INDEX`, `SIFT_TYPE`,
    /// `SIFT_QUERY_LOG` and `SIFT_TIMEOUT_SECS`. Unset or unparsable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(hosts) = env::var("SIFT_HOSTS") {
            let hosts: Vec<String> = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
            if !hosts.is_empty() {
                config.hosts = hosts;
            }
        }
        config.index = env::var("SIFT_INDEX").ok().filter(|s| !s.is_empty());
        config.doc_type = env::var("SIFT_TYPE").ok().filter(|s| !s.is_empty());
        if let Ok(flag) = env::var("SIFT_QUERY_LOG") {
            config.query_log = matches!(flag.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(secs) = env::var("SIFT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_secs = secs;
        }

        config
    }

    /// The host requests go to. Only the first configured host is used.
    pub fn primary_host(&self) -> &str {
        self.hosts.first().map_or(DEFAULT_HOST, String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_takes_defaults() {
        let config = SearchConfig::from_json("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.primary_host(), "http://localhost:9200");
    }

    #[test]
    fn json_overrides() {
        let config = SearchConfig::from_json(
            r#"{"hosts": ["es1:9200", "es2:9200"], "index": "posts", "type": "doc", "query_log": true}"#,
        )
        .unwrap();
        assert_eq!(config.primary_host(), "es1:9200");
        assert_eq!(config.index.as_deref(), Some("posts"));
        assert_eq!(config.doc_type.as_deref(), Some("doc"));
        assert!(config.query_log);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn no_hosts_falls_back_to_localhost() {
        let config = SearchConfig {
            hosts: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.primary_host(), "http://localhost:9200");
    }
}
