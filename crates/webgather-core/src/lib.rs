use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("rendering engine unavailable: {0}")]
    MissingDependency(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl Error {
    /// Transient failures are worth another attempt; everything else is
    /// surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

fn default_num_results() -> usize {
    5
}

/// One search item as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQueryConfig {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

impl SearchQueryConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: default_num_results(),
        }
    }

    pub fn with_num_results(mut self, n: usize) -> Self {
        self.num_results = n;
        self
    }

    /// Requested result count, clamped into `[1, ceiling]`.
    pub fn clamped_num_results(&self, ceiling: usize) -> usize {
        self.num_results.clamp(1, ceiling.max(1))
    }
}

/// One hit from the search backend, in backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Uniform per-query record: either the projected hits or a classified error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub status: Status,
    pub count: usize,
    pub results: Vec<SearchResultItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn success(results: Vec<SearchResultItem>) -> Self {
        Self {
            status: Status::Success,
            count: results.len(),
            results,
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            status: Status::Error,
            count: 0,
            results: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMethod {
    #[default]
    Static,
    Rendered,
}

impl ScrapeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeMethod::Static => "static",
            ScrapeMethod::Rendered => "rendered",
        }
    }
}

fn default_wait_time() -> u64 {
    3
}

pub const MAX_WAIT_TIME_S: u64 = 30;

/// One scrape item as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: ScrapeMethod,
    /// Seconds to let late dynamic content settle after render.
    /// Meaningful for the rendered method only.
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: ScrapeMethod::default(),
            wait_time: default_wait_time(),
        }
    }

    pub fn with_method(mut self, method: ScrapeMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_wait_time(mut self, secs: u64) -> Self {
        self.wait_time = secs;
        self
    }

    /// Settle time actually applied: clamped to the allowed range, and zero
    /// for the static method.
    pub fn effective_wait_time(&self) -> u64 {
        match self.method {
            ScrapeMethod::Static => 0,
            ScrapeMethod::Rendered => self.wait_time.min(MAX_WAIT_TIME_S),
        }
    }
}

/// Uniform per-URL record: cleaned page text or a classified error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub status: Status,
    pub method: ScrapeMethod,
    pub title: String,
    pub content: String,
    pub length: usize,
    pub original_length: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeOutcome {
    pub fn success(
        method: ScrapeMethod,
        title: String,
        content: String,
        original_length: usize,
        truncated: bool,
    ) -> Self {
        Self {
            status: Status::Success,
            method,
            length: content.chars().count(),
            title,
            content,
            original_length,
            truncated,
            error: None,
        }
    }

    pub fn failure(method: ScrapeMethod, error: impl ToString) -> Self {
        Self {
            status: Status::Error,
            method,
            title: String::new(),
            content: String::new(),
            length: 0,
            original_length: 0,
            truncated: false,
            error: Some(error.to_string()),
        }
    }
}

/// A single page-retrieval strategy ("fetch(request) -> outcome").
///
/// Implementations never raise across this boundary: every failure is
/// folded into the returned outcome record.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    fn method(&self) -> ScrapeMethod;
    async fn fetch(&self, req: &ScrapeRequest) -> ScrapeOutcome;
}

/// A single-query search capability with the same no-raise contract.
#[async_trait::async_trait]
pub trait QuerySearcher: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> SearchOutcome;
}

/// Insertion-ordered string-keyed mapping used to aggregate batch outcomes.
///
/// Keys keep their first-insertion position; inserting an existing key
/// overwrites the value in place. This reproduces the aggregation the
/// callers rely on: input order is preserved, and a duplicate query/URL
/// collapses to the last-written outcome (a documented quirk of keying by
/// the item's natural key).
#[derive(Debug, Clone, Default)]
pub struct BatchMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> BatchMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<T> IntoIterator for BatchMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T: Serialize> Serialize for BatchMap<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_results_clamps_into_range() {
        let q = SearchQueryConfig::new("cats");
        assert_eq!(q.num_results, 5);
        assert_eq!(q.clone().with_num_results(0).clamped_num_results(50), 1);
        assert_eq!(q.clone().with_num_results(1000).clamped_num_results(50), 50);
        assert_eq!(q.with_num_results(7).clamped_num_results(50), 7);
    }

    #[test]
    fn wait_time_is_zero_for_static_and_capped_for_rendered() {
        let r = ScrapeRequest::new("http://x").with_wait_time(10);
        assert_eq!(r.effective_wait_time(), 0);
        let r = r.with_method(ScrapeMethod::Rendered);
        assert_eq!(r.effective_wait_time(), 10);
        let r = r.with_wait_time(120);
        assert_eq!(r.effective_wait_time(), MAX_WAIT_TIME_S);
    }

    #[test]
    fn scrape_request_defaults_from_partial_json() {
        let r: ScrapeRequest = serde_json::from_str(r#"{"url":"http://x"}"#).unwrap();
        assert_eq!(r.method, ScrapeMethod::Static);
        assert_eq!(r.wait_time, 3);
    }

    #[test]
    fn outcome_serialization_shapes() {
        let ok = ScrapeOutcome::success(ScrapeMethod::Static, "T".into(), "body".into(), 4, false);
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["method"], "static");
        assert_eq!(v["length"], 4);
        assert!(v.get("error").is_none());

        let bad = ScrapeOutcome::failure(ScrapeMethod::Rendered, Error::HttpStatus(503));
        let v = serde_json::to_value(&bad).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["method"], "rendered");
        assert_eq!(v["error"], "HTTP error: 503");
        assert_eq!(v["length"], 0);
    }

    #[test]
    fn search_outcome_counts_results() {
        let out = SearchOutcome::success(vec![
            SearchResultItem {
                title: "A".into(),
                url: "https://a".into(),
                content: String::new(),
            },
            SearchResultItem {
                title: "B".into(),
                url: "https://b".into(),
                content: String::new(),
            },
        ]);
        assert_eq!(out.count, 2);
        assert_eq!(out.status, Status::Success);
    }

    #[test]
    fn batch_map_preserves_insertion_order() {
        let mut m = BatchMap::new();
        m.insert("c", 1);
        m.insert("a", 2);
        m.insert("b", 3);
        let keys: Vec<&str> = m.keys().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn batch_map_duplicate_key_keeps_position_takes_last_value() {
        let mut m = BatchMap::new();
        m.insert("x", 1);
        m.insert("y", 2);
        m.insert("x", 3);
        assert_eq!(m.len(), 2);
        let entries: Vec<(&str, &i32)> = m.iter().collect();
        assert_eq!(entries, vec![("x", &3), ("y", &2)]);
    }

    #[test]
    fn batch_map_serializes_as_ordered_object() {
        let mut m = BatchMap::new();
        m.insert("zebra", 1);
        m.insert("apple", 2);
        let s = serde_json::to_string(&m).unwrap();
        assert_eq!(s, r#"{"zebra":1,"apple":2}"#);
    }

    #[test]
    fn transient_classification_covers_only_timeout_and_connection() {
        assert!(Error::Timeout("10s".into()).is_transient());
        assert!(Error::Connection("refused".into()).is_transient());
        assert!(!Error::HttpStatus(500).is_transient());
        assert!(!Error::InvalidResponse("bad json".into()).is_transient());
        assert!(!Error::MissingDependency("no chrome".into()).is_transient());
        assert!(!Error::Validation("empty query".into()).is_transient());
    }
}
