use std::sync::Arc;
use std::time::Duration;

use html_scraper::Html;
use webgather_core::{Error, PageFetcher, Result, ScrapeMethod, ScrapeOutcome, ScrapeRequest};

use crate::config::Config;
use crate::normalize::{clean_html, document_title, truncate_content};
use crate::retry::{with_retries, RetryPolicy};

/// Static-fetch strategy: one plain GET per attempt, no script execution.
///
/// Fast path for server-rendered pages; JavaScript-heavy sites need the
/// rendered strategy instead.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
    cfg: Arc<Config>,
    policy: RetryPolicy,
}

pub(crate) fn classify_transport(url: &str, timeout: Duration, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("request timed out after {}s", timeout.as_secs()))
    } else if e.is_connect() {
        Error::Connection(format!("failed to connect to {url}"))
    } else if let Some(status) = e.status() {
        Error::HttpStatus(status.as_u16())
    } else {
        Error::Other(e.to_string())
    }
}

impl StaticFetcher {
    pub fn new(cfg: Arc<Config>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| Error::Other(e.to_string()))?;
        let policy = RetryPolicy::from_config(&cfg);
        Ok(Self {
            client,
            cfg,
            policy,
        })
    }

    async fn attempt(&self, url: &str) -> Result<ScrapeOutcome> {
        let timeout = self.cfg.request_timeout;
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid url {url:?}: {e}")))?;
        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_transport(url, timeout, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| classify_transport(url, timeout, e))?;
        // `text()` honors the response charset and falls back to UTF-8.
        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(url, timeout, e))?;

        let doc = Html::parse_document(&body);
        let title = document_title(&doc);
        let text = clean_html(&doc);
        let (content, original_length, truncated) =
            truncate_content(&text, self.cfg.max_content_length);
        Ok(ScrapeOutcome::success(
            ScrapeMethod::Static,
            title,
            content,
            original_length,
            truncated,
        ))
    }
}

#[async_trait::async_trait]
impl PageFetcher for StaticFetcher {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Static
    }

    async fn fetch(&self, req: &ScrapeRequest) -> ScrapeOutcome {
        match with_retries(&self.policy, Error::is_transient, || self.attempt(&req.url)).await {
            Ok(outcome) => outcome,
            Err(e) => ScrapeOutcome::failure(ScrapeMethod::Static, e),
        }
    }
}
