use std::sync::Arc;
use std::time::Duration;

use html_scraper::Html;
use webgather_core::{Error, PageFetcher, Result, ScrapeMethod, ScrapeOutcome, ScrapeRequest};

use crate::browser::{BrowserAccess, PageHandle};
use crate::config::Config;
use crate::normalize::{clean_html, truncate_content};
use crate::retry::{with_retries, RetryPolicy};

/// Rendered-fetch strategy: drives a headless browser page so scripted
/// content exists in the HTML that reaches the normalizer.
pub struct RenderedFetcher {
    browser: Arc<dyn BrowserAccess>,
    cfg: Arc<Config>,
    policy: RetryPolicy,
}

/// A dead rendering engine stays dead; everything else may be a flake worth
/// another attempt.
fn rendered_transient(e: &Error) -> bool {
    !matches!(e, Error::MissingDependency(_) | Error::Validation(_))
}

impl RenderedFetcher {
    pub fn new(browser: Arc<dyn BrowserAccess>, cfg: Arc<Config>) -> Self {
        let policy = RetryPolicy::from_config(&cfg);
        Self {
            browser,
            cfg,
            policy,
        }
    }

    async fn attempt(&self, url: &str, wait_time: u64) -> Result<ScrapeOutcome> {
        url::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid url {url:?}: {e}")))?;
        let page = self.browser.open_page().await?;
        let result = self.render(page.as_ref(), url, wait_time).await;
        // Hard resource-release guarantee: one close per opened page, on
        // success, timeout, and failure alike.
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        result
    }

    async fn render(
        &self,
        page: &dyn PageHandle,
        url: &str,
        wait_time: u64,
    ) -> Result<ScrapeOutcome> {
        let budget = self.cfg.browser_timeout;
        tokio::time::timeout(budget, page.navigate(url))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "browser timeout after {}ms",
                    budget.as_millis()
                ))
            })??;

        // Let late AJAX / lazy-loaded content settle before reading back.
        if wait_time > 0 {
            tokio::time::sleep(Duration::from_secs(wait_time)).await;
        }

        let html = page.html().await?;
        let title = page.title().await?;

        let doc = Html::parse_document(&html);
        let text = clean_html(&doc);
        let (content, original_length, truncated) =
            truncate_content(&text, self.cfg.max_content_length);
        Ok(ScrapeOutcome::success(
            ScrapeMethod::Rendered,
            title,
            content,
            original_length,
            truncated,
        ))
    }
}

#[async_trait::async_trait]
impl PageFetcher for RenderedFetcher {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Rendered
    }

    async fn fetch(&self, req: &ScrapeRequest) -> ScrapeOutcome {
        let wait_time = req.effective_wait_time();
        match with_retries(&self.policy, rendered_transient, || {
            self.attempt(&req.url, wait_time)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => ScrapeOutcome::failure(ScrapeMethod::Rendered, e),
        }
    }
}
