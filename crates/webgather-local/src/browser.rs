//! Lifecycle owner for the shared headless-browser process.
//!
//! The browser is launched lazily on the first rendered fetch, re-probed for
//! liveness on every acquisition, relaunched transparently when the probe
//! fails, and torn down explicitly at shutdown. Fetch strategies reach it
//! only through the [`BrowserAccess`] capability so tests can substitute a
//! mock engine.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use webgather_core::{Error, Result};

use crate::config::Config;

/// One open page/tab. Closed exactly once per fetch attempt, on every exit
/// path.
#[async_trait::async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn html(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    async fn close(&self) -> Result<()>;
}

/// Narrow capability injected into the rendered fetch strategy.
#[async_trait::async_trait]
pub trait BrowserAccess: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>>;
}

fn classify_cdp(context: &str, e: chromiumoxide::error::CdpError) -> Error {
    // Classify by message: the CDP error surface is wide and the retry
    // policy only cares about timeouts vs. everything else.
    let msg = e.to_string();
    if msg.to_ascii_lowercase().contains("timeout") {
        Error::Timeout(format!("{context}: {msg}"))
    } else {
        Error::Other(format!("{context}: {msg}"))
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait::async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| classify_cdp("navigation failed", e))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| classify_cdp("navigation did not settle", e))?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| classify_cdp("could not read page content", e))
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| classify_cdp("could not read page title", e))?;
        Ok(title.map(|t| t.trim().to_string()).unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        // Pages are cheaply cloneable handles; `close` consumes one.
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| classify_cdp("page close failed", e))
    }
}

struct LiveBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// Owns the single shared Chromium process handle.
///
/// State machine: Uninitialized -> Starting -> Ready -> (disconnect or
/// shutdown) -> Uninitialized. The mutex serializes those transitions when
/// the tool boundary is called concurrently.
pub struct BrowserManager {
    user_agent: String,
    request_timeout: Duration,
    chrome_executable: Option<String>,
    state: Mutex<Option<LiveBrowser>>,
}

impl BrowserManager {
    pub fn new(cfg: &Config) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            request_timeout: cfg.browser_timeout,
            chrome_executable: cfg.chrome_executable.clone(),
            state: Mutex::new(None),
        }
    }

    /// Current ready handle, relaunching if the existing one fails its
    /// liveness probe. Callers never observe the restart.
    async fn acquire(&self) -> Result<Arc<Browser>> {
        let mut state = self.state.lock().await;
        if let Some(live) = state.as_ref() {
            match live.browser.version().await {
                Ok(_) => return Ok(Arc::clone(&live.browser)),
                Err(e) => {
                    tracing::warn!(error = %e, "browser failed liveness probe, relaunching");
                    if let Some(dead) = state.take() {
                        dead.handler.abort();
                    }
                }
            }
        }
        let live = self.launch().await?;
        let browser = Arc::clone(&live.browser);
        *state = Some(live);
        Ok(browser)
    }

    async fn launch(&self) -> Result<LiveBrowser> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(Error::MissingDependency)?;

        tracing::info!("launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::MissingDependency(format!("failed to launch Chromium: {e}")))?;

        // Drain CDP events for the life of the browser; the stream ends when
        // the process goes away.
        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        Ok(LiveBrowser {
            browser: Arc::new(browser),
            handler: task,
        })
    }

    /// Best-effort teardown. Idempotent, safe when nothing was started, and
    /// never propagates close errors: shutdown must not fail the process.
    pub async fn release_all(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut live) = state.take() {
            match Arc::get_mut(&mut live.browser) {
                Some(browser) => {
                    if let Err(e) = browser.close().await {
                        tracing::warn!(error = %e, "browser close failed");
                    }
                    if let Err(e) = browser.wait().await {
                        tracing::debug!(error = %e, "browser wait failed");
                    }
                }
                None => {
                    tracing::warn!(
                        "browser has outstanding page references, skipping graceful close"
                    );
                }
            }
            live.handler.abort();
            tracing::info!("browser released");
        }
    }
}

/// Build (but do not launch) a browser config, to check whether a usable
/// Chrome/Chromium executable can be found. Used by diagnostics.
pub fn detect_chrome(cfg: &Config) -> std::result::Result<(), String> {
    let mut builder = BrowserConfig::builder();
    if let Some(path) = &cfg.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map(|_| ())
}

#[async_trait::async_trait]
impl BrowserAccess for BrowserManager {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>> {
        let browser = self.acquire().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| classify_cdp("could not open page", e))?;
        page.set_user_agent(self.user_agent.as_str())
            .await
            .map_err(|e| classify_cdp("could not set user agent", e))?;
        Ok(Box::new(ChromiumPage { page }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_all_is_idempotent_when_nothing_started() {
        let mgr = BrowserManager::new(&Config::default());
        mgr.release_all().await;
        mgr.release_all().await;
    }

    #[tokio::test]
    async fn launch_failure_is_a_missing_dependency_error() {
        let cfg = Config {
            chrome_executable: Some("/nonexistent/definitely-not-chrome".to_string()),
            ..Config::default()
        };
        let mgr = BrowserManager::new(&cfg);
        let err = match mgr.open_page().await {
            Err(e) => e,
            Ok(_) => panic!("expected launch failure"),
        };
        assert!(matches!(err, Error::MissingDependency(_)), "got: {err:?}");
        mgr.release_all().await;
    }
}
