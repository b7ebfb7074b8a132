use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use webgather_core::{Error, Result};

/// Fixed descriptive user agent sent on every outbound request (HTTP and
/// rendered). Kept identical across strategies so a backend sees one client.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_SEARXNG_ENDPOINT: &str = "http://localhost:8080";

/// Process-wide settings, loaded once at startup and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    /// Per-attempt timeout for plain HTTP requests (search + static fetch).
    pub request_timeout: Duration,
    /// Per-attempt budget for browser navigation in the rendered strategy.
    pub browser_timeout: Duration,
    /// Normalized page text beyond this many chars is truncated.
    pub max_content_length: usize,
    /// Ceiling for a single query's `num_results`.
    pub max_num_results: usize,
    /// Base URL of the SearXNG instance (with or without `/search`).
    pub searxng_endpoint: String,
    /// Attempt ceiling for transient failures (total attempts, not extras).
    pub max_retries: u32,
    /// Linear backoff base: the n-th retry waits `retry_delay * n`.
    pub retry_delay: Duration,
    /// Optional explicit Chrome/Chromium executable for the rendered strategy.
    pub chrome_executable: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(10),
            browser_timeout: Duration::from_millis(30_000),
            max_content_length: 10_000,
            max_num_results: 50,
            searxng_endpoint: DEFAULT_SEARXNG_ENDPOINT.to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
            chrome_executable: None,
        }
    }
}

fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Load the snapshot from `WEBGATHER_*` environment variables.
    ///
    /// A variable that is present but unparsable is a startup fault; this is
    /// the only error path that is allowed to end the process.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Self {
            user_agent: defaults.user_agent,
            request_timeout: Duration::from_secs(env_parsed(
                "WEBGATHER_REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )?),
            browser_timeout: Duration::from_millis(env_parsed(
                "WEBGATHER_BROWSER_TIMEOUT_MS",
                defaults.browser_timeout.as_millis() as u64,
            )?),
            max_content_length: env_parsed(
                "WEBGATHER_MAX_CONTENT_LENGTH",
                defaults.max_content_length,
            )?,
            max_num_results: env_parsed("WEBGATHER_MAX_RESULTS", defaults.max_num_results)?,
            searxng_endpoint: env_nonempty("WEBGATHER_SEARXNG_ENDPOINT")
                .unwrap_or(defaults.searxng_endpoint),
            max_retries: env_parsed("WEBGATHER_MAX_RETRIES", defaults.max_retries)?,
            retry_delay: Duration::from_millis(env_parsed(
                "WEBGATHER_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )?),
            chrome_executable: env_nonempty("WEBGATHER_CHROME"),
        })
    }
}
