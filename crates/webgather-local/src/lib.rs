//! Local executors for webgather: environment-sourced config, the HTML
//! content normalizer, the two page-fetch strategies (static reqwest GET and
//! rendered chromiumoxide), the shared browser resource manager, the SearXNG
//! search executor, and the sequential batch orchestrators.

pub mod batch;
pub mod browser;
pub mod config;
pub mod normalize;
pub mod rendered_fetch;
mod retry;
pub mod search;
pub mod static_fetch;

pub use batch::{run_scrapes, run_searches, MISSING_QUERY_KEY, MISSING_URL_KEY};
pub use browser::{BrowserAccess, BrowserManager, PageHandle};
pub use config::{Config, USER_AGENT};
pub use rendered_fetch::RenderedFetcher;
pub use search::SearchExecutor;
pub use static_fetch::StaticFetcher;
