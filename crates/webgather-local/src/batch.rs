//! Sequential batch orchestrators.
//!
//! One outcome per item, keyed by the item's natural key (query string or
//! URL), in input order. A failing item never aborts the batch; a duplicate
//! key collapses to the last-written outcome (see `BatchMap`).

use webgather_core::{
    BatchMap, Error, PageFetcher, QuerySearcher, ScrapeMethod, ScrapeOutcome, ScrapeRequest,
    SearchOutcome, SearchQueryConfig,
};

/// Key used for items whose query field is missing or blank.
pub const MISSING_QUERY_KEY: &str = "<missing_query>";

/// Key used for items whose url field is missing or blank.
pub const MISSING_URL_KEY: &str = "<missing_url>";

/// Run every query through the search executor, in input order.
pub async fn run_searches(
    searcher: &dyn QuerySearcher,
    configs: &[SearchQueryConfig],
) -> BatchMap<SearchOutcome> {
    let mut out = BatchMap::new();
    for cfg in configs {
        let query = cfg.query.trim();
        if query.is_empty() {
            out.insert(
                MISSING_QUERY_KEY,
                SearchOutcome::failure(Error::Validation("query field is required".to_string())),
            );
            continue;
        }
        tracing::debug!(query, num_results = cfg.num_results, "running search");
        let outcome = searcher.search(query, cfg.num_results).await;
        out.insert(query, outcome);
    }
    out
}

/// Dispatch every URL to the strategy named by its method, in input order.
pub async fn run_scrapes(
    static_fetcher: &dyn PageFetcher,
    rendered_fetcher: &dyn PageFetcher,
    configs: &[ScrapeRequest],
) -> BatchMap<ScrapeOutcome> {
    let mut out = BatchMap::new();
    for req in configs {
        let url = req.url.trim();
        if url.is_empty() {
            out.insert(
                MISSING_URL_KEY,
                ScrapeOutcome::failure(
                    req.method,
                    Error::Validation("url field is required".to_string()),
                ),
            );
            continue;
        }
        tracing::debug!(url, method = req.method.as_str(), "running scrape");
        let fetcher = match req.method {
            ScrapeMethod::Static => static_fetcher,
            ScrapeMethod::Rendered => rendered_fetcher,
        };
        let outcome = fetcher.fetch(req).await;
        out.insert(url, outcome);
    }
    out
}
