use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "webgather")]
#[command(about = "Batched SearXNG search + page scraping (MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    McpStdio,
    /// Diagnose configuration/launch issues (json; no secrets, no network).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

mod mcp {
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Arc;
    use webgather_core::{ScrapeMethod, ScrapeRequest, SearchQueryConfig};
    use webgather_local::{
        batch, BrowserAccess, BrowserManager, Config, RenderedFetcher, SearchExecutor,
        StaticFetcher,
    };

    pub(crate) const SCHEMA_VERSION: u64 = 1;

    #[path = "envelope.rs"]
    pub(crate) mod envelope;
    use envelope::*;

    fn internal(e: impl std::fmt::Display) -> McpError {
        McpError::internal_error(e.to_string(), None)
    }

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Always attach structured content for machine consumers, and include
        // a text fallback for older clients that only read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    pub(crate) struct SearchQueryArg {
        /// The search query string (required; blank entries produce a
        /// per-item error under the `<missing_query>` key).
        #[serde(default)]
        pub query: String,
        /// Number of results to return (1-50, default 5).
        #[serde(default)]
        pub num_results: Option<usize>,
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    pub(crate) struct SearchWebArgs {
        /// One entry per query; errors are recorded per entry.
        #[serde(default)]
        pub query_configs: Vec<SearchQueryArg>,
    }

    #[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
    #[serde(rename_all = "snake_case")]
    pub(crate) enum ScrapeMethodArg {
        #[default]
        Static,
        Rendered,
    }

    impl From<ScrapeMethodArg> for ScrapeMethod {
        fn from(m: ScrapeMethodArg) -> Self {
            match m {
                ScrapeMethodArg::Static => ScrapeMethod::Static,
                ScrapeMethodArg::Rendered => ScrapeMethod::Rendered,
            }
        }
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    pub(crate) struct ScrapeArg {
        /// URL to scrape (required; blank entries produce a per-item error
        /// under the `<missing_url>` key).
        #[serde(default)]
        pub url: String,
        /// "static": fast plain GET, for server-rendered pages.
        /// "rendered": full headless-browser rendering, for JS-heavy sites.
        #[serde(default)]
        pub method: ScrapeMethodArg,
        /// Seconds to wait for dynamic content after render (0-30, default
        /// 3; ignored for the static method).
        #[serde(default)]
        pub wait_time: Option<u64>,
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    pub(crate) struct ScrapePagesArgs {
        /// One entry per page, each with its own method and wait time.
        #[serde(default)]
        pub configs: Vec<ScrapeArg>,
    }

    #[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
    pub(crate) struct UsageStatsArgs {}

    #[derive(Debug, Clone, Default, serde::Serialize)]
    struct UsageStats {
        tool_calls: std::collections::BTreeMap<String, u64>,
    }

    #[derive(Clone)]
    pub(crate) struct WebgatherMcp {
        tool_router: RmcpToolRouter<Self>,
        searcher: Arc<SearchExecutor>,
        static_fetcher: Arc<StaticFetcher>,
        rendered_fetcher: Arc<RenderedFetcher>,
        browser: Arc<BrowserManager>,
        stats: Arc<std::sync::Mutex<UsageStats>>,
    }

    #[tool_router]
    impl WebgatherMcp {
        pub(crate) fn new() -> Result<Self, McpError> {
            let cfg = Config::from_env().map_err(internal)?;
            Self::with_config(cfg)
        }

        pub(crate) fn with_config(cfg: Config) -> Result<Self, McpError> {
            let cfg = Arc::new(cfg);
            let browser = Arc::new(BrowserManager::new(&cfg));
            let engine: Arc<dyn BrowserAccess> = browser.clone();
            let searcher = SearchExecutor::new(Arc::clone(&cfg)).map_err(internal)?;
            let static_fetcher = StaticFetcher::new(Arc::clone(&cfg)).map_err(internal)?;
            let rendered_fetcher = RenderedFetcher::new(engine, Arc::clone(&cfg));
            Ok(Self {
                tool_router: Self::tool_router(),
                searcher: Arc::new(searcher),
                static_fetcher: Arc::new(static_fetcher),
                rendered_fetcher: Arc::new(rendered_fetcher),
                browser,
                stats: Arc::new(std::sync::Mutex::new(UsageStats::default())),
            })
        }

        pub(crate) fn browser(&self) -> Arc<BrowserManager> {
            Arc::clone(&self.browser)
        }

        fn stats_inc_tool(&self, kind: &str) {
            let mut s = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            *s.tool_calls.entry(kind.to_string()).or_insert(0) += 1;
        }

        #[tool(
            description = "Execute multiple web search queries via a SearXNG backend. Per-query errors are recorded in the result mapping and never fail the whole batch."
        )]
        async fn search_web(
            &self,
            params: Parameters<Option<SearchWebArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            self.stats_inc_tool("search_web");
            let args = params.0.unwrap_or_default();
            let configs: Vec<SearchQueryConfig> = args
                .query_configs
                .iter()
                .map(|q| SearchQueryConfig {
                    query: q.query.clone(),
                    num_results: q.num_results.unwrap_or(5),
                })
                .collect();

            let queries = batch::run_searches(self.searcher.as_ref(), &configs).await;
            let mut payload = match serde_json::to_value(&queries) {
                Ok(v) => serde_json::json!({
                    "ok": true,
                    "count": queries.len(),
                    "queries": v,
                }),
                Err(e) => serde_json::json!({
                    "ok": false,
                    "error": error_obj(
                        ErrorCode::UnexpectedError,
                        format!("search failed: {e}"),
                        "Result serialization failed; retry with fewer queries."
                    ),
                }),
            };
            add_envelope_fields(&mut payload, "search_web", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(
            description = "Scrape multiple web pages, each with its own method: \"static\" (plain HTTP GET, fast) or \"rendered\" (shared headless browser, for JavaScript-heavy sites). Content is cleaned of scripts/navigation/boilerplate and bounded; per-URL errors never fail the whole batch."
        )]
        async fn scrape_pages(
            &self,
            params: Parameters<Option<ScrapePagesArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            self.stats_inc_tool("scrape_pages");
            let args = params.0.unwrap_or_default();
            let configs: Vec<ScrapeRequest> = args
                .configs
                .iter()
                .map(|c| ScrapeRequest {
                    url: c.url.clone(),
                    method: c.method.into(),
                    wait_time: c.wait_time.unwrap_or(3),
                })
                .collect();

            let pages = batch::run_scrapes(
                self.static_fetcher.as_ref(),
                self.rendered_fetcher.as_ref(),
                &configs,
            )
            .await;
            let mut payload = match serde_json::to_value(&pages) {
                Ok(v) => serde_json::json!({
                    "ok": true,
                    "count": pages.len(),
                    "pages": v,
                }),
                Err(e) => serde_json::json!({
                    "ok": false,
                    "error": error_obj(
                        ErrorCode::UnexpectedError,
                        format!("scraping failed: {e}"),
                        "Result serialization failed; retry with fewer pages."
                    ),
                }),
            };
            add_envelope_fields(&mut payload, "scrape_pages", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(description = "Report per-tool call counts since server start (no secrets)")]
        async fn usage_stats(
            &self,
            _params: Parameters<Option<UsageStatsArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let stats = {
                let s = self.stats.lock().unwrap_or_else(|e| e.into_inner());
                serde_json::to_value(&*s).unwrap_or_else(|_| serde_json::json!({}))
            };
            let mut payload = serde_json::json!({ "ok": true, "stats": stats });
            add_envelope_fields(&mut payload, "usage_stats", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for WebgatherMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Batched web search via SearXNG plus static/rendered page scraping. \
                     Outputs are JSON and schema-versioned; per-item failures never abort a batch."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio() -> Result<(), McpError> {
        let svc = WebgatherMcp::new()?;
        let browser = svc.browser();
        let running = svc.serve(stdio()).await.map_err(internal)?;
        // Keep the stdio server alive until the client closes.
        let served = running.waiting().await;
        // The shared browser has process lifetime; leaking it leaves a
        // headless Chromium running after we exit.
        browser.release_all().await;
        served.map_err(internal)?;
        Ok(())
    }

}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    // stdout carries the MCP transport; all logging goes to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_doctor(cmd: &DoctorCmd) -> Result<()> {
    let report = match webgather_local::Config::from_env() {
        Ok(cfg) => {
            let chrome = match webgather_local::browser::detect_chrome(&cfg) {
                Ok(()) => serde_json::json!({
                    "available": true,
                    "configured_path": cfg.chrome_executable,
                }),
                Err(e) => serde_json::json!({
                    "available": false,
                    "configured_path": cfg.chrome_executable,
                    "error": e,
                }),
            };
            serde_json::json!({
                "ok": true,
                "version": env!("CARGO_PKG_VERSION"),
                "config": {
                    "request_timeout_s": cfg.request_timeout.as_secs(),
                    "browser_timeout_ms": cfg.browser_timeout.as_millis() as u64,
                    "max_content_length": cfg.max_content_length,
                    "max_num_results": cfg.max_num_results,
                    "searxng_endpoint": cfg.searxng_endpoint,
                    "max_retries": cfg.max_retries,
                    "retry_delay_ms": cfg.retry_delay.as_millis() as u64,
                },
                "chrome": chrome,
            })
        }
        Err(e) => serde_json::json!({
            "ok": false,
            "error": mcp::envelope::error_obj(
                mcp::envelope::ErrorCode::NotConfigured,
                e.to_string(),
                "Fix the WEBGATHER_* environment variable named in the message."
            ),
        }),
    };

    if cmd.output == "text" {
        println!(
            "webgather {}: ok={}",
            env!("CARGO_PKG_VERSION"),
            report["ok"].as_bool().unwrap_or(false)
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn run_version(cmd: &VersionCmd) {
    if cmd.output == "text" {
        println!("webgather {}", env!("CARGO_PKG_VERSION"));
    } else {
        println!(
            "{}",
            serde_json::json!({
                "name": "webgather",
                "version": env!("CARGO_PKG_VERSION"),
            })
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::McpStdio => mcp::serve_stdio()
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
        Commands::Doctor(cmd) => run_doctor(&cmd)?,
        Commands::Version(cmd) => run_version(&cmd),
    }
    Ok(())
}
