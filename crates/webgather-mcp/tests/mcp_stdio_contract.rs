use std::collections::BTreeSet;

use rmcp::{
    model::CallToolRequestParam,
    service::ServiceExt,
    transport::{ConfigureCommandExt, TokioChildProcess},
};

#[tokio::test]
async fn stdio_server_lists_both_tools_and_answers_empty_batches() {
    let bin = assert_cmd::cargo::cargo_bin!("webgather");
    let service = ()
        .serve(
            TokioChildProcess::new(tokio::process::Command::new(bin).configure(|cmd| {
                cmd.args(["mcp-stdio"]);
                // Point at a dead endpoint so an accidental network call
                // fails fast instead of hitting a real instance.
                cmd.env("WEBGATHER_SEARXNG_ENDPOINT", "http://127.0.0.1:1");
                cmd.env("WEBGATHER_REQUEST_TIMEOUT", "1");
                cmd.env("WEBGATHER_RETRY_DELAY_MS", "1");
            }))
            .expect("spawn mcp child"),
        )
        .await
        .expect("serve mcp child");

    let tools = service.list_tools(Default::default()).await.expect("tools");
    let names: BTreeSet<String> = tools
        .tools
        .iter()
        .map(|t| t.name.clone().into_owned())
        .collect();
    for must_have in ["search_web", "scrape_pages", "usage_stats"] {
        assert!(names.contains(must_have), "missing tool {must_have}");
    }

    // Empty batches are valid calls and return well-formed envelopes.
    let r = service
        .call_tool(CallToolRequestParam {
            name: "search_web".into(),
            arguments: Some(
                serde_json::json!({ "query_configs": [] })
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        })
        .await
        .expect("call search_web");
    let v = r.structured_content.clone().expect("structured_content");
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["count"].as_u64(), Some(0));
    assert_eq!(v["kind"].as_str(), Some("search_web"));
    assert_eq!(v["schema_version"].as_u64(), Some(1));

    service.cancel().await.expect("cancel");
}
