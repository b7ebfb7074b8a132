use axum::{routing::get, Router};
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService, ServiceExt},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn call(
    service: &RunningService<RoleClient, ()>,
    name: &'static str,
    args: serde_json::Value,
) -> serde_json::Value {
    let r = service
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(args.as_object().cloned().unwrap()),
        })
        .await
        .expect("call_tool");
    r.structured_content
        .clone()
        .expect("expected structured_content")
}

async fn spawn_server(extra_env: &[(&str, String)]) -> RunningService<RoleClient, ()> {
    let bin = assert_cmd::cargo::cargo_bin!("webgather");
    let extra: Vec<(String, String)> = extra_env
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    ()
        .serve(
            TokioChildProcess::new(tokio::process::Command::new(bin).configure(|cmd| {
                cmd.args(["mcp-stdio"]);
                cmd.env("WEBGATHER_RETRY_DELAY_MS", "1");
                for (k, v) in &extra {
                    cmd.env(k, v);
                }
            }))
            .expect("spawn mcp child"),
        )
        .await
        .expect("serve mcp child")
}

#[tokio::test]
async fn static_scrape_cleans_title_and_content_end_to_end() {
    let app = Router::new().route(
        "/",
        get(|| async {
            (
                [("content-type", "text/html")],
                "<html><head><title>T</title></head>\
                 <body><nav>skip</nav><p>Hello  world</p></body></html>",
            )
        }),
    );
    let addr = serve(app).await;
    let service = spawn_server(&[]).await;

    let url = format!("http://{addr}/");
    let v = call(
        &service,
        "scrape_pages",
        serde_json::json!({ "configs": [{"url": url, "method": "static"}] }),
    )
    .await;

    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["count"].as_u64(), Some(1));
    let page = &v["pages"][url.as_str()];
    assert_eq!(page["status"].as_str(), Some("success"));
    assert_eq!(page["method"].as_str(), Some("static"));
    assert_eq!(page["title"].as_str(), Some("T"));
    assert_eq!(page["content"].as_str(), Some("Hello world"));
    assert_eq!(page["length"].as_u64(), Some(11));
    assert_eq!(page["truncated"].as_bool(), Some(false));

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn content_cap_is_enforced_with_marker_and_original_length() {
    let app = Router::new().route(
        "/",
        get(|| async {
            let body = format!("<html><body><p>{}</p></body></html>", "y".repeat(300));
            ([("content-type", "text/html")], body)
        }),
    );
    let addr = serve(app).await;
    let service = spawn_server(&[("WEBGATHER_MAX_CONTENT_LENGTH", "50".to_string())]).await;

    let url = format!("http://{addr}/");
    let v = call(
        &service,
        "scrape_pages",
        serde_json::json!({ "configs": [{"url": url}] }),
    )
    .await;

    let page = &v["pages"][url.as_str()];
    assert_eq!(page["status"].as_str(), Some("success"));
    assert_eq!(page["truncated"].as_bool(), Some(true));
    assert_eq!(page["original_length"].as_u64(), Some(300));
    assert_eq!(page["length"].as_u64(), Some(53));
    assert!(page["content"].as_str().unwrap().ends_with("..."));

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn one_failing_url_never_aborts_the_batch() {
    let app = Router::new().route(
        "/ok",
        get(|| async {
            (
                [("content-type", "text/html")],
                "<html><head><title>Fine</title></head><body><p>alive</p></body></html>",
            )
        }),
    );
    let addr = serve(app).await;
    let service = spawn_server(&[]).await;

    let good = format!("http://{addr}/ok");
    let bad = format!("http://{addr}/missing");
    let v = call(
        &service,
        "scrape_pages",
        serde_json::json!({ "configs": [{"url": bad}, {"url": good}] }),
    )
    .await;

    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["count"].as_u64(), Some(2));
    assert_eq!(v["pages"][bad.as_str()]["status"].as_str(), Some("error"));
    assert_eq!(v["pages"][bad.as_str()]["error"].as_str(), Some("HTTP error: 404"));
    assert_eq!(v["pages"][good.as_str()]["status"].as_str(), Some("success"));
    assert_eq!(v["pages"][good.as_str()]["title"].as_str(), Some("Fine"));

    // Keys appear in input order.
    let keys: Vec<&String> = v["pages"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec![&bad, &good]);

    service.cancel().await.expect("cancel");
}
