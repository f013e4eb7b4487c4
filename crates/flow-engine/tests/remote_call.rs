mod common;

use common::{StubResponse, StubServer};
use flow_engine::{
    GraphBuilder, GraphExecutor, NodeKind, NodeStatus, NullEventSink, RunConfig, RunStatus,
};
use serde_json::json;

fn executor() -> GraphExecutor {
    GraphExecutor::with_builtins(RunConfig::default()).unwrap()
}

#[tokio::test]
async fn test_failed_request_prunes_sink() {
    let server = StubServer::start(StubResponse::status(500, "Internal Server Error")).await;
    let graph = GraphBuilder::new("g", "failing call")
        .trigger("t")
        .node("h", NodeKind::RemoteCall, json!({"method": "GET", "url": server.url("/boom")}))
        .output("o")
        .connect("t", "h")
        .connect("h", "o")
        .build();

    let result = executor().execute(&graph, &NullEventSink).await;

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.stats.error_nodes, 1);
    assert_eq!(result.stats.skipped_nodes, 1);
    assert!(result.node_result("o").is_none());

    let failed = result.node_result("h").unwrap();
    assert_eq!(failed.status, NodeStatus::Error);
    let error = failed.error.as_ref().unwrap();
    assert_eq!(error.code.as_deref(), Some("HTTP_500"));
    assert_eq!(error.message, "HTTP 500: Internal Server Error");
    assert!(failed.logs.iter().any(|l| l == "Response status: 500"));
}

#[tokio::test]
async fn test_json_response_feeds_later_nodes() {
    let server = StubServer::start(StubResponse::json(json!({"status": "ok", "id": 42}))).await;
    let graph = GraphBuilder::new("g", "fetch")
        .trigger("t")
        .node("first", NodeKind::RemoteCall, json!({"url": server.url("/items")}))
        .node(
            "second",
            NodeKind::RemoteCall,
            json!({"method": "GET", "url": server.url("/items/{{id}}?type={{triggerType}}")}),
        )
        .condition("check", "status === 'ok' && hasNodeResult('second')")
        .output("o")
        .connect("t", "first")
        .connect("first", "second")
        .connect("second", "check")
        .connect_branch("check", "true", "o")
        .build();

    let result = executor().execute(&graph, &NullEventSink).await;

    assert!(result.is_success(), "{:?}", result.node_results);
    assert_eq!(result.executed_ids(), vec!["t", "first", "second", "check", "o"]);

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert!(paths.contains(&"/items/42?type=manual".to_string()));

    let final_output = result.final_output.unwrap();
    assert_eq!(final_output["data"]["first"]["id"], 42);
}

#[tokio::test]
async fn test_post_sends_interpolated_body_and_headers() {
    let server = StubServer::start(StubResponse::text("accepted")).await;
    let graph = GraphBuilder::new("g", "post")
        .trigger("t")
        .node(
            "h",
            NodeKind::RemoteCall,
            json!({
                "method": "POST",
                "url": server.url("/hook"),
                "headers": {"X-Api-Key": "k1"},
                "body": "{\"kind\": \"{{triggerType}}\"}"
            }),
        )
        .connect("t", "h")
        .build();

    let result = executor().execute(&graph, &NullEventSink).await;
    assert!(result.is_success());
    assert_eq!(result.node_result("h").unwrap().output, Some(json!("accepted")));

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.body, "{\"kind\": \"manual\"}");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("x-api-key"), Some("k1"));
}

#[tokio::test]
async fn test_get_never_sends_body() {
    let server = StubServer::start(StubResponse::json(json!([1, 2, 3]))).await;
    let graph = GraphBuilder::new("g", "get")
        .trigger("t")
        .node(
            "h",
            NodeKind::RemoteCall,
            json!({"method": "GET", "url": server.url("/list"), "body": "ignored"}),
        )
        .condition("c", "result.length === 3")
        .connect("t", "h")
        .connect("h", "c")
        .build();

    let result = executor().execute(&graph, &NullEventSink).await;

    assert!(result.is_success());
    assert_eq!(server.requests()[0].body, "");
    // Array output is stored under `result`
    assert_eq!(result.node_result("c").unwrap().branch_path(), Some("true"));
}
