mod common;

use common::{StubResponse, StubServer};
use flow_engine::{
    ExecutionMode, GraphBuilder, GraphExecutor, NodeStatus, NullEventSink, RunConfig,
};
use serde_json::json;

#[tokio::test]
async fn test_live_openai_chat_completion() {
    let server = StubServer::start(StubResponse::json(json!({
        "choices": [{"message": {"role": "assistant", "content": "Hello there"}}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })))
    .await;

    let mut config = RunConfig::default()
        .with_mode(ExecutionMode::Live)
        .with_api_key("openai", "sk-test");
    config.openai_base_url = format!("{}/v1", server.base_url);

    let graph = GraphBuilder::new("g", "chat")
        .trigger("t")
        .llm("m", "gpt-4o-mini", "Greet the {{triggerType}} user")
        .output("o")
        .connect("t", "m")
        .connect("m", "o")
        .build();

    let executor = GraphExecutor::with_builtins(config).unwrap();
    let result = executor.execute(&graph, &NullEventSink).await;

    assert!(result.is_success(), "{:?}", result.node_results);
    let output = result.node_result("m").unwrap().output.clone().unwrap();
    assert_eq!(output["response"], "Hello there");
    assert_eq!(output["usage"]["total_tokens"], 7);

    let request = &server.requests()[0];
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["content"], "Greet the manual user");
    assert_eq!(body["max_tokens"], 1000);
}

#[tokio::test]
async fn test_live_provider_error_is_node_error() {
    let server = StubServer::start(StubResponse::status(401, "Unauthorized")).await;
    let mut config = RunConfig::default()
        .with_mode(ExecutionMode::Live)
        .with_api_key("openai", "bad");
    config.openai_base_url = server.base_url.clone();

    let graph = GraphBuilder::new("g", "chat")
        .trigger("t")
        .llm("m", "gpt-4o-mini", "hi")
        .connect("t", "m")
        .build();

    let result = GraphExecutor::with_builtins(config)
        .unwrap()
        .execute(&graph, &NullEventSink)
        .await;

    let failed = result.node_result("m").unwrap();
    assert_eq!(failed.status, NodeStatus::Error);
    assert!(failed.error.as_ref().unwrap().message.contains("401"));
}
