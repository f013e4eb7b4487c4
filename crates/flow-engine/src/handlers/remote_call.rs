//! Remote call handler: HTTP-style requests with templated URL and body

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_config, NodeHandler, NodeRecorder};
use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::evaluator::interpolate_variables;
use crate::result::NodeExecutionResult;
use crate::types::GraphNode;

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether the configured body is sent with this method
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        })
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Configuration for a remote call node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCallConfig {
    #[serde(default)]
    pub method: HttpMethod,
    /// May contain `{{variable}}` placeholders
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// May contain `{{variable}}` placeholders; only sent for write methods
    #[serde(default)]
    pub body: Option<String>,
}

impl RemoteCallConfig {
    /// Default JSON content type, overridden by any user-supplied Content-Type
    fn effective_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        if !self
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        headers
    }
}

/// Issues the configured request and returns the parsed response body
pub struct RemoteCallHandler {
    client: reqwest::Client,
}

impl RemoteCallHandler {
    /// Create a handler whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create a handler around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn run(
        &self,
        node: &GraphNode,
        context: &ExecutionContext,
        recorder: &mut NodeRecorder,
    ) -> Result<Value> {
        let config: RemoteCallConfig = parse_config(node)?;
        if config.url.trim().is_empty() {
            return Err(FlowError::invalid_config(&node.id, "url is required"));
        }

        let url = interpolate_variables(&config.url, context.variables());
        recorder.log(format!("Making {} request to: {}", config.method, url));

        let mut request = self.client.request(config.method.into(), &url);
        for (name, value) in config.effective_headers() {
            request = request.header(name, value);
        }
        if config.method.sends_body() {
            if let Some(body) = config.body.as_deref().filter(|b| !b.is_empty()) {
                request = request.body(interpolate_variables(body, context.variables()));
            }
        }

        let response = request.send().await?;
        let status = response.status();
        recorder.log(format!("Response status: {}", status.as_u16()));

        if !status.is_success() {
            return Err(FlowError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let text = response.text().await?;

        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(Value::String(text))
        }
    }
}

#[async_trait]
impl NodeHandler for RemoteCallHandler {
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(node);
        let outcome = self.run(node, context, &mut recorder).await;
        recorder.finish(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::result::NodeStatus;
    use crate::types::NodeKind;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_method_wire_names() {
        let config: RemoteCallConfig =
            serde_json::from_value(json!({"method": "POST", "url": "http://x"})).unwrap();
        assert_eq!(config.method, HttpMethod::Post);
        assert!(config.method.sends_body());
        assert!(!HttpMethod::Get.sends_body());
        assert!(!HttpMethod::Delete.sends_body());
    }

    #[test]
    fn test_default_content_type() {
        let config: RemoteCallConfig = serde_json::from_value(json!({"url": "http://x"})).unwrap();
        assert_eq!(
            config.effective_headers(),
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_user_content_type_overrides_default() {
        let config: RemoteCallConfig = serde_json::from_value(json!({
            "url": "http://x",
            "headers": {"content-type": "text/plain", "X-Trace": "1"}
        }))
        .unwrap();
        let headers = config.effective_headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|(k, _)| k != "Content-Type"));
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let handler = RemoteCallHandler::new(Duration::from_secs(1)).unwrap();
        let node = GraphNode::with_data("h", NodeKind::RemoteCall, json!({"method": "GET", "url": " "}));
        let ctx = ExecutionContext::new("run", Arc::new(RunConfig::default()));

        let result = handler.execute(&node, &ctx).await;
        assert_eq!(result.status, NodeStatus::Error);
        assert!(result.error.unwrap().message.contains("url is required"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_config_error() {
        let handler = RemoteCallHandler::new(Duration::from_secs(1)).unwrap();
        let node = GraphNode::with_data("h", NodeKind::RemoteCall, json!({"method": "TRACE", "url": "http://x"}));
        let ctx = ExecutionContext::new("run", Arc::new(RunConfig::default()));

        let result = handler.execute(&node, &ctx).await;
        assert_eq!(result.status, NodeStatus::Error);
        assert!(result.logs.iter().any(|l| l.starts_with("Error:")));
    }
}
