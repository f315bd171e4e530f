//! MCP collaborator contract: server configuration, tool descriptors, and
//! the client trait the engine dispatches through. Transports live outside
//! this workspace; [`StaticMcpClient`] provides a canned in-process
//! implementation for tests and local tools.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server '{0}' not connected")]
    NotConnected(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("timeout")]
    Timeout,
}

/// One configured MCP server as the engine sees it. Connection details are
/// opaque here; the client implementation owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
}

/// A callable tool advertised by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the tool's parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// Result of one tool invocation. `error` is set when `success` is false;
/// `content` carries whatever text the server returned either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutcome {
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait McpClient: Send + Sync {
    /// Fetch the current tool list. Called fresh at decision points; the
    /// engine does not cache the result across rounds.
    async fn fetch_tools(&self, server: &McpServerConfig) -> Result<Vec<ToolDescriptor>, McpError>;

    async fn call_tool(
        &self,
        server: &McpServerConfig,
        request: ToolCallRequest,
    ) -> Result<ToolCallOutcome, McpError>;
}

// ---------------------------------------------------------------------------
// StaticMcpClient — canned tools keyed by server id
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&ToolCallRequest) -> Result<ToolCallOutcome, McpError> + Send + Sync>;

/// In-process client serving a fixed tool list per server, with per-tool
/// handlers. Used by engine tests and as a host for built-in local tools.
#[derive(Default)]
pub struct StaticMcpClient {
    tools: HashMap<String, Vec<ToolDescriptor>>,
    handlers: HashMap<(String, String), Handler>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticMcpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool<F>(mut self, server_id: &str, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(&ToolCallRequest) -> Result<ToolCallOutcome, McpError> + Send + Sync + 'static,
    {
        self.handlers.insert(
            (server_id.to_string(), descriptor.name.clone()),
            Box::new(handler),
        );
        self.tools
            .entry(server_id.to_string())
            .or_default()
            .push(descriptor);
        self
    }

    /// `(server_id, tool_name)` pairs in invocation order.
    pub async fn recorded_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl McpClient for StaticMcpClient {
    async fn fetch_tools(&self, server: &McpServerConfig) -> Result<Vec<ToolDescriptor>, McpError> {
        Ok(self.tools.get(&server.id).cloned().unwrap_or_default())
    }

    async fn call_tool(
        &self,
        server: &McpServerConfig,
        request: ToolCallRequest,
    ) -> Result<ToolCallOutcome, McpError> {
        self.calls
            .lock()
            .await
            .push((server.id.clone(), request.tool_name.clone()));
        match self
            .handlers
            .get(&(server.id.clone(), request.tool_name.clone()))
        {
            Some(handler) => handler(&request),
            None => Err(McpError::ToolNotFound(request.tool_name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> McpServerConfig {
        McpServerConfig {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            endpoint: String::new(),
        }
    }

    #[tokio::test]
    async fn static_client_serves_and_records_calls() {
        let client = StaticMcpClient::new().with_tool(
            "fs",
            ToolDescriptor {
                name: "read".to_string(),
                description: None,
                parameters: serde_json::json!({}),
            },
            |req| {
                let path = req
                    .arguments
                    .get("path")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                Ok(ToolCallOutcome::ok(format!("contents of {path}")))
            },
        );

        let tools = client.fetch_tools(&server("fs")).await.unwrap();
        assert_eq!(tools.len(), 1);

        let mut arguments = serde_json::Map::new();
        arguments.insert("path".to_string(), serde_json::json!("/tmp/x"));
        let outcome = client
            .call_tool(
                &server("fs"),
                ToolCallRequest {
                    tool_name: "read".to_string(),
                    arguments,
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.content, "contents of /tmp/x");
        assert_eq!(
            client.recorded_calls().await,
            vec![("fs".to_string(), "read".to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let client = StaticMcpClient::new();
        let err = client
            .call_tool(
                &server("fs"),
                ToolCallRequest {
                    tool_name: "nope".to_string(),
                    arguments: serde_json::Map::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(_)));
    }
}
