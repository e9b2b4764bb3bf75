//! MCP Server Dispatcher
//!
//! Transport-independent request handling: a transport hands in one raw
//! JSON-RPC message and gets back the serialized response, if any.

use crate::mcp::protocol::{
    CallToolResult, McpError, McpMethod, McpRequest, McpResponse, ServerCapabilities, ServerInfo,
    Tool, ToolCallParams, DEFAULT_PROTOCOL_VERSION,
};
use crate::metrics;
use crate::tools::VaultTools;
use serde_json::{json, Value};
use tracing::{debug, info, warn, Instrument};

/// Name announced in the initialize handshake
pub const SERVER_NAME: &str = "vaultgate";

/// Dispatches MCP requests to the vault tools
#[derive(Debug, Clone)]
pub struct McpServer {
    tools: VaultTools,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(tools: VaultTools) -> Self {
        Self {
            tools,
            info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn tools(&self) -> &VaultTools {
        &self.tools
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns the serialized response, or `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(raw) {
            Err(e) => {
                warn!("Rejected malformed JSON-RPC message: {}", e);
                Some(McpResponse::err(Value::Null, McpError::parse_error(e.to_string())))
            }
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<McpRequest>(value) {
                    Ok(request) => self.handle(request).await,
                    Err(e) => Some(McpResponse::err(id, McpError::invalid_request(e.to_string()))),
                }
            }
        };

        response.map(|response| match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                json!({
                    "jsonrpc": "2.0",
                    "id": response.id,
                    "error": McpError::internal_error("Failed to serialize response"),
                })
                .to_string()
            }
        })
    }

    /// Handle one parsed request
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        if request.is_notification() {
            debug!("Received notification: {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match McpMethod::from(request.method.as_str()) {
            McpMethod::Initialize => McpResponse::ok(id, self.initialize(request.params.as_ref())),
            McpMethod::Ping => McpResponse::ok(id, json!({})),
            McpMethod::ToolsList => McpResponse::ok(id, json!({ "tools": self.tool_definitions() })),
            McpMethod::ToolsCall => {
                let params = request.params.unwrap_or(Value::Null);
                match serde_json::from_value::<ToolCallParams>(params) {
                    Ok(params) => {
                        let result = self.call_tool(&params.name, &params.arguments).await;
                        match serde_json::to_value(result) {
                            Ok(value) => McpResponse::ok(id, value),
                            Err(e) => McpResponse::err(id, McpError::internal_error(e.to_string())),
                        }
                    }
                    Err(e) => McpResponse::err(
                        id,
                        McpError::invalid_params(format!("Invalid tools/call params: {}", e)),
                    ),
                }
            }
            McpMethod::Initialized | McpMethod::Custom(_) => {
                McpResponse::err(id, McpError::method_not_found(request.method))
            }
        };

        Some(response)
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
            .to_string();

        info!("Client initialized (protocol {})", protocol_version);

        let capabilities = ServerCapabilities {
            protocol_version,
            capabilities: json!({ "tools": { "listChanged": false } }),
            server_info: self.info.clone(),
        };
        serde_json::to_value(capabilities).unwrap_or(Value::Null)
    }

    /// Tool definitions advertised by `tools/list`
    pub fn tool_definitions(&self) -> Vec<Tool> {
        let vault_list = self.tools.list_vaults().join(", ");

        vec![
            Tool {
                name: "execute_bash".to_string(),
                description: format!(
                    "Execute a bash command in a vault directory. Available vaults: {}",
                    vault_list
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "vault": {
                            "type": "string",
                            "description": format!("Name of the vault to execute command in. Options: {}", vault_list)
                        },
                        "command": {
                            "type": "string",
                            "description": "Bash command to execute (will run in vault directory)"
                        }
                    },
                    "required": ["vault", "command"]
                }),
            },
            Tool {
                name: "get_vault_tree".to_string(),
                description: format!(
                    "Get directory tree structure of a vault. Available vaults: {}",
                    vault_list
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "vault": {
                            "type": "string",
                            "description": format!("Name of the vault. Options: {}", vault_list)
                        },
                        "include_files": {
                            "type": "boolean",
                            "description": "Include files in tree (true) or only directories (false)",
                            "default": true
                        }
                    },
                    "required": ["vault"]
                }),
            },
            Tool {
                name: "list_vaults".to_string(),
                description: "List the names of all configured vaults".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Run a tool and render its result for the caller
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> CallToolResult {
        metrics::record_tool_call(name);
        let span = tracing::info_span!("tool_call", call_id = %uuid::Uuid::new_v4(), tool = %name);

        async {
            info!("Tool called with arguments: {}", arguments);
            match name {
                "execute_bash" => self.execute_bash(arguments).await,
                "get_vault_tree" => self.get_vault_tree(arguments).await,
                "list_vaults" => {
                    let vaults = self.tools.list_vaults();
                    CallToolResult::text(vaults.join("\n"))
                        .with_structured(json!({ "vaults": vaults }))
                }
                _ => {
                    warn!("Unknown tool requested");
                    CallToolResult::error(format!("Unknown tool: {}", name))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute_bash(&self, arguments: &Value) -> CallToolResult {
        let (Some(vault), Some(command)) = (
            non_empty_str(arguments, "vault"),
            non_empty_str(arguments, "command"),
        ) else {
            return CallToolResult::error("Error: Both 'vault' and 'command' parameters are required");
        };

        let result = self.tools.execute_bash(vault, command).await;
        let structured = serde_json::to_value(&result).unwrap_or(Value::Null);

        if !result.success {
            let mut text = format!("Command failed: {}\n", result.error);
            if !result.output.is_empty() {
                text.push_str(&format!("\nOutput:\n{}", result.output));
            }
            return CallToolResult::error(text).with_structured(structured);
        }

        let text = if result.truncated {
            format!(
                "[Output was truncated to last {} characters]\n\n{}",
                self.tools.gateway_config().max_output_size,
                result.output
            )
        } else {
            result.output
        };
        CallToolResult::text(text).with_structured(structured)
    }

    async fn get_vault_tree(&self, arguments: &Value) -> CallToolResult {
        let Some(vault) = non_empty_str(arguments, "vault") else {
            return CallToolResult::error("Error: 'vault' parameter is required");
        };
        let include_files = arguments
            .get("include_files")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let result = self.tools.get_tree(vault, include_files).await;
        let structured = serde_json::to_value(&result).unwrap_or(Value::Null);

        if !result.error.is_empty() {
            return CallToolResult::error(format!("Error: {}", result.error)).with_structured(structured);
        }
        CallToolResult::text(result.tree).with_structured(structured)
    }
}

fn non_empty_str<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}
