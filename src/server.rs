//! JSON-RPC 2.0 server loop and tool dispatch.
//!
//! Requests arrive newline-delimited on stdin; responses leave on stdout.
//! Logging goes to stderr — stdout belongs to the protocol.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::catalog::catalog_json;
use crate::envelope::ToolResponse;
use crate::error::ClientError;
use crate::state::AppState;
use crate::tools::firestore::DEFAULT_LIST_LIMIT;
use crate::tools::storage::DEFAULT_PAGE_SIZE;

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

pub struct McpServer {
    state: Arc<AppState>,
}

/// Failure modes of a `tools/call`, kept distinct from the `isError`
/// envelopes the clients return: these become JSON-RPC faults.
enum DispatchError {
    UnknownTool,
    BadArguments(String),
    Client(ClientError),
}

fn ok_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() }
    })
}

fn required_str<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, DispatchError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        DispatchError::BadArguments(format!("missing required parameter '{key}'"))
    })
}

fn required_object<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, DispatchError> {
    args.get(key).and_then(Value::as_object).ok_or_else(|| {
        DispatchError::BadArguments(format!("parameter '{key}' must be an object"))
    })
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn optional_usize(
    args: &Map<String, Value>,
    key: &str,
    default: usize,
) -> Result<usize, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| DispatchError::BadArguments(format!("parameter '{key}' must be a number"))),
    }
}

impl McpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle one request. `None` means the message was a notification and
    /// gets no response.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = request.get("method").and_then(Value::as_str) else {
            return Some(rpc_error(id, INVALID_REQUEST, "missing method"));
        };
        let params = request.get("params").cloned().unwrap_or(json!({}));

        match method {
            "initialize" => Some(self.handle_initialize(id)),
            "ping" => Some(ok_result(id, json!({}))),
            "tools/list" => Some(ok_result(id, json!({ "tools": catalog_json() }))),
            "tools/call" => Some(self.handle_tools_call(id, &params).await),
            // Notifications get no response; some clients send the bare form.
            "initialized" => None,
            m if m.starts_with("notifications/") => None,
            other => Some(rpc_error(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    fn handle_initialize(&self, id: Value) -> Value {
        ok_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> Value {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return rpc_error(id, INVALID_PARAMS, "missing tool name");
        };
        let empty = Map::new();
        let args = params
            .get("arguments")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        tracing::debug!(tool = name, "Dispatching tool call");

        match self.dispatch(name, args).await {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(result) => ok_result(id, result),
                Err(err) => rpc_error(id, INTERNAL_ERROR, err.to_string()),
            },
            Err(DispatchError::UnknownTool) => {
                rpc_error(id, METHOD_NOT_FOUND, format!("Unknown tool: {name}"))
            }
            Err(DispatchError::BadArguments(message)) => rpc_error(id, INVALID_PARAMS, message),
            Err(DispatchError::Client(err)) => {
                tracing::warn!(tool = name, error = %err, "Tool call failed");
                rpc_error(id, INTERNAL_ERROR, err.to_string())
            }
        }
    }

    /// Route a call to its client method, passing the argument fields
    /// positionally in each operation's fixed parameter order. Clients that
    /// report failures as envelopes return `Ok` here; the auth client and
    /// strict-mode storage lookups surface as `Err(Client)`.
    async fn dispatch(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<ToolResponse, DispatchError> {
        let state = &self.state;
        match name {
            "firestore_add_document" => {
                let collection = required_str(args, "collection")?;
                let data = required_object(args, "data")?;
                Ok(state.firestore.add_document(collection, data).await)
            }
            "firestore_list_collections" => {
                let document_path = optional_str(args, "documentPath");
                let limit = optional_usize(args, "limit", DEFAULT_LIST_LIMIT)?;
                let page_token = optional_str(args, "pageToken");
                Ok(state
                    .firestore
                    .list_collections(document_path, limit, page_token)
                    .await)
            }
            "firestore_list_documents" => {
                let collection = required_str(args, "collection")?;
                let filters = match args.get("filters") {
                    None | Some(Value::Null) => &[],
                    Some(Value::Array(items)) => items.as_slice(),
                    Some(_) => {
                        return Err(DispatchError::BadArguments(
                            "parameter 'filters' must be an array".to_string(),
                        ))
                    }
                };
                let limit = optional_usize(args, "limit", DEFAULT_LIST_LIMIT)?;
                let page_token = optional_str(args, "pageToken");
                Ok(state
                    .firestore
                    .list_documents(collection, filters, limit, page_token)
                    .await)
            }
            "firestore_get_document" => {
                let collection = required_str(args, "collection")?;
                let id = required_str(args, "id")?;
                Ok(state.firestore.get_document(collection, id).await)
            }
            "firestore_update_document" => {
                let collection = required_str(args, "collection")?;
                let id = required_str(args, "id")?;
                let data = required_object(args, "data")?;
                Ok(state.firestore.update_document(collection, id, data).await)
            }
            "firestore_delete_document" => {
                let collection = required_str(args, "collection")?;
                let id = required_str(args, "id")?;
                Ok(state.firestore.delete_document(collection, id).await)
            }
            "auth_get_user" => {
                let identifier = required_str(args, "identifier")?;
                state
                    .auth
                    .get_user(identifier)
                    .await
                    .map_err(DispatchError::Client)
            }
            "storage_list_files" => {
                let directory_path = optional_str(args, "directoryPath");
                let page_size = optional_usize(args, "pageSize", DEFAULT_PAGE_SIZE)?;
                let page_token = optional_str(args, "pageToken");
                Ok(state
                    .storage
                    .list_directory_files(directory_path, page_size, page_token)
                    .await)
            }
            "storage_get_file_info" => {
                let file_path = required_str(args, "filePath")?;
                state
                    .storage
                    .get_file_info(file_path)
                    .await
                    .map_err(DispatchError::Client)
            }
            _ => Err(DispatchError::UnknownTool),
        }
    }

    /// Serve requests from stdin until it closes.
    pub async fn serve_stdio(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<Value>(line) {
                Ok(request) => self.handle_request(request).await,
                Err(err) => Some(rpc_error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {err}"),
                )),
            };
            if let Some(response) = response {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }
}
