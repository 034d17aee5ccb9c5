//! Integration tests for the JSON-RPC dispatch layer.
//!
//! These run the full server loop surface (minus stdio) over the in-memory
//! backends.

use std::sync::Arc;

use firebase_mcp::backend::memory::{
    MemoryBlobStore, MemoryDocumentStore, MemoryIdentityDirectory,
};
use firebase_mcp::backend::{IdentityDirectory, UserRecord};
use firebase_mcp::{AppState, Config, McpServer};
use serde_json::{json, Value};

fn test_server() -> McpServer {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.set_default_bucket(Some("demo-project.appspot.com"));

    let state = AppState::new(
        &Config::default(),
        "demo-project",
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(MemoryIdentityDirectory::new()),
        blobs,
    );
    McpServer::new(Arc::new(state))
}

async fn request(server: &McpServer, method: &str, params: Value) -> Value {
    server
        .handle_request(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .await
        .expect("expected a response")
}

async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    request(
        server,
        "tools/call",
        json!({ "name": name, "arguments": arguments }),
    )
    .await
}

#[tokio::test]
async fn initialize_reports_tool_capability() {
    let server = test_server();
    let response = request(&server, "initialize", json!({})).await;

    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert_eq!(response["result"]["serverInfo"]["name"], "firebase-mcp");
}

#[tokio::test]
async fn tools_list_returns_the_full_catalog() {
    let server = test_server();
    let response = request(&server, "tools/list", json!({})).await;

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 9);

    let names: Vec<&str> = tools
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    for expected in [
        "firestore_add_document",
        "firestore_list_collections",
        "firestore_list_documents",
        "firestore_get_document",
        "firestore_update_document",
        "firestore_delete_document",
        "auth_get_user",
        "storage_list_files",
        "storage_get_file_info",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
    for tool in tools {
        assert!(tool["inputSchema"].is_object());
        assert!(!tool["description"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn unknown_tool_is_a_method_not_found_fault_regardless_of_arguments() {
    let server = test_server();

    for arguments in [json!({}), json!({ "collection": "users", "id": "x" })] {
        let response = call_tool(&server, "firestore_drop_database", arguments).await;
        assert_eq!(response["error"]["code"], -32601);
        assert!(response.get("result").is_none());
    }
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let server = test_server();
    let response = request(&server, "resources/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn missing_required_parameter_is_invalid_params() {
    let server = test_server();
    let response = call_tool(&server, "firestore_get_document", json!({})).await;

    assert_eq!(response["error"]["code"], -32602);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("collection"));
}

#[tokio::test]
async fn notifications_get_no_response() {
    let server = test_server();
    let response = server
        .handle_request(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
        }))
        .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn ping_returns_an_empty_result() {
    let server = test_server();
    let response = request(&server, "ping", json!({})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn tool_error_envelopes_are_successful_rpc_results() {
    let server = test_server();
    let response = call_tool(
        &server,
        "firestore_get_document",
        json!({ "collection": "users", "id": "ghost" }),
    )
    .await;

    // Expected operation failures are data, not protocol faults.
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(response["result"]["content"][0]["text"], "Document not found");
}

#[tokio::test]
async fn auth_failures_propagate_as_protocol_faults() {
    let server = test_server();
    let response = call_tool(&server, "auth_get_user", json!({ "identifier": "ghost" })).await;

    assert_eq!(response["error"]["code"], -32603);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no user record"));
}

#[tokio::test]
async fn tool_calls_round_trip_through_the_dispatcher() {
    let directory = Arc::new(MemoryIdentityDirectory::new());
    directory
        .create_user(UserRecord {
            uid: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
            ..UserRecord::default()
        })
        .await
        .unwrap();

    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.set_default_bucket(Some("demo-project.appspot.com"));
    let state = AppState::new(
        &Config::default(),
        "demo-project",
        Arc::new(MemoryDocumentStore::new()),
        directory,
        blobs,
    );
    let server = McpServer::new(Arc::new(state));

    let added = call_tool(
        &server,
        "firestore_add_document",
        json!({ "collection": "users", "data": { "name": "Ada" } }),
    )
    .await;
    let payload: Value =
        serde_json::from_str(added["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["document"]["name"], "Ada");
    assert!(!payload["id"].as_str().unwrap().is_empty());

    let user = call_tool(
        &server,
        "auth_get_user",
        json!({ "identifier": "ada@example.com" }),
    )
    .await;
    let payload: Value =
        serde_json::from_str(user["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["uid"], "u1");
}

#[tokio::test]
async fn malformed_requests_are_invalid_request_faults() {
    let server = test_server();
    let response = server
        .handle_request(json!({ "jsonrpc": "2.0", "id": 7 }))
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 7);
}
