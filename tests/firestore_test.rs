//! Integration tests for the Firestore capability client.

use std::sync::Arc;

use chrono::TimeZone;
use firebase_mcp::backend::memory::MemoryDocumentStore;
use firebase_mcp::backend::value::{DocumentFields, FieldValue};
use firebase_mcp::tools::FirestoreTools;
use firebase_mcp::ToolResponse;
use serde_json::{json, Value};

fn setup() -> (Arc<MemoryDocumentStore>, FirestoreTools) {
    let store = Arc::new(MemoryDocumentStore::new());
    let tools = FirestoreTools::new(store.clone(), "demo-project");
    (store, tools)
}

/// Parse the JSON payload of a success envelope.
fn payload(response: &ToolResponse) -> Value {
    assert!(
        !response.failed(),
        "unexpected error envelope: {}",
        response.message()
    );
    serde_json::from_str(response.message()).expect("payload is not JSON")
}

fn fields(pairs: &[(&str, FieldValue)]) -> DocumentFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ============================================================================
// Point operations
// ============================================================================

#[tokio::test]
async fn add_then_get_round_trips_fields() {
    let (_, tools) = setup();

    let data = json!({ "name": "Ada", "age": 36, "tags": ["math", "engines"] });
    let added = payload(&tools.add_document("users", data.as_object().unwrap()).await);
    let id = added["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(added["document"], data);

    let fetched = payload(&tools.get_document("users", &id).await);
    assert_eq!(fetched["id"], id.as_str());
    assert_eq!(fetched["document"], data);
    assert!(fetched["url"]
        .as_str()
        .unwrap()
        .contains("console.firebase.google.com/project/demo-project"));
}

#[tokio::test]
async fn backend_assigns_distinct_ids() {
    let (_, tools) = setup();
    let data = json!({ "n": 1 });

    let first = payload(&tools.add_document("users", data.as_object().unwrap()).await);
    let second = payload(&tools.add_document("users", data.as_object().unwrap()).await);
    assert_ne!(first["id"], second["id"]);
}

#[tokio::test]
async fn update_merges_without_replacing() {
    let (_, tools) = setup();

    let added = payload(
        &tools
            .add_document("users", json!({ "a": 1, "b": 2 }).as_object().unwrap())
            .await,
    );
    let id = added["id"].as_str().unwrap();

    let updated = tools
        .update_document("users", id, json!({ "b": 3 }).as_object().unwrap())
        .await;
    assert!(!updated.failed());

    let fetched = payload(&tools.get_document("users", id).await);
    assert_eq!(fetched["document"]["a"], 1);
    assert_eq!(fetched["document"]["b"], 3);
}

#[tokio::test]
async fn update_of_a_missing_document_is_an_error() {
    let (_, tools) = setup();

    let response = tools
        .update_document("users", "ghost", json!({ "a": 1 }).as_object().unwrap())
        .await;
    assert!(response.failed());
    assert!(response.message().starts_with("Error updating document:"));
}

#[tokio::test]
async fn delete_is_idempotent_and_get_after_delete_reports_not_found() {
    let (_, tools) = setup();

    let added = payload(
        &tools
            .add_document("users", json!({ "n": 1 }).as_object().unwrap())
            .await,
    );
    let id = added["id"].as_str().unwrap();

    let deleted = tools.delete_document("users", id).await;
    assert!(!deleted.failed());
    assert_eq!(deleted.message(), "Document deleted successfully");

    let fetched = tools.get_document("users", id).await;
    assert!(fetched.failed());
    assert_eq!(fetched.message(), "Document not found");

    // Deleting an already-deleted id still succeeds.
    let again = tools.delete_document("users", id).await;
    assert!(!again.failed());
}

// ============================================================================
// Listing and filters
// ============================================================================

#[tokio::test]
async fn zero_matches_is_the_no_matching_documents_error() {
    let (store, tools) = setup();
    store.seed_document("users", "u1", fields(&[("name", FieldValue::Str("Ada".into()))]));

    let filters = vec![json!({ "field": "name", "operator": "==", "value": "nobody" })];
    let response = tools.list_documents("users", &filters, 20, None).await;
    assert!(response.failed());
    assert_eq!(response.message(), "No matching documents found");

    // An entirely empty collection reports the same way.
    let response = tools.list_documents("empty", &[], 20, None).await;
    assert!(response.failed());
    assert_eq!(response.message(), "No matching documents found");
}

#[tokio::test]
async fn limit_reports_total_count_and_has_more() {
    let (store, tools) = setup();
    for i in 1..=5 {
        store.seed_document(
            "items",
            &format!("d{i}"),
            fields(&[("n", FieldValue::Int(i))]),
        );
    }

    let first = payload(&tools.list_documents("items", &[], 2, None).await);
    assert_eq!(first["totalCount"], 5);
    assert_eq!(first["documents"].as_array().unwrap().len(), 2);
    assert_eq!(first["hasMore"], true);
    assert_eq!(first["nextPageToken"], "d2");

    let second = payload(&tools.list_documents("items", &[], 2, Some("d2")).await);
    let ids: Vec<&str> = second["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["d3", "d4"]);
    assert_eq!(second["hasMore"], true);

    let last = payload(&tools.list_documents("items", &[], 2, Some("d4")).await);
    assert_eq!(last["documents"].as_array().unwrap().len(), 1);
    assert_eq!(last["hasMore"], false);
    assert_eq!(last["nextPageToken"], Value::Null);
    assert_eq!(last["totalCount"], 5);
}

#[tokio::test]
async fn filters_combine_conjunctively() {
    let (store, tools) = setup();
    store.seed_document(
        "items",
        "a",
        fields(&[("kind", FieldValue::Str("x".into())), ("n", FieldValue::Int(1))]),
    );
    store.seed_document(
        "items",
        "b",
        fields(&[("kind", FieldValue::Str("x".into())), ("n", FieldValue::Int(9))]),
    );
    store.seed_document(
        "items",
        "c",
        fields(&[("kind", FieldValue::Str("y".into())), ("n", FieldValue::Int(9))]),
    );

    let filters = vec![
        json!({ "field": "kind", "operator": "==", "value": "x" }),
        json!({ "field": "n", "operator": ">", "value": 5 }),
    ];
    let result = payload(&tools.list_documents("items", &filters, 20, None).await);
    assert_eq!(result["totalCount"], 1);
    assert_eq!(result["documents"][0]["id"], "b");
}

#[tokio::test]
async fn date_like_filter_values_match_timestamp_fields() {
    let (store, tools) = setup();
    let early = chrono::Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
    let late = chrono::Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
    store.seed_document("events", "old", fields(&[("at", FieldValue::Timestamp(early))]));
    store.seed_document("events", "new", fields(&[("at", FieldValue::Timestamp(late))]));

    let filters = vec![json!({ "field": "at", "operator": ">=", "value": "2024-01-15" })];
    let result = payload(&tools.list_documents("events", &filters, 20, None).await);
    assert_eq!(result["totalCount"], 1);
    assert_eq!(result["documents"][0]["id"], "new");
    // Timestamp fields come back as ISO-8601 strings.
    assert_eq!(
        result["documents"][0]["document"]["at"],
        "2024-02-01T12:00:00.000Z"
    );
}

#[tokio::test]
async fn unsupported_operator_is_a_listing_error() {
    let (store, tools) = setup();
    store.seed_document("items", "a", fields(&[("n", FieldValue::Int(1))]));

    let filters = vec![json!({ "field": "n", "operator": "~=", "value": 1 })];
    let response = tools.list_documents("items", &filters, 20, None).await;
    assert!(response.failed());
    assert!(response.message().starts_with("Error listing documents:"));
    assert!(response.message().contains("unsupported filter operator"));
}

// ============================================================================
// Collection listing
// ============================================================================

#[tokio::test]
async fn collections_paginate_lexicographically_by_name() {
    let (store, tools) = setup();
    for name in ["citrus", "apples", "berries"] {
        store.seed_collection(name);
    }

    let first = payload(&tools.list_collections(None, 2, None).await);
    let names: Vec<&str> = first["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["apples", "berries"]);
    assert_eq!(first["hasMore"], true);
    assert_eq!(first["nextPageToken"], "berries");

    let second = payload(&tools.list_collections(None, 2, Some("berries")).await);
    let names: Vec<&str> = second["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["citrus"]);
    assert_eq!(second["hasMore"], false);
}

#[tokio::test]
async fn unknown_collection_cursor_restarts_from_the_top() {
    let (store, tools) = setup();
    store.seed_collection("alpha");
    store.seed_collection("beta");

    let result = payload(&tools.list_collections(None, 10, Some("never-existed")).await);
    let names: Vec<&str> = result["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["alpha", "beta"]);
}

#[tokio::test]
async fn subcollections_list_under_a_document_path() {
    let (store, tools) = setup();
    store.seed_collection("users");
    store.seed_document(
        "users/alice/posts",
        "p1",
        fields(&[("title", FieldValue::Str("hi".into()))]),
    );

    let result = payload(&tools.list_collections(Some("users/alice"), 20, None).await);
    let names: Vec<&str> = result["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["posts"]);
    assert!(result["collections"][0]["url"]
        .as_str()
        .unwrap()
        .ends_with("users/alice/posts"));
}
