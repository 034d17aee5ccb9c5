use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::backend::value::{fields_from_json, fields_to_json, parse_date_like, FieldValue};
use crate::backend::{DocumentQuery, DocumentStore, FieldFilter, FilterOp};
use crate::envelope::ToolResponse;
use crate::error::{ClientError, Result};

pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Document operations. Every backend failure is converted into an error
/// envelope; this client never raises.
pub struct FirestoreTools {
    store: Arc<dyn DocumentStore>,
    project_id: String,
}

impl FirestoreTools {
    pub fn new(store: Arc<dyn DocumentStore>, project_id: impl Into<String>) -> Self {
        Self {
            store,
            project_id: project_id.into(),
        }
    }

    /// Console deep link for a collection path. Cosmetic only.
    fn collection_url(&self, path: &str) -> String {
        format!(
            "https://console.firebase.google.com/project/{}/firestore/data/{path}",
            self.project_id
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "https://console.firebase.google.com/project/{}/firestore/data/{collection}/{id}",
            self.project_id
        )
    }

    pub async fn list_collections(
        &self,
        document_path: Option<&str>,
        limit: usize,
        page_token: Option<&str>,
    ) -> ToolResponse {
        match self
            .try_list_collections(document_path, limit, page_token)
            .await
        {
            Ok(response) => response,
            Err(err) => ToolResponse::error(format!("Error listing collections: {err}")),
        }
    }

    async fn try_list_collections(
        &self,
        document_path: Option<&str>,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<ToolResponse> {
        let mut ids = self.store.list_collection_ids(document_path).await?;
        ids.sort();

        // Cursor is a previously returned collection name; resume one past
        // it, or from the top when it is not present.
        let start = page_token
            .and_then(|token| ids.iter().position(|name| name == token).map(|i| i + 1))
            .unwrap_or(0);
        let page: Vec<&String> = ids.iter().skip(start).take(limit).collect();
        let has_more = start + page.len() < ids.len();

        let collections: Vec<Value> = page
            .iter()
            .map(|name| {
                let path = match document_path {
                    Some(parent) => format!("{}/{name}", parent.trim_matches('/')),
                    None => (*name).clone(),
                };
                json!({ "name": name, "url": self.collection_url(&path) })
            })
            .collect();
        let next_page_token = if has_more { page.last().cloned() } else { None };

        Ok(ToolResponse::json(&json!({
            "collections": collections,
            "nextPageToken": next_page_token,
            "hasMore": has_more,
        })))
    }

    pub async fn list_documents(
        &self,
        collection: &str,
        filters: &[Value],
        limit: usize,
        page_token: Option<&str>,
    ) -> ToolResponse {
        match self
            .try_list_documents(collection, filters, limit, page_token)
            .await
        {
            Ok(response) => response,
            Err(err) => ToolResponse::error(format!("Error listing documents: {err}")),
        }
    }

    async fn try_list_documents(
        &self,
        collection: &str,
        filters: &[Value],
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<ToolResponse> {
        let filters = parse_filters(filters)?;

        // Unlimited read of the same filtered query first: totalCount is the
        // match count before the limit applies, at the price of the extra
        // read.
        let all = self
            .store
            .run_query(&DocumentQuery {
                collection: collection.to_string(),
                filters: filters.clone(),
                start_after_id: None,
                limit: None,
            })
            .await?;
        if all.is_empty() {
            // Empty-but-valid is reported as an error to the caller.
            return Ok(ToolResponse::error("No matching documents found"));
        }
        let total_count = all.len();

        let start_after_id = match page_token {
            Some(token) => {
                // startAfter anchors on the cursor document, so read it
                // before the page query.
                let _cursor = self.store.get_document(collection, token).await?;
                Some(token.to_string())
            }
            None => None,
        };

        let page = self
            .store
            .run_query(&DocumentQuery {
                collection: collection.to_string(),
                filters,
                start_after_id,
                limit: Some(limit),
            })
            .await?;

        let has_more = match page.last() {
            Some(last) => all
                .iter()
                .position(|doc| doc.id == last.id)
                .map(|index| index + 1 < total_count)
                .unwrap_or(false),
            None => false,
        };
        let next_page_token = if has_more {
            page.last().map(|doc| doc.id.clone())
        } else {
            None
        };

        let documents: Vec<Value> = page
            .iter()
            .map(|doc| {
                json!({
                    "id": doc.id,
                    "url": self.document_url(collection, &doc.id),
                    "document": fields_to_json(&doc.fields),
                })
            })
            .collect();

        Ok(ToolResponse::json(&json!({
            "totalCount": total_count,
            "documents": documents,
            "nextPageToken": next_page_token,
            "hasMore": has_more,
        })))
    }

    pub async fn get_document(&self, collection: &str, id: &str) -> ToolResponse {
        match self.try_get_document(collection, id).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(format!("Error getting document: {err}")),
        }
    }

    async fn try_get_document(&self, collection: &str, id: &str) -> Result<ToolResponse> {
        let Some(doc) = self.store.get_document(collection, id).await? else {
            return Ok(ToolResponse::error("Document not found"));
        };
        Ok(ToolResponse::json(&json!({
            "id": doc.id,
            "url": self.document_url(collection, &doc.id),
            "document": fields_to_json(&doc.fields),
        })))
    }

    pub async fn add_document(&self, collection: &str, data: &Map<String, Value>) -> ToolResponse {
        match self.try_add_document(collection, data).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(format!("Error adding document: {err}")),
        }
    }

    async fn try_add_document(
        &self,
        collection: &str,
        data: &Map<String, Value>,
    ) -> Result<ToolResponse> {
        let fields = fields_from_json(data);
        let id = self.store.add_document(collection, fields.clone()).await?;
        // Echo the normalized input rather than re-reading the document;
        // backend-side transformations beyond timestamps will not appear.
        Ok(ToolResponse::json(&json!({
            "id": id,
            "url": self.document_url(collection, &id),
            "document": fields_to_json(&fields),
        })))
    }

    pub async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> ToolResponse {
        match self.try_update_document(collection, id, data).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(format!("Error updating document: {err}")),
        }
    }

    async fn try_update_document(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<ToolResponse> {
        let fields = fields_from_json(data);
        self.store
            .update_document(collection, id, fields.clone())
            .await?;
        Ok(ToolResponse::json(&json!({
            "id": id,
            "url": self.document_url(collection, id),
            "document": fields_to_json(&fields),
        })))
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> ToolResponse {
        match self.store.delete_document(collection, id).await {
            Ok(()) => ToolResponse::text("Document deleted successfully"),
            Err(err) => ToolResponse::error(format!("Error deleting document: {err}")),
        }
    }
}

/// Parse raw `{field, operator, value}` filter objects.
///
/// String values that parse as calendar dates are compared as native
/// timestamps. This is a deliberate heuristic: date fields reach this server
/// as strings, and comparing them lexically against timestamp fields would
/// match nothing.
fn parse_filters(raw: &[Value]) -> Result<Vec<FieldFilter>> {
    raw.iter()
        .map(|entry| {
            let field = entry
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::InvalidQuery("filter is missing 'field'".into()))?;
            let operator = entry
                .get("operator")
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::InvalidQuery("filter is missing 'operator'".into()))?;
            let op = FilterOp::parse(operator).ok_or_else(|| {
                ClientError::InvalidQuery(format!("unsupported filter operator: {operator}"))
            })?;
            let value = entry.get("value").unwrap_or(&Value::Null);
            Ok(FieldFilter {
                field: field.to_string(),
                op,
                value: coerce_filter_value(value),
            })
        })
        .collect()
}

fn coerce_filter_value(value: &Value) -> FieldValue {
    match value {
        Value::String(s) => match parse_date_like(s) {
            Some(ts) => FieldValue::Timestamp(ts),
            None => FieldValue::Str(s.clone()),
        },
        Value::Array(items) => FieldValue::Array(items.iter().map(coerce_filter_value).collect()),
        other => FieldValue::from_json(other),
    }
}
