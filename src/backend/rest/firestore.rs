//! Firestore REST v1 binding.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::backend::value::{DocumentFields, FieldValue};
use crate::backend::{DocumentQuery, DocumentStore, FilterOp, StoredDocument};
use crate::error::{ClientError, Result};

use super::{error_from_response, RestContext};

pub struct RestDocumentStore {
    ctx: RestContext,
    base_url: String,
}

impl RestDocumentStore {
    /// `base_url` is the API root without a trailing slash, e.g.
    /// `https://firestore.googleapis.com/v1` or `http://localhost:8080/v1`.
    pub fn new(ctx: RestContext, base_url: String) -> Self {
        Self { ctx, base_url }
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.ctx.project_id
        )
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{collection}/{id}",
            self.ctx.project_id
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.documents_root())
    }
}

// --- wire codec ------------------------------------------------------------

/// Encode a field value as a Firestore REST `Value` object. Integers travel
/// as strings on this wire.
pub(crate) fn value_to_wire(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Int(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(f) => json!({ "doubleValue": f }),
        FieldValue::Str(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => json!({ "timestampValue": ts.to_rfc3339() }),
        FieldValue::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(value_to_wire).collect::<Vec<_>>() }
        }),
        FieldValue::Map(fields) => json!({
            "mapValue": { "fields": wire_fields(fields) }
        }),
    }
}

pub(crate) fn wire_to_value(value: &Value) -> FieldValue {
    let Some(obj) = value.as_object() else {
        return FieldValue::Null;
    };
    if obj.contains_key("nullValue") {
        FieldValue::Null
    } else if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        FieldValue::Bool(b)
    } else if let Some(raw) = obj.get("integerValue") {
        let parsed = match raw {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        parsed.map(FieldValue::Int).unwrap_or(FieldValue::Null)
    } else if let Some(f) = obj.get("doubleValue").and_then(Value::as_f64) {
        FieldValue::Double(f)
    } else if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        FieldValue::Str(s.to_string())
    } else if let Some(s) = obj.get("timestampValue").and_then(Value::as_str) {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&chrono::Utc)))
            .unwrap_or_else(|_| FieldValue::Str(s.to_string()))
    } else if let Some(arr) = value.pointer("/arrayValue/values").and_then(Value::as_array) {
        FieldValue::Array(arr.iter().map(wire_to_value).collect())
    } else if obj.contains_key("arrayValue") {
        FieldValue::Array(Vec::new())
    } else if let Some(map) = value.pointer("/mapValue/fields").and_then(Value::as_object) {
        FieldValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), wire_to_value(v)))
                .collect(),
        )
    } else if obj.contains_key("mapValue") {
        FieldValue::Map(Default::default())
    } else if let Some(s) = obj.get("referenceValue").and_then(Value::as_str) {
        FieldValue::Str(s.to_string())
    } else if let Some(s) = obj.get("bytesValue").and_then(Value::as_str) {
        FieldValue::Str(s.to_string())
    } else {
        FieldValue::Null
    }
}

fn wire_fields(fields: &DocumentFields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), value_to_wire(v)))
        .collect()
}

fn fields_from_wire(document: &Value) -> DocumentFields {
    document
        .get("fields")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), wire_to_value(v)))
                .collect()
        })
        .unwrap_or_default()
}

fn id_from_name(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

fn wire_op(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "EQUAL",
        FilterOp::Neq => "NOT_EQUAL",
        FilterOp::Lt => "LESS_THAN",
        FilterOp::Lte => "LESS_THAN_OR_EQUAL",
        FilterOp::Gt => "GREATER_THAN",
        FilterOp::Gte => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
        FilterOp::In => "IN",
        FilterOp::NotIn => "NOT_IN",
    }
}

impl RestDocumentStore {
    fn structured_query(&self, query: &DocumentQuery) -> Value {
        let mut structured = json!({
            "from": [{ "collectionId": query.collection }],
            "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
        });

        let filters: Vec<Value> = query
            .filters
            .iter()
            .map(|f| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": f.field },
                        "op": wire_op(f.op),
                        "value": value_to_wire(&f.value),
                    }
                })
            })
            .collect();
        match filters.len() {
            0 => {}
            1 => {
                structured["where"] = filters.into_iter().next().unwrap_or_default();
            }
            _ => {
                structured["where"] = json!({
                    "compositeFilter": { "op": "AND", "filters": filters }
                });
            }
        }

        if let Some(after) = &query.start_after_id {
            structured["startAt"] = json!({
                "values": [{
                    "referenceValue": self.document_name(&query.collection, after)
                }],
                "before": false,
            });
        }
        if let Some(limit) = query.limit {
            structured["limit"] = json!(limit);
        }
        json!({ "structuredQuery": structured })
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn list_collection_ids(&self, parent: Option<&str>) -> Result<Vec<String>> {
        let url = match parent {
            Some(path) => format!(
                "{}/{}:listCollectionIds",
                self.documents_root(),
                path.trim_matches('/')
            ),
            None => format!("{}:listCollectionIds", self.documents_root()),
        };

        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "pageSize": 300 });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let request = self.ctx.http().post(&url).json(&body);
            let response = self.ctx.authorize(request).await?.send().await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }
            let payload: Value = response.json().await.map_err(ClientError::backend)?;
            if let Some(batch) = payload.get("collectionIds").and_then(Value::as_array) {
                ids.extend(batch.iter().filter_map(Value::as_str).map(str::to_string));
            }
            page_token = payload
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(ids)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        let request = self.ctx.http().get(self.document_url(collection, id));
        let response = self.ctx.authorize(request).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let document: Value = response.json().await.map_err(ClientError::backend)?;
        Ok(Some(StoredDocument {
            id: id.to_string(),
            fields: fields_from_wire(&document),
        }))
    }

    async fn add_document(&self, collection: &str, fields: DocumentFields) -> Result<String> {
        let url = format!("{}/{collection}", self.documents_root());
        let body = json!({ "fields": wire_fields(&fields) });
        let request = self.ctx.http().post(&url).json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let document: Value = response.json().await.map_err(ClientError::backend)?;
        document
            .get("name")
            .and_then(Value::as_str)
            .map(id_from_name)
            .ok_or_else(|| ClientError::Backend("create response missing document name".into()))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: DocumentFields,
    ) -> Result<()> {
        // Merge semantics: the update mask restricts the write to the
        // supplied fields, and the exists precondition rejects missing ids.
        let mut params: Vec<(&str, String)> =
            vec![("currentDocument.exists", "true".to_string())];
        for field in fields.keys() {
            params.push(("updateMask.fieldPaths", field.clone()));
        }

        let body = json!({ "fields": wire_fields(&fields) });
        let request = self
            .ctx
            .http()
            .patch(self.document_url(collection, id))
            .query(&params)
            .json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!(
                "No document to update: {collection}/{id}"
            )));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let request = self.ctx.http().delete(self.document_url(collection, id));
        let response = self.ctx.authorize(request).await?.send().await?;
        // Firestore deletes are idempotent; missing documents return OK.
        if !response.status().is_success()
            && response.status() != reqwest::StatusCode::NOT_FOUND
        {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<StoredDocument>> {
        let url = format!("{}:runQuery", self.documents_root());
        let body = self.structured_query(query);
        let request = self.ctx.http().post(&url).json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        // The response is a stream of result envelopes; entries without a
        // `document` key carry read time only.
        let results: Vec<Value> = response.json().await.map_err(ClientError::backend)?;
        Ok(results
            .iter()
            .filter_map(|entry| entry.get("document"))
            .map(|document| StoredDocument {
                id: document
                    .get("name")
                    .and_then(Value::as_str)
                    .map(id_from_name)
                    .unwrap_or_default(),
                fields: fields_from_wire(document),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wire_codec_round_trips_typed_values() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let original = FieldValue::Map(
            [
                ("count".to_string(), FieldValue::Int(42)),
                ("ratio".to_string(), FieldValue::Double(0.5)),
                ("when".to_string(), FieldValue::Timestamp(ts)),
                (
                    "tags".to_string(),
                    FieldValue::Array(vec![FieldValue::Str("a".into())]),
                ),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(wire_to_value(&value_to_wire(&original)), original);
    }

    #[test]
    fn integers_travel_as_strings() {
        assert_eq!(
            value_to_wire(&FieldValue::Int(7)),
            json!({ "integerValue": "7" })
        );
    }

    #[test]
    fn id_from_name_takes_last_segment() {
        assert_eq!(
            id_from_name("projects/p/databases/(default)/documents/users/alice"),
            "alice"
        );
    }
}
