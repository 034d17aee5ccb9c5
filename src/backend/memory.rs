//! In-memory backends.
//!
//! Stand-ins for the Firebase emulators: the integration tests run the full
//! tool surface against these, and they double as fixtures (document
//! seeding with native timestamps, user create/delete, object upload,
//! failure injection for bucket resolution and URL signing).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{ClientError, Result};

use super::value::{DocumentFields, FieldValue};
use super::{
    BlobStore, DocumentQuery, DocumentStore, FieldFilter, FilterOp, IdentityDirectory,
    ObjectMetadata, ObjectPage, StoredDocument, UserRecord,
};

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Collections are keyed by full path (`users`, `users/alice/posts`);
/// documents within a collection are kept id-sorted, which is the query
/// order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, DocumentFields>>>,
    next_id: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture: insert a document with a chosen id, native timestamps and
    /// all.
    pub fn seed_document(&self, collection: &str, id: &str, fields: DocumentFields) {
        let mut guard = self.collections.write();
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Fixture: ensure a (possibly empty) collection exists.
    pub fn seed_collection(&self, collection: &str) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default();
    }

    fn assign_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("auto-{n:08}")
    }
}

fn matches_filter(fields: &DocumentFields, filter: &FieldFilter) -> bool {
    let Some(actual) = fields.get(&filter.field) else {
        // Missing fields never satisfy a filter, inequality included.
        return false;
    };
    match filter.op {
        FilterOp::Eq => actual.loose_eq(&filter.value),
        FilterOp::Neq => !actual.loose_eq(&filter.value),
        FilterOp::Lt => actual.compare(&filter.value) == Some(std::cmp::Ordering::Less),
        FilterOp::Lte => matches!(
            actual.compare(&filter.value),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        FilterOp::Gt => actual.compare(&filter.value) == Some(std::cmp::Ordering::Greater),
        FilterOp::Gte => matches!(
            actual.compare(&filter.value),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        FilterOp::ArrayContains => match actual {
            FieldValue::Array(items) => items.iter().any(|item| item.loose_eq(&filter.value)),
            _ => false,
        },
        FilterOp::ArrayContainsAny => match (actual, &filter.value) {
            (FieldValue::Array(items), FieldValue::Array(wanted)) => items
                .iter()
                .any(|item| wanted.iter().any(|w| item.loose_eq(w))),
            _ => false,
        },
        FilterOp::In => match &filter.value {
            FieldValue::Array(wanted) => wanted.iter().any(|w| actual.loose_eq(w)),
            _ => false,
        },
        FilterOp::NotIn => match &filter.value {
            FieldValue::Array(wanted) => !wanted.iter().any(|w| actual.loose_eq(w)),
            _ => false,
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_collection_ids(&self, parent: Option<&str>) -> Result<Vec<String>> {
        let guard = self.collections.read();
        let mut ids: Vec<String> = match parent {
            None => guard
                .keys()
                .filter(|path| !path.contains('/'))
                .cloned()
                .collect(),
            Some(parent) => {
                let wanted = format!("{}/", parent.trim_matches('/'));
                guard
                    .keys()
                    .filter_map(|path| {
                        let rest = path.strip_prefix(&wanted)?;
                        if rest.is_empty() || rest.contains('/') {
                            None
                        } else {
                            Some(rest.to_string())
                        }
                    })
                    .collect()
            }
        };
        ids.dedup();
        Ok(ids)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        let guard = self.collections.read();
        Ok(guard.get(collection).and_then(|docs| {
            docs.get(id).map(|fields| StoredDocument {
                id: id.to_string(),
                fields: fields.clone(),
            })
        }))
    }

    async fn add_document(&self, collection: &str, fields: DocumentFields) -> Result<String> {
        let id = self.assign_id();
        let mut guard = self.collections.write();
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: DocumentFields,
    ) -> Result<()> {
        let mut guard = self.collections.write();
        let existing = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| {
                ClientError::NotFound(format!("No document to update: {collection}/{id}"))
            })?;
        for (key, value) in fields {
            existing.insert(key, value);
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let mut guard = self.collections.write();
        if let Some(docs) = guard.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<StoredDocument>> {
        let guard = self.collections.read();
        let Some(docs) = guard.get(&query.collection) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (id, fields) in docs.iter() {
            if let Some(after) = &query.start_after_id {
                if id.as_str() <= after.as_str() {
                    continue;
                }
            }
            if !query.filters.iter().all(|f| matches_filter(fields, f)) {
                continue;
            }
            out.push(StoredDocument {
                id: id.clone(),
                fields: fields.clone(),
            });
            if let Some(limit) = query.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

pub const NO_USER_RECORD: &str =
    "There is no user record corresponding to the provided identifier.";

#[derive(Default)]
pub struct MemoryIdentityDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentityDirectory {
    async fn user_by_id(&self, uid: &str) -> Result<UserRecord> {
        self.users
            .read()
            .get(uid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(NO_USER_RECORD.to_string()))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.users
            .read()
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(NO_USER_RECORD.to_string()))
    }

    async fn create_user(&self, record: UserRecord) -> Result<UserRecord> {
        let mut guard = self.users.write();
        if guard.contains_key(&record.uid) {
            return Err(ClientError::Backend(format!(
                "uid already exists: {}",
                record.uid
            )));
        }
        guard.insert(record.uid.clone(), record.clone());
        Ok(record)
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        self.users.write().remove(uid);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

struct StoredObject {
    size: u64,
    content_type: String,
    updated: DateTime<Utc>,
}

#[derive(Default)]
struct BlobState {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    default_bucket: Option<String>,
    unsignable: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    state: RwLock<BlobState>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&self, name: &str) {
        self.state.write().buckets.entry(name.to_string()).or_default();
    }

    /// Fixture: `None` makes `default_bucket()` fail, exercising the
    /// fallback chain.
    pub fn set_default_bucket(&self, name: Option<&str>) {
        let mut guard = self.state.write();
        if let Some(name) = name {
            guard.buckets.entry(name.to_string()).or_default();
            guard.default_bucket = Some(name.to_string());
        } else {
            guard.default_bucket = None;
        }
    }

    /// Fixture: signed-URL generation for this object path will fail.
    pub fn fail_signing_for(&self, path: &str) {
        self.state.write().unsignable.insert(path.to_string());
    }
}

#[derive(Clone, Copy, PartialEq)]
enum EntryKind {
    Object,
    Prefix,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn default_bucket(&self) -> Result<String> {
        self.state
            .read()
            .default_bucket
            .clone()
            .ok_or_else(|| ClientError::Backend("no default bucket configured".to_string()))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.state.read().buckets.contains_key(bucket))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ObjectPage> {
        let guard = self.state.read();
        let objects = guard.buckets.get(bucket).ok_or_else(|| {
            ClientError::BucketUnreachable(format!(
                "The specified bucket does not exist: {bucket}"
            ))
        })?;

        // Collapse everything below the first delimiter past the prefix into
        // a single prefix entry, like a real prefix+delimiter listing.
        let mut entries: Vec<(String, EntryKind)> = Vec::new();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        for name in objects.keys() {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            match rest.find(delimiter) {
                Some(pos) if !delimiter.is_empty() => {
                    let dir = format!("{prefix}{}{delimiter}", &rest[..pos]);
                    if seen_prefixes.insert(dir.clone()) {
                        entries.push((dir, EntryKind::Prefix));
                    }
                }
                _ => entries.push((name.clone(), EntryKind::Object)),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let start = match page_token {
            Some(token) => entries
                .iter()
                .position(|(name, _)| name.as_str() > token)
                .unwrap_or(entries.len()),
            None => 0,
        };
        let page: Vec<_> = entries[start..]
            .iter()
            .take(max_results.max(1))
            .cloned()
            .collect();
        let has_more = start + page.len() < entries.len();
        let next_page_token = if has_more {
            page.last().map(|(name, _)| name.clone())
        } else {
            None
        };

        let mut out = ObjectPage {
            next_page_token,
            ..ObjectPage::default()
        };
        for (name, kind) in page {
            match kind {
                EntryKind::Prefix => out.prefixes.push(name),
                EntryKind::Object => {
                    let obj = &objects[&name];
                    out.objects.push(ObjectMetadata {
                        name,
                        size: obj.size,
                        content_type: Some(obj.content_type.clone()),
                        updated: Some(obj.updated),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn object_exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let guard = self.state.read();
        let objects = guard.buckets.get(bucket).ok_or_else(|| {
            ClientError::BucketUnreachable(format!(
                "The specified bucket does not exist: {bucket}"
            ))
        })?;
        Ok(objects.contains_key(path))
    }

    async fn object_metadata(&self, bucket: &str, path: &str) -> Result<ObjectMetadata> {
        let guard = self.state.read();
        let objects = guard.buckets.get(bucket).ok_or_else(|| {
            ClientError::BucketUnreachable(format!(
                "The specified bucket does not exist: {bucket}"
            ))
        })?;
        let obj = objects
            .get(path)
            .ok_or_else(|| ClientError::NotFound(format!("No such object: {bucket}/{path}")))?;
        Ok(ObjectMetadata {
            name: path.to_string(),
            size: obj.size,
            content_type: Some(obj.content_type.clone()),
            updated: Some(obj.updated),
        })
    }

    async fn signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String> {
        let guard = self.state.read();
        if guard.unsignable.contains(path) {
            return Err(ClientError::Backend(format!(
                "signing failed for {path}"
            )));
        }
        Ok(format!(
            "https://storage.example.com/{bucket}/{path}?expires={}",
            ttl.as_secs()
        ))
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let mut guard = self.state.write();
        guard
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                path.to_string(),
                StoredObject {
                    size: data.len() as u64,
                    content_type: content_type.to_string(),
                    updated: Utc::now(),
                },
            );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> DocumentFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn delimiter_listing_groups_subdirectories() {
        let store = MemoryBlobStore::new();
        store.create_bucket("b");
        store
            .put_object("b", "top.txt", b"x".to_vec(), "text/plain")
            .await
            .unwrap();
        store
            .put_object("b", "photos/a.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap();
        store
            .put_object("b", "photos/b.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let page = store.list_objects("b", "", "/", 10, None).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.objects[0].name, "top.txt");
        assert_eq!(page.prefixes, vec!["photos/".to_string()]);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn query_start_after_skips_past_cursor() {
        let store = MemoryDocumentStore::new();
        for id in ["a", "b", "c"] {
            store.seed_document("col", id, fields(&[("n", FieldValue::Int(1))]));
        }
        let page = store
            .run_query(&DocumentQuery {
                collection: "col".into(),
                filters: vec![],
                start_after_id: Some("a".into()),
                limit: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "b");
    }

    #[tokio::test]
    async fn missing_field_never_matches() {
        let filter = FieldFilter {
            field: "absent".into(),
            op: FilterOp::Neq,
            value: FieldValue::Int(1),
        };
        assert!(!matches_filter(
            &fields(&[("present", FieldValue::Int(2))]),
            &filter
        ));
    }
}
