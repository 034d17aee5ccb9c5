//! Capability interfaces for the three consumed backends.
//!
//! The tool clients never talk to Firebase directly; they hold one of these
//! trait objects. `rest` binds them to the live services (or their
//! emulators), `memory` provides the in-process stand-ins the test suite
//! runs against.

pub mod memory;
pub mod rest;
pub mod value;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use value::{DocumentFields, FieldValue};

/// A document as stored by the backend.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub fields: DocumentFields,
}

/// Comparison operators accepted by `firestore_list_documents` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Neq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "array-contains" => Some(Self::ArrayContains),
            "array-contains-any" => Some(Self::ArrayContainsAny),
            "in" => Some(Self::In),
            "not-in" => Some(Self::NotIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
            Self::In => "in",
            Self::NotIn => "not-in",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: FieldValue,
}

/// Conjunctive filtered query over one collection, ordered by document id
/// for deterministic pagination.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub start_after_id: Option<String>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Child collection ids at the store root (`None`) or under a document
    /// path such as `users/alice`.
    async fn list_collection_ids(&self, parent: Option<&str>) -> Result<Vec<String>>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>>;

    /// Backend assigns the id.
    async fn add_document(&self, collection: &str, fields: DocumentFields) -> Result<String>;

    /// Merge-write of the supplied fields only. Fails with `NotFound` when
    /// the document does not exist.
    async fn update_document(&self, collection: &str, id: &str, fields: DocumentFields)
        -> Result<()>;

    /// Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<StoredDocument>>;
}

/// Backend user record, serialized to callers in Admin-SDK field casing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "emailVerified", default)]
    pub email_verified: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn user_by_id(&self, uid: &str) -> Result<UserRecord>;
    async fn user_by_email(&self, email: &str) -> Result<UserRecord>;

    /// Test-fixture operation.
    async fn create_user(&self, record: UserRecord) -> Result<UserRecord>;
    /// Test-fixture operation.
    async fn delete_user(&self, uid: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

/// One page of a prefix+delimiter listing: direct objects plus the next
/// level of directory prefixes.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMetadata>,
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The project's configured default bucket, if the backend knows one.
    async fn default_bucket(&self) -> Result<String>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// `max_results` caps objects and prefixes combined.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ObjectPage>;

    async fn object_exists(&self, bucket: &str, path: &str) -> Result<bool>;

    async fn object_metadata(&self, bucket: &str, path: &str) -> Result<ObjectMetadata>;

    /// Time-limited signed read URL.
    async fn signed_download_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String>;

    /// Test-fixture operation.
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}
