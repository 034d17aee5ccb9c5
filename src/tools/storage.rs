use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};

use crate::backend::BlobStore;
use crate::envelope::ToolResponse;
use crate::error::{ClientError, Result};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Signed download URLs are valid for one hour.
const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Bucket-missing errors are recognized by this substring wherever they
/// originate, and upgraded to the setup diagnostic.
const BUCKET_MISSING_MARKER: &str = "bucket does not exist";

const EMULATOR_BUCKET_SUFFIX: &str = "firebasestorage.app";

/// Storage operations over a flat key space with directory emulation.
pub struct StorageTools {
    blobs: Arc<dyn BlobStore>,
    project_id: String,
    bucket_override: Option<String>,
    emulator: bool,
    strict_not_found: bool,
}

impl StorageTools {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        project_id: impl Into<String>,
        bucket_override: Option<String>,
        emulator: bool,
        strict_not_found: bool,
    ) -> Self {
        Self {
            blobs,
            project_id: project_id.into(),
            bucket_override,
            emulator,
            strict_not_found,
        }
    }

    /// Resolve the bucket to operate on: the backend's configured default,
    /// then the explicit override, then the emulator-derived name, then the
    /// historical name formats — probing each candidate for existence so a
    /// wrong guess fails here rather than at first use.
    async fn resolve_bucket(&self) -> Result<String> {
        if let Ok(name) = self.blobs.default_bucket().await {
            return Ok(name);
        }
        if let Some(name) = &self.bucket_override {
            return Ok(name.clone());
        }
        if self.emulator {
            return Ok(format!("{}.{EMULATOR_BUCKET_SUFFIX}", self.project_id));
        }

        let candidates = [
            format!("{}.firebasestorage.app", self.project_id),
            format!("{}.appspot.com", self.project_id),
            self.project_id.clone(),
        ];
        for candidate in &candidates {
            match self.blobs.bucket_exists(candidate).await {
                Ok(true) => return Ok(candidate.clone()),
                Ok(false) | Err(_) => continue,
            }
        }
        Err(ClientError::BucketUnreachable(format!(
            "The specified bucket does not exist (tried {})",
            candidates.join(", ")
        )))
    }

    fn directory_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "https://console.firebase.google.com/project/{}/storage/{bucket}/files/{}",
            self.project_id,
            path.trim_end_matches('/')
        )
    }

    fn describe_error(&self, op: &str, err: &ClientError) -> String {
        let message = err.to_string();
        if message.contains(BUCKET_MISSING_MARKER) {
            format!(
                "Error {op}: {message}. The project's storage bucket has not been set up yet: \
                 open https://console.firebase.google.com/project/{}/storage and click \
                 'Get Started' to provision the default bucket, or set \
                 FIREBASE_STORAGE_BUCKET to the name of an existing bucket.",
                self.project_id
            )
        } else {
            format!("Error {op}: {message}")
        }
    }

    pub async fn list_directory_files(
        &self,
        directory_path: Option<&str>,
        page_size: usize,
        page_token: Option<&str>,
    ) -> ToolResponse {
        match self
            .try_list_directory_files(directory_path, page_size, page_token)
            .await
        {
            Ok(response) => response,
            Err(err) => ToolResponse::error(self.describe_error("listing files", &err)),
        }
    }

    async fn try_list_directory_files(
        &self,
        directory_path: Option<&str>,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ToolResponse> {
        let bucket = self.resolve_bucket().await?;

        let prefix = match directory_path.map(|p| p.trim_matches('/')) {
            Some(path) if !path.is_empty() => format!("{path}/"),
            _ => String::new(),
        };

        let page = self
            .blobs
            .list_objects(&bucket, &prefix, "/", page_size, page_token)
            .await?;

        // One signed-URL request per file, concurrently. A failure nulls
        // that entry's URL and never fails the listing.
        let file_futures = page
            .objects
            .iter()
            .filter(|object| object.name != prefix)
            .map(|object| {
                let bucket = bucket.clone();
                async move {
                    let download_url = match self
                        .blobs
                        .signed_download_url(&bucket, &object.name, SIGNED_URL_TTL)
                        .await
                    {
                        Ok(url) => Value::String(url),
                        Err(err) => {
                            tracing::warn!(
                                object = %object.name,
                                error = %err,
                                "Signed URL generation failed"
                            );
                            Value::Null
                        }
                    };
                    json!({
                        "type": "file",
                        "name": object.name,
                        "downloadURL": download_url,
                    })
                }
            });
        let mut entries: Vec<Value> = join_all(file_futures).await;

        for dir in &page.prefixes {
            entries.push(json!({
                "type": "directory",
                "name": dir,
                "url": self.directory_url(&bucket, dir),
            }));
        }

        Ok(ToolResponse::json(&json!({
            "files": entries,
            "nextPageToken": page.next_page_token,
            "hasMore": page.next_page_token.is_some(),
        })))
    }

    /// Strict mode propagates missing files as faults; otherwise they are
    /// reported as error envelopes like every other storage failure.
    pub async fn get_file_info(&self, file_path: &str) -> Result<ToolResponse> {
        let bucket = match self.resolve_bucket().await {
            Ok(bucket) => bucket,
            Err(err) => {
                return Ok(ToolResponse::error(
                    self.describe_error("getting file info", &err),
                ))
            }
        };

        let exists = match self.blobs.object_exists(&bucket, file_path).await {
            Ok(exists) => exists,
            Err(err) => {
                return Ok(ToolResponse::error(
                    self.describe_error("getting file info", &err),
                ))
            }
        };
        if !exists {
            let message = format!("File not found: {file_path}");
            if self.strict_not_found {
                return Err(ClientError::NotFound(message));
            }
            return Ok(ToolResponse::error(message));
        }

        let metadata = match self.blobs.object_metadata(&bucket, file_path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                return Ok(ToolResponse::error(
                    self.describe_error("getting file info", &err),
                ))
            }
        };

        let download_url = match self
            .blobs
            .signed_download_url(&bucket, file_path, SIGNED_URL_TTL)
            .await
        {
            Ok(url) => Value::String(url),
            Err(err) => {
                tracing::warn!(object = %file_path, error = %err, "Signed URL generation failed");
                Value::Null
            }
        };

        Ok(ToolResponse::json(&json!({
            "name": metadata.name,
            "size": metadata.size,
            "contentType": metadata.content_type,
            "updated": metadata.updated.map(|ts| ts.to_rfc3339()),
            "downloadURL": download_url,
        })))
    }
}
