//! Cloud Storage binding: the JSON API for listing and metadata, V2 signed
//! URLs in production, emulator media URLs otherwise.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::backend::{BlobStore, ObjectMetadata, ObjectPage};
use crate::error::{ClientError, Result};

use super::{error_from_response, RestContext};

/// Encoding for an object path used as a single URL segment (`/` escaped).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encoding for an object path kept as a URL path (`/` preserved).
const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

pub struct RestBlobStore {
    ctx: RestContext,
    /// JSON API root, e.g. `https://storage.googleapis.com` or the
    /// emulator host.
    api_base: String,
    /// Firebase Storage management API root, used for default-bucket lookup.
    mgmt_base: String,
    emulated: bool,
}

impl RestBlobStore {
    pub fn new(ctx: RestContext, api_base: String, mgmt_base: String, emulated: bool) -> Self {
        Self {
            ctx,
            api_base,
            mgmt_base,
            emulated,
        }
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/b/{bucket}", self.api_base)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/o/{}",
            self.bucket_url(bucket),
            utf8_percent_encode(path, SEGMENT)
        )
    }
}

fn metadata_from_wire(object: &Value) -> ObjectMetadata {
    ObjectMetadata {
        name: object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        size: object
            .get("size")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .or_else(|| object.get("size").and_then(Value::as_u64))
            .unwrap_or(0),
        content_type: object
            .get("contentType")
            .and_then(Value::as_str)
            .map(str::to_string),
        updated: object
            .get("updated")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc)),
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn default_bucket(&self) -> Result<String> {
        // The emulator has no management surface; resolution falls through
        // to the name-derivation chain.
        if self.emulated {
            return Err(ClientError::Backend(
                "default bucket lookup unavailable against the emulator".to_string(),
            ));
        }
        let url = format!(
            "{}/v1beta/projects/{}/defaultBucket",
            self.mgmt_base, self.ctx.project_id
        );
        let request = self.ctx.http().get(&url);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let payload: Value = response.json().await.map_err(ClientError::backend)?;
        payload
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Backend("default bucket response missing name".into()))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let request = self.ctx.http().get(self.bucket_url(bucket));
        let response = self.ctx.authorize(request).await?.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ObjectPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("prefix", prefix.to_string()),
            ("delimiter", delimiter.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        let url = format!("{}/o", self.bucket_url(bucket));
        let request = self.ctx.http().get(&url).query(&params);
        let response = self.ctx.authorize(request).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::BucketUnreachable(format!(
                "The specified bucket does not exist: {bucket}"
            )));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let payload: Value = response.json().await.map_err(ClientError::backend)?;
        Ok(ObjectPage {
            objects: payload
                .get("items")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(metadata_from_wire).collect())
                .unwrap_or_default(),
            prefixes: payload
                .get("prefixes")
                .and_then(Value::as_array)
                .map(|prefixes| {
                    prefixes
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            next_page_token: payload
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn object_exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let request = self.ctx.http().get(self.object_url(bucket, path));
        let response = self.ctx.authorize(request).await?.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn object_metadata(&self, bucket: &str, path: &str) -> Result<ObjectMetadata> {
        let request = self.ctx.http().get(self.object_url(bucket, path));
        let response = self.ctx.authorize(request).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!(
                "No such object: {bucket}/{path}"
            )));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let payload: Value = response.json().await.map_err(ClientError::backend)?;
        Ok(metadata_from_wire(&payload))
    }

    async fn signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String> {
        if self.emulated {
            return Ok(format!(
                "{}/v0/b/{bucket}/o/{}?alt=media",
                self.api_base,
                utf8_percent_encode(path, SEGMENT)
            ));
        }

        let provider = self.ctx.token_provider().ok_or_else(|| {
            ClientError::NotInitialized(
                "signed URLs require service account credentials".to_string(),
            )
        })?;
        let expires = (chrono::Utc::now() + ttl).timestamp();
        let string_to_sign = format!("GET\n\n\n{expires}\n/{bucket}/{path}");
        let signature = provider.sign_rsa_sha256(string_to_sign.as_bytes())?;
        let signature = base64::engine::general_purpose::STANDARD.encode(signature);
        Ok(format!(
            "https://storage.googleapis.com/{bucket}/{}?GoogleAccessId={}&Expires={expires}&Signature={}",
            utf8_percent_encode(path, PATH),
            utf8_percent_encode(provider.client_email(), SEGMENT),
            utf8_percent_encode(&signature, SEGMENT),
        ))
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{bucket}/o", self.api_base);
        let request = self
            .ctx
            .http()
            .post(&url)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_parses_string_sizes() {
        let meta = metadata_from_wire(&json!({
            "name": "photos/cat.jpg",
            "size": "2048",
            "contentType": "image/jpeg",
            "updated": "2024-06-01T10:00:00Z"
        }));
        assert_eq!(meta.name, "photos/cat.jpg");
        assert_eq!(meta.size, 2048);
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
        assert!(meta.updated.is_some());
    }

    #[test]
    fn object_paths_encode_slashes_in_segments() {
        let encoded = utf8_percent_encode("a/b c.txt", SEGMENT).to_string();
        assert_eq!(encoded, "a%2Fb%20c.txt");
    }
}
