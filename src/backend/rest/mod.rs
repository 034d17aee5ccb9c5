//! REST bindings for the three consumed backends.
//!
//! Each binding holds the shared [`RestContext`] plus its own base URL, so
//! emulators (and the test suite's mock servers) swap in by URL alone.

pub mod auth;
pub mod credentials;
pub mod firestore;
pub mod storage;

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ClientError, Result};
use credentials::TokenProvider;

/// Shared HTTP client and authorization source.
#[derive(Clone)]
pub struct RestContext {
    http: reqwest::Client,
    token: TokenMode,
    pub project_id: String,
}

#[derive(Clone)]
enum TokenMode {
    /// Emulators accept the well-known owner token.
    Emulator,
    ServiceAccount(Arc<TokenProvider>),
}

impl RestContext {
    pub fn with_service_account(project_id: String, provider: Arc<TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: TokenMode::ServiceAccount(provider),
            project_id,
        }
    }

    pub fn emulator(project_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: TokenMode::Emulator,
            project_id,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn token_provider(&self) -> Option<&Arc<TokenProvider>> {
        match &self.token {
            TokenMode::ServiceAccount(provider) => Some(provider),
            TokenMode::Emulator => None,
        }
    }

    async fn bearer(&self) -> Result<String> {
        match &self.token {
            TokenMode::Emulator => Ok("owner".to_string()),
            TokenMode::ServiceAccount(provider) => provider.access_token().await,
        }
    }

    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        Ok(request.bearer_auth(self.bearer().await?))
    }
}

/// Map a non-success Google API response onto the error taxonomy, pulling
/// the message out of the standard `{"error": {...}}` body when present.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.clone()
            }
        });

    match status.as_u16() {
        400 => ClientError::InvalidQuery(message),
        401 | 403 => ClientError::NotInitialized(message),
        404 => ClientError::NotFound(message),
        _ => ClientError::Backend(format!("{status}: {message}")),
    }
}
