//! Identity Toolkit REST binding.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{IdentityDirectory, UserRecord};
use crate::error::{ClientError, Result};

use super::{error_from_response, RestContext};

pub const NO_USER_RECORD: &str =
    "There is no user record corresponding to the provided identifier.";

pub struct RestIdentityDirectory {
    ctx: RestContext,
    base_url: String,
}

impl RestIdentityDirectory {
    /// `base_url` is the API root without a trailing slash, e.g.
    /// `https://identitytoolkit.googleapis.com/v1` or
    /// `http://localhost:9099/identitytoolkit.googleapis.com/v1`.
    pub fn new(ctx: RestContext, base_url: String) -> Self {
        Self { ctx, base_url }
    }

    fn accounts_url(&self, action: &str) -> String {
        format!(
            "{}/projects/{}/accounts{action}",
            self.base_url, self.ctx.project_id
        )
    }

    async fn lookup(&self, body: Value) -> Result<UserRecord> {
        let request = self.ctx.http().post(self.accounts_url(":lookup")).json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let payload: Value = response.json().await.map_err(ClientError::backend)?;
        let user = payload
            .get("users")
            .and_then(Value::as_array)
            .and_then(|users| users.first())
            .ok_or_else(|| ClientError::NotFound(NO_USER_RECORD.to_string()))?;
        Ok(user_from_wire(user))
    }
}

/// Identity Toolkit speaks `localId`; callers see the Admin-SDK `uid`.
fn user_from_wire(user: &Value) -> UserRecord {
    let mut extra = serde_json::Map::new();
    for (key, value) in user.as_object().cloned().unwrap_or_default() {
        match key.as_str() {
            "localId" | "email" | "displayName" | "emailVerified" | "disabled" => {}
            _ => {
                extra.insert(key, value);
            }
        }
    }
    UserRecord {
        uid: user
            .get("localId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        email: user
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string),
        display_name: user
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::to_string),
        email_verified: user
            .get("emailVerified")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        disabled: user
            .get("disabled")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        extra,
    }
}

#[async_trait]
impl IdentityDirectory for RestIdentityDirectory {
    async fn user_by_id(&self, uid: &str) -> Result<UserRecord> {
        self.lookup(json!({ "localId": [uid] })).await
    }

    async fn user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.lookup(json!({ "email": [email] })).await
    }

    async fn create_user(&self, record: UserRecord) -> Result<UserRecord> {
        let mut body = json!({});
        if !record.uid.is_empty() {
            body["localId"] = json!(record.uid);
        }
        if let Some(email) = &record.email {
            body["email"] = json!(email);
        }
        if let Some(name) = &record.display_name {
            body["displayName"] = json!(name);
        }
        let request = self.ctx.http().post(self.accounts_url("")).json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let payload: Value = response.json().await.map_err(ClientError::backend)?;
        let uid = payload
            .get("localId")
            .and_then(Value::as_str)
            .unwrap_or(&record.uid)
            .to_string();
        Ok(UserRecord { uid, ..record })
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        let body = json!({ "localId": uid });
        let request = self.ctx.http().post(self.accounts_url(":delete")).json(&body);
        let response = self.ctx.authorize(request).await?.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}
