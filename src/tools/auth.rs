use std::sync::Arc;

use crate::backend::IdentityDirectory;
use crate::envelope::ToolResponse;
use crate::error::{ClientError, Result};

/// Auth lookups. Failures propagate to the caller; this client never
/// returns an error envelope.
pub struct AuthTools {
    directory: Arc<dyn IdentityDirectory>,
}

impl AuthTools {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Identifiers containing `@` are resolved as email addresses,
    /// everything else as a uid.
    pub async fn get_user(&self, identifier: &str) -> Result<ToolResponse> {
        let user = if identifier.contains('@') {
            self.directory.user_by_email(identifier).await?
        } else {
            self.directory.user_by_id(identifier).await?
        };
        let payload = serde_json::to_value(&user).map_err(ClientError::backend)?;
        Ok(ToolResponse::json(&payload))
    }
}
