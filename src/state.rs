use std::sync::Arc;

use anyhow::Context;

use crate::backend::rest::credentials::{ServiceAccount, TokenProvider};
use crate::backend::rest::{
    auth::RestIdentityDirectory, firestore::RestDocumentStore, storage::RestBlobStore,
    RestContext,
};
use crate::backend::{BlobStore, DocumentStore, IdentityDirectory};
use crate::config::Config;
use crate::tools::{AuthTools, FirestoreTools, StorageTools};

/// Backend handles shared by every tool call. Built once at startup,
/// read-only afterwards.
pub struct AppState {
    pub firestore: FirestoreTools,
    pub auth: AuthTools,
    pub storage: StorageTools,
    pub project_id: String,
}

impl AppState {
    /// Assemble state over explicit backend implementations.
    pub fn new(
        config: &Config,
        project_id: impl Into<String>,
        documents: Arc<dyn DocumentStore>,
        identities: Arc<dyn IdentityDirectory>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let project_id = project_id.into();
        Self {
            firestore: FirestoreTools::new(documents, project_id.clone()),
            auth: AuthTools::new(identities),
            storage: StorageTools::new(
                blobs,
                project_id.clone(),
                config.storage_bucket.clone(),
                config.storage_emulator_host.is_some(),
                config.strict_not_found,
            ),
            project_id,
        }
    }

    /// Wire the REST bindings from configuration. Emulator hosts swap base
    /// URLs and drop authentication per backend.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let account = match &config.service_account_key_path {
            Some(path) => Some(ServiceAccount::from_file(path)?),
            None => None,
        };

        let project_id = config
            .project_id
            .clone()
            .or_else(|| account.as_ref().map(|a| a.project_id.clone()))
            .context(
                "no project id: set SERVICE_ACCOUNT_KEY_PATH or FIREBASE_PROJECT_ID",
            )?;

        let ctx = match account {
            Some(account) => {
                let provider = Arc::new(TokenProvider::new(account, reqwest::Client::new()));
                RestContext::with_service_account(project_id.clone(), provider)
            }
            None => {
                anyhow::ensure!(
                    config.emulator_mode(),
                    "SERVICE_ACCOUNT_KEY_PATH is required outside emulator mode"
                );
                RestContext::emulator(project_id.clone())
            }
        };

        let firestore_base = match &config.firestore_emulator_host {
            Some(host) => format!("http://{host}/v1"),
            None => "https://firestore.googleapis.com/v1".to_string(),
        };
        let auth_base = match &config.auth_emulator_host {
            Some(host) => format!("http://{host}/identitytoolkit.googleapis.com/v1"),
            None => "https://identitytoolkit.googleapis.com/v1".to_string(),
        };
        let (storage_api, storage_mgmt, storage_emulated) = match &config.storage_emulator_host {
            Some(host) => {
                let base = format!("http://{host}");
                (base.clone(), base, true)
            }
            None => (
                "https://storage.googleapis.com".to_string(),
                "https://firebasestorage.googleapis.com".to_string(),
                false,
            ),
        };

        let documents: Arc<dyn DocumentStore> =
            Arc::new(RestDocumentStore::new(ctx.clone(), firestore_base));
        let identities: Arc<dyn IdentityDirectory> =
            Arc::new(RestIdentityDirectory::new(ctx.clone(), auth_base));
        let blobs: Arc<dyn BlobStore> = Arc::new(RestBlobStore::new(
            ctx,
            storage_api,
            storage_mgmt,
            storage_emulated,
        ));

        Ok(Self::new(config, project_id, documents, identities, blobs))
    }
}
