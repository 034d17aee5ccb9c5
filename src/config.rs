use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once at startup.
///
/// Emulator hosts switch the matching backend to its local emulator and drop
/// authentication for it. Everything downstream receives plain values from
/// this struct; no component consults the environment after startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Path to the service account key JSON. Required unless every backend
    /// is pointed at an emulator.
    pub service_account_key_path: Option<PathBuf>,
    /// Project id override. Normally taken from the service account file.
    pub project_id: Option<String>,
    /// Explicit storage bucket name, bypassing bucket-name derivation.
    pub storage_bucket: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub auth_emulator_host: Option<String>,
    pub storage_emulator_host: Option<String>,
    /// When true, `storage_get_file_info` on a missing object propagates a
    /// fault instead of returning an error envelope.
    pub strict_not_found: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `STORAGE_STRICT_NOT_FOUND` overrides the strict-mode default, which
    /// is on exactly when the storage emulator is configured.
    pub fn from_env() -> anyhow::Result<Self> {
        let storage_emulator_host = non_empty(env::var("FIREBASE_STORAGE_EMULATOR_HOST").ok());

        let strict_not_found = match env::var("STORAGE_STRICT_NOT_FOUND") {
            Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => storage_emulator_host.is_some(),
        };

        Ok(Self {
            service_account_key_path: non_empty(env::var("SERVICE_ACCOUNT_KEY_PATH").ok())
                .map(PathBuf::from),
            project_id: non_empty(env::var("FIREBASE_PROJECT_ID").ok()),
            storage_bucket: non_empty(env::var("FIREBASE_STORAGE_BUCKET").ok()),
            firestore_emulator_host: non_empty(env::var("FIRESTORE_EMULATOR_HOST").ok()),
            auth_emulator_host: non_empty(env::var("FIREBASE_AUTH_EMULATOR_HOST").ok()),
            storage_emulator_host,
            strict_not_found,
        })
    }

    /// True when at least one backend targets an emulator.
    pub fn emulator_mode(&self) -> bool {
        self.firestore_emulator_host.is_some()
            || self.auth_emulator_host.is_some()
            || self.storage_emulator_host.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
