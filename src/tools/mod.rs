//! Capability clients: one module per backend, each exposing its tool
//! operations and normalizing results into response envelopes.

pub mod auth;
pub mod firestore;
pub mod storage;

pub use auth::AuthTools;
pub use firestore::FirestoreTools;
pub use storage::StorageTools;
