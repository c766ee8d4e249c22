//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger. Values are never included — only keys, identifiers,
//! and backend reasons.

use uuid::Uuid;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to read a record from storage.
    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Failed to write a record to storage.
    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Failed to delete a record from storage.
    #[error("failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// A snapshot insert lost the version race: another writer already
    /// claimed the version this write expected to be next.
    #[error("snapshot version conflict for environment {env_id}: expected to write version {attempted}, latest is {latest}")]
    VersionConflict {
        env_id: Uuid,
        attempted: u32,
        latest: u32,
    },

    /// A stored record could not be decoded into its typed form.
    #[error("corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}
