//! Storage abstraction for Keyfort.
//!
//! This crate defines the [`Store`] trait — a typed record store that
//! knows nothing about encryption. Every value it holds is either
//! ciphertext or non-secret metadata; the envelope-encryption core in
//! `keyfort-core` guarantees plaintext never reaches this layer.
//!
//! One implementation is provided here: [`MemoryStore`], used by every
//! core test. Production deployments implement [`Store`] over their
//! database of choice.

mod error;
mod memory;
mod records;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use records::{
    InviteRecord, MemberKeyRecord, MemberRole, Principal, SecretRow, Snapshot, TokenRecord,
};

use uuid::Uuid;

/// A pluggable, typed record store.
///
/// Implementations must be safe to share across async tasks
/// (`Send + Sync`). All getters return `Ok(None)` for missing records;
/// "missing" is only an error at the service layer, where it carries
/// domain meaning (revoked token, unknown member, empty environment).
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ── Snapshots ────────────────────────────────────────────────────

    /// Fetch the highest-versioned snapshot for an environment.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_latest_snapshot(&self, env_id: Uuid) -> Result<Option<Snapshot>, StorageError>;

    /// Fetch the snapshot at an exact version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_snapshot_at(
        &self,
        env_id: Uuid,
        version: u32,
    ) -> Result<Option<Snapshot>, StorageError>;

    /// Insert a new snapshot.
    ///
    /// This is a guarded insert, never an overwrite: the write succeeds
    /// only if `snapshot.version` is exactly one greater than the latest
    /// stored version (or 1 when the environment has none). Concurrent
    /// writers race on this guard and the loser retries against the
    /// fresh latest.
    ///
    /// # Errors
    ///
    /// - [`StorageError::VersionConflict`] if another writer claimed the
    ///   version first.
    /// - [`StorageError::Write`] if the backend fails.
    async fn put_snapshot(&self, snapshot: Snapshot) -> Result<(), StorageError>;

    /// Delete all snapshots for `env_id` with `version < before_version`.
    ///
    /// Returns the number of snapshots removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the backend fails.
    async fn delete_snapshots_before(
        &self,
        env_id: Uuid,
        before_version: u32,
    ) -> Result<u32, StorageError>;

    // ── Member key records ───────────────────────────────────────────

    /// Fetch a member's keypair record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_member_key_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<MemberKeyRecord>, StorageError>;

    /// Persist a member's keypair record. Records are written once at
    /// signup and never updated.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn put_member_key_record(&self, record: MemberKeyRecord) -> Result<(), StorageError>;

    // ── Org key copies ───────────────────────────────────────────────

    /// Fetch the sealed org-key copy for a principal.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_org_key_copy(
        &self,
        org_id: Uuid,
        principal: Principal,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Persist a sealed org-key copy for a principal.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn put_org_key_copy(
        &self,
        org_id: Uuid,
        principal: Principal,
        ciphertext: Vec<u8>,
    ) -> Result<(), StorageError>;

    // ── Environment tokens ───────────────────────────────────────────

    /// Look up a token record by the hex SHA-256 hash of the presented
    /// token bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_token_record_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<TokenRecord>, StorageError>;

    /// Persist a token record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn put_token_record(&self, record: TokenRecord) -> Result<(), StorageError>;

    /// Delete a token record by id. Idempotent — deleting an unknown id
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the backend fails.
    async fn delete_token_record(&self, id: Uuid) -> Result<(), StorageError>;

    // ── Invites ──────────────────────────────────────────────────────

    /// Fetch an invite record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend fails.
    async fn get_invite(&self, invite_id: Uuid) -> Result<Option<InviteRecord>, StorageError>;

    /// Persist an invite record (insert or update — accepting an invite
    /// writes back the same record with `accepted_at` set).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend fails.
    async fn put_invite(&self, record: InviteRecord) -> Result<(), StorageError>;
}
