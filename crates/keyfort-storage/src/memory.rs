//! In-memory store for testing.
//!
//! Holds all records in maps behind a single `RwLock`. Not persistent —
//! all data is lost when the process exits. Use this for unit and
//! integration tests where you need a real [`Store`] without a database.
//!
//! The snapshot version guard is enforced here exactly as a production
//! backend must enforce it (insert succeeds only at latest + 1), so the
//! concurrency behavior tests exercise is the real one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    InviteRecord, MemberKeyRecord, Principal, Snapshot, StorageError, Store, TokenRecord,
};

#[derive(Debug, Default)]
struct Inner {
    /// Per-environment snapshots, keyed by version. BTreeMap keeps
    /// versions ordered so "latest" is `last_key_value`.
    snapshots: HashMap<Uuid, BTreeMap<u32, Snapshot>>,
    member_keys: HashMap<Uuid, MemberKeyRecord>,
    org_key_copies: HashMap<(Uuid, Principal), Vec<u8>>,
    /// Token records keyed by their hex SHA-256 hash.
    tokens: HashMap<String, TokenRecord>,
    invites: HashMap<Uuid, InviteRecord>,
}

/// An in-memory [`Store`] backed by plain maps.
///
/// Thread-safe and async-compatible. Cloning is cheap and clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get_latest_snapshot(&self, env_id: Uuid) -> Result<Option<Snapshot>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(&env_id)
            .and_then(|versions| versions.last_key_value())
            .map(|(_, snapshot)| snapshot.clone()))
    }

    async fn get_snapshot_at(
        &self,
        env_id: Uuid,
        version: u32,
    ) -> Result<Option<Snapshot>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(&env_id)
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    async fn put_snapshot(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let versions = inner.snapshots.entry(snapshot.env_id).or_default();
        let latest = versions.last_key_value().map_or(0, |(v, _)| *v);
        if snapshot.version != latest.saturating_add(1) {
            return Err(StorageError::VersionConflict {
                env_id: snapshot.env_id,
                attempted: snapshot.version,
                latest,
            });
        }
        versions.insert(snapshot.version, snapshot);
        Ok(())
    }

    async fn delete_snapshots_before(
        &self,
        env_id: Uuid,
        before_version: u32,
    ) -> Result<u32, StorageError> {
        let mut inner = self.inner.write().await;
        let Some(versions) = inner.snapshots.get_mut(&env_id) else {
            return Ok(0);
        };
        let keep = versions.split_off(&before_version);
        let removed = u32::try_from(versions.len()).unwrap_or(u32::MAX);
        *versions = keep;
        Ok(removed)
    }

    async fn get_member_key_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<MemberKeyRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.member_keys.get(&user_id).cloned())
    }

    async fn put_member_key_record(&self, record: MemberKeyRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.member_keys.insert(record.user_id, record);
        Ok(())
    }

    async fn get_org_key_copy(
        &self,
        org_id: Uuid,
        principal: Principal,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.org_key_copies.get(&(org_id, principal)).cloned())
    }

    async fn put_org_key_copy(
        &self,
        org_id: Uuid,
        principal: Principal,
        ciphertext: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.org_key_copies.insert((org_id, principal), ciphertext);
        Ok(())
    }

    async fn get_token_record_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<TokenRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.get(hash).cloned())
    }

    async fn put_token_record(&self, record: TokenRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.tokens.insert(record.hash.clone(), record);
        Ok(())
    }

    async fn delete_token_record(&self, id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.tokens.retain(|_, record| record.id != id);
        Ok(())
    }

    async fn get_invite(&self, invite_id: Uuid) -> Result<Option<InviteRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.invites.get(&invite_id).cloned())
    }

    async fn put_invite(&self, record: InviteRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.invites.insert(record.id, record);
        Ok(())
    }
}
