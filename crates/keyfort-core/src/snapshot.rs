//! Versioned secret snapshots over the abstract store.
//!
//! Every environment's secrets live as append-only snapshots: one full
//! key/value map per version, not diffs. Writing always means "read the
//! latest map, apply the change, insert the whole map at the next
//! version". That read-modify-write is a genuine race under concurrent
//! writers, closed here by the store's version-guarded insert
//! ([`StorageError::VersionConflict`]) plus a bounded retry — correct
//! for multi-instance deployments, not just a single process holding a
//! mutex.
//!
//! The service treats payload values as opaque envelope rows: callers
//! encrypt before `set` and decrypt after `get`. Rows read from the
//! store are normalized through [`Payload::from_stored`] on the way out.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use keyfort_storage::{SecretRow, Snapshot, StorageError, Store};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SnapshotError;
use crate::payload::Payload;

/// How many times a write retries after losing the version race before
/// surfacing [`SnapshotError::Conflict`].
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A secret's name and flags, without its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretListing {
    pub key: String,
    pub exposable: bool,
}

/// Snapshot get/set/merge/cleanup logic over an abstract store.
pub struct SnapshotService {
    store: Arc<dyn Store>,
}

impl SnapshotService {
    /// Create a new snapshot service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Set one secret, producing a new snapshot version carrying the
    /// entire updated map. Returns the new version number.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Conflict`] if the version race was lost on
    ///   every attempt.
    /// - [`SnapshotError::Storage`] if the backend fails.
    pub async fn set(
        &self,
        env_id: Uuid,
        key: &str,
        payload: Payload,
    ) -> Result<u32, SnapshotError> {
        let row = payload.into_stored();
        let version = self
            .write_next(env_id, |data| {
                data.insert(key.to_owned(), row.clone());
                Some(())
            })
            .await?;
        info!(%env_id, version, "secret set");
        Ok(version)
    }

    /// Set several secrets in one new version. All entries land
    /// together or the write does not happen.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_many(
        &self,
        env_id: Uuid,
        entries: BTreeMap<String, Payload>,
    ) -> Result<u32, SnapshotError> {
        let rows: BTreeMap<String, SecretRow> = entries
            .into_iter()
            .map(|(key, payload)| (key, payload.into_stored()))
            .collect();
        let count = rows.len();

        let version = self
            .write_next(env_id, |data| {
                data.extend(rows.clone());
                Some(())
            })
            .await?;
        info!(%env_id, version, count, "secrets set");
        Ok(version)
    }

    /// Get one secret at an exact version, or from the latest snapshot
    /// when `version` is `None`.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if the environment, version, or
    ///   key is absent.
    /// - [`SnapshotError::Storage`] if the backend fails.
    pub async fn get(
        &self,
        env_id: Uuid,
        key: &str,
        version: Option<u32>,
    ) -> Result<Payload, SnapshotError> {
        let snapshot = self.load(env_id, version).await?;
        snapshot
            .data
            .get(key)
            .cloned()
            .map(Payload::from_stored)
            .ok_or(SnapshotError::NotFound)
    }

    /// List secret names (values stripped) at an exact version, or from
    /// the latest snapshot when `version` is `None`.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if the environment or version is
    ///   absent.
    /// - [`SnapshotError::Storage`] if the backend fails.
    pub async fn list(
        &self,
        env_id: Uuid,
        version: Option<u32>,
    ) -> Result<Vec<SecretListing>, SnapshotError> {
        let snapshot = self.load(env_id, version).await?;
        Ok(snapshot
            .data
            .into_iter()
            .map(|(key, row)| SecretListing {
                key,
                exposable: row.exposable,
            })
            .collect())
    }

    /// Remove one secret, producing a new version without it.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if the key is not present in the
    ///   latest snapshot.
    /// - [`SnapshotError::Conflict`] / [`SnapshotError::Storage`] as in
    ///   [`set`](Self::set).
    pub async fn delete(&self, env_id: Uuid, key: &str) -> Result<u32, SnapshotError> {
        let version = self
            .write_next(env_id, |data| data.remove(key).map(|_| ()))
            .await?;
        info!(%env_id, version, "secret deleted");
        Ok(version)
    }

    /// Delete all snapshots older than `before_version` (plan-based
    /// retention). Returns the number of snapshots removed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] if the backend fails.
    pub async fn cleanup(&self, env_id: Uuid, before_version: u32) -> Result<u32, SnapshotError> {
        let removed = self
            .store
            .delete_snapshots_before(env_id, before_version)
            .await?;
        if removed > 0 {
            info!(%env_id, before_version, removed, "old snapshots pruned");
        }
        Ok(removed)
    }

    /// Merge a source environment's snapshot into a target environment.
    ///
    /// Source keys overwrite target keys; target-only keys survive. The
    /// result is written as a new target version, which is returned.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if the source environment (or the
    ///   requested source version) has no snapshot.
    /// - [`SnapshotError::Conflict`] / [`SnapshotError::Storage`] as in
    ///   [`set`](Self::set).
    pub async fn merge(
        &self,
        source_env: Uuid,
        source_version: Option<u32>,
        target_env: Uuid,
    ) -> Result<u32, SnapshotError> {
        let source = self.load(source_env, source_version).await?;

        let version = self
            .write_next(target_env, |data| {
                data.extend(source.data.clone());
                Some(())
            })
            .await?;
        info!(%source_env, %target_env, version, "environments merged");
        Ok(version)
    }

    /// Load a snapshot at an exact or latest version, failing
    /// `NotFound` when absent.
    async fn load(&self, env_id: Uuid, version: Option<u32>) -> Result<Snapshot, SnapshotError> {
        let snapshot = match version {
            Some(v) => self.store.get_snapshot_at(env_id, v).await?,
            None => self.store.get_latest_snapshot(env_id).await?,
        };
        snapshot.ok_or(SnapshotError::NotFound)
    }

    /// Read the latest map, apply `mutate`, and insert at the next
    /// version, retrying a bounded number of times when another writer
    /// claims the version first.
    ///
    /// `mutate` returns `None` to signal that the change target does
    /// not exist (surfaced as `NotFound`, nothing written).
    async fn write_next<F>(&self, env_id: Uuid, mutate: F) -> Result<u32, SnapshotError>
    where
        F: Fn(&mut BTreeMap<String, SecretRow>) -> Option<()>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let latest = self.store.get_latest_snapshot(env_id).await?;
            let (latest_version, mut data) =
                latest.map_or((0, BTreeMap::new()), |s| (s.version, s.data));

            if mutate(&mut data).is_none() {
                return Err(SnapshotError::NotFound);
            }

            let next_version = latest_version.saturating_add(1);
            let result = self
                .store
                .put_snapshot(Snapshot {
                    env_id,
                    version: next_version,
                    data,
                    created_at: Utc::now(),
                })
                .await;

            match result {
                Ok(()) => return Ok(next_version),
                Err(StorageError::VersionConflict { .. }) => {
                    debug!(%env_id, attempt, "snapshot version race lost, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SnapshotError::Conflict {
            env_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

impl std::fmt::Debug for SnapshotService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotService").finish_non_exhaustive()
    }
}
